//! The caller-provided block device adapter and the scoped-acquisition
//! guard built on top of it (`spec.md` §4.1).

use alloc::boxed::Box;
use core::ops::{Deref, DerefMut};

use crate::error::Ext2Error;

/// A block device, as seen by the driver: a region can be requested for
/// exclusive, owned access and must later be handed back via `drop_buffer`.
///
/// Implementations decide internally whether `request` reads through to
/// storage, serves from a cache, or both; the driver makes no assumption
/// beyond "one outstanding request per the adapter's own policy" (`spec.md`
/// §4.1). The driver itself never holds two overlapping requests open at
/// once — see [`Filesystem::with_buffer`](crate::mount::Filesystem::with_buffer).
pub trait Device {
    /// Acquire a mutable region of `len` bytes at byte offset `off`.
    /// Returns `None` on failure (bad offset, allocation failure, I/O error).
    fn request(&mut self, len: usize, off: u64) -> Option<Box<[u8]>>;

    /// Release a previously-requested buffer. `dirty` asks the adapter to
    /// durably accept the (possibly mutated) contents. Returns `Err(())` on
    /// write failure.
    fn drop_buffer(&mut self, buf: Box<[u8]>, dirty: bool) -> Result<(), ()>;

    /// Current POSIX time, or `None` if the caller has no clock. The driver
    /// never calls this directly — see [`Filesystem::now`](crate::mount::Filesystem::now),
    /// which substitutes `u32::MAX` when this returns `None`, since `0` has
    /// a reserved meaning for `dtime`.
    fn now(&mut self) -> Option<u32> {
        None
    }
}

/// An owned, in-flight buffer borrowed from a [`Device`].
///
/// This is the RAII realization of the request/drop pair: dropping it
/// without calling [`release`](Request::release) first releases the buffer
/// with `dirty = false`, since an implicit drop (an early `?`, a panic
/// unwinding through it) has no dirty-write-failure channel to report
/// through and must not risk writing back a half-finished mutation.
pub(crate) struct Request<'a, D: Device> {
    device: &'a mut D,
    buf: Option<Box<[u8]>>,
}

impl<'a, D: Device> Request<'a, D> {
    pub fn acquire(device: &'a mut D, len: usize, off: u64) -> Result<Self, Ext2Error> {
        let buf = device
            .request(len, off)
            .ok_or(Ext2Error::Adapter("request returned null"))?;
        Ok(Self {
            device,
            buf: Some(buf),
        })
    }

    /// Explicitly end the borrow, reporting `dirty` to the adapter.
    pub fn release(mut self, dirty: bool) -> Result<(), Ext2Error> {
        let buf = self.buf.take().expect("Request buffer released twice");
        self.device
            .drop_buffer(buf, dirty)
            .map_err(|_| Ext2Error::Adapter("drop_buffer reported write failure"))
    }
}

impl<D: Device> Deref for Request<'_, D> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("Request buffer already released")
    }
}

impl<D: Device> DerefMut for Request<'_, D> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("Request buffer already released")
    }
}

impl<D: Device> Drop for Request<'_, D> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            let _ = self.device.drop_buffer(buf, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemDevice;

    #[test]
    fn release_reports_dirty() {
        let mut dev = MemDevice::with_size(4096);
        {
            let mut req = Request::acquire(&mut dev, 16, 0).unwrap();
            req[0] = 0xaa;
            req.release(true).unwrap();
        }
        let req = Request::acquire(&mut dev, 16, 0).unwrap();
        assert_eq!(req[0], 0xaa);
        req.release(false).unwrap();
    }

    #[test]
    fn implicit_drop_discards_mutation() {
        let mut dev = MemDevice::with_size(4096);
        {
            let mut req = Request::acquire(&mut dev, 16, 0).unwrap();
            req[0] = 0xaa;
            // dropped without release: must not persist
        }
        let req = Request::acquire(&mut dev, 16, 0).unwrap();
        assert_eq!(req[0], 0x00);
    }
}
