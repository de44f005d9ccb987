//! File reads and directory iteration, built directly on the block map
//! (`spec.md` §4.5).

use wire::{Decode, Endian};

use crate::device::{Device, Request};
use crate::error::Ext2Error;
use crate::layout::{DIRENT_HEADER_SIZE, DIRENT_MAX_NAME, DirEntryHeader};
use crate::mount::Filesystem;

impl<D: Device> Filesystem<D> {
    /// `read`: copies up to `dst.len()` bytes starting at `off`, clamped to
    /// the file's size. Holes read as zero. Returns the number of bytes
    /// copied (0 at or past EOF).
    pub fn read(&mut self, inode_n: u32, dst: &mut [u8], off: u64) -> Result<usize, Ext2Error> {
        let mut inode = self.request_inode(inode_n)?;
        let size = self.file_size(&inode);
        if off >= size {
            return Ok(0);
        }
        let clamped_len = core::cmp::min(dst.len() as u64, size - off) as usize;

        let mut copied = 0usize;
        while copied < clamped_len {
            let pos = off + copied as u64;
            let (device_off, available) = self.inode_on_disk(&mut inode, pos)?;
            let want = core::cmp::min(available, clamped_len - copied);
            match device_off {
                Some(doff) => {
                    let bytes = self.read_bytes(doff, want)?;
                    dst[copied..copied + want].copy_from_slice(&bytes);
                }
                None => {
                    dst[copied..copied + want].fill(0);
                }
            }
            copied += want;
        }
        Ok(copied)
    }

    /// `request_file`: zero-copy variant returning a borrowed [`Request`]
    /// for at most one contiguous device-backed run. Returns `None` at EOF
    /// or when the position falls in a hole — a hole has no backing device
    /// bytes to hand out a reference to, so callers that must see holes as
    /// zeroed should use [`Filesystem::read`] instead.
    pub fn request_file(&mut self, inode_n: u32, requested: usize, off: u64) -> Result<Option<Request<'_, D>>, Ext2Error> {
        let mut inode = self.request_inode(inode_n)?;
        let size = self.file_size(&inode);
        if off >= size || requested == 0 {
            return Ok(None);
        }
        let (device_off, available) = self.inode_on_disk(&mut inode, off)?;
        let Some(doff) = device_off else {
            return Ok(None);
        };
        let want = core::cmp::min(requested, core::cmp::min(available, (size - off) as usize));
        Ok(Some(Request::acquire(&mut self.device, want, doff)?))
    }
}

/// One yielded directory entry, borrowing its name bytes from the
/// iterator's internal buffer.
#[derive(Debug)]
pub struct DirEntryView<'a> {
    pub inode: u32,
    pub type_hint_or_namelen_upper: u8,
    pub name: &'a [u8],
}

/// `spec.md` §4.5 "Directory iteration": an iterator holding the directory
/// inode number, current byte position, and a fixed-size internal buffer —
/// no heap allocation per step. Terminates irrevocably on a short read or
/// malformed entry; only [`DirIter::reset`] makes it read the directory
/// again.
pub struct DirIter {
    inode_n: u32,
    pos: u64,
    buf: [u8; DIRENT_HEADER_SIZE + DIRENT_MAX_NAME],
    done: bool,
}

impl DirIter {
    pub fn new(inode_n: u32) -> Self {
        Self {
            inode_n,
            pos: 0,
            buf: [0u8; DIRENT_HEADER_SIZE + DIRENT_MAX_NAME],
            done: false,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.done = false;
    }

    /// Advances to the next non-free entry, or `Ok(None)` at end of
    /// directory / once terminated.
    pub fn next<'s, D: Device>(&'s mut self, fs: &mut Filesystem<D>) -> Result<Option<DirEntryView<'s>>, Ext2Error> {
        loop {
            if self.done {
                return Ok(None);
            }
            let mut inode = fs.request_inode(self.inode_n)?;
            let size = fs.file_size(&inode);
            if self.pos >= size {
                self.done = true;
                return Ok(None);
            }

            let (device_off, available) = fs.inode_on_disk(&mut inode, self.pos)?;
            if available < DIRENT_HEADER_SIZE {
                self.done = true;
                return Ok(None);
            }
            let Some(doff) = device_off else {
                // A hole inside a directory's data is malformed.
                self.done = true;
                return Err(Ext2Error::Consistency("hole encountered inside directory data"));
            };

            let header_bytes = fs.read_bytes(doff, DIRENT_HEADER_SIZE)?;
            let (header, _) = DirEntryHeader::decode(Endian::Little, &header_bytes)?;

            if header.size < DIRENT_HEADER_SIZE as u16 || header.size % 4 != 0 || usize::from(header.size) > available {
                self.done = true;
                return Err(Ext2Error::Consistency("directory entry size is malformed"));
            }

            let namelen = usize::from(header.namelen_lower);
            if namelen > 0 {
                let name_bytes = fs.read_bytes(doff + DIRENT_HEADER_SIZE as u64, namelen)?;
                self.buf[..namelen].copy_from_slice(&name_bytes);
            }

            let advance = u64::from(header.size);
            self.pos += advance;

            if header.inode == 0 {
                continue;
            }

            return Ok(Some(DirEntryView {
                inode: header.inode,
                type_hint_or_namelen_upper: header.namelen_upper_or_type,
                name: &self.buf[..namelen],
            }));
        }
    }
}
