//! Mounting (`open_device`) and the small set of whole-record request/write
//! helpers every other module is built on (`spec.md` §4.1, §4.2, §4.3).

use wire::{Decode, Encode, Endian};

use crate::device::{Device, Request};
use crate::error::Ext2Error;
use crate::layout::{Bgd, SuperBlock, BGD_SIZE, EXT2_MAGIC, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE, features_ro, features_rw};

/// A mounted filesystem. Owns the device adapter; all geometry fields are
/// captured once at mount time (`spec.md` §3 "Filesystem handle") and the
/// canonical copy stays on disk, re-requested whenever a mutator needs it.
pub struct Filesystem<D: Device> {
    pub(crate) device: D,
    pub rw: bool,
    pub group_count: u32,
    pub block_size: u32,
    pub frag_size: u32,
    pub inode_size: u16,
    pub inodes_per_group: u32,
    pub blocks_per_group: u32,
    pub bgd_table_block: u32,
    pub(crate) size64: bool,
    pub(crate) dirtype: bool,
}

impl<D: Device> Filesystem<D> {
    /// Validates the superblock and derives geometry (`spec.md` §4.2).
    pub fn open_device(mut device: D) -> Result<Self, Ext2Error> {
        let sb: SuperBlock = {
            let req = Request::acquire(&mut device, SUPERBLOCK_SIZE, SUPERBLOCK_OFFSET)?;
            let (sb, _) = SuperBlock::decode(Endian::Little, &req)?;
            req.release(false)?;
            sb
        };

        if sb.magic != EXT2_MAGIC {
            return Err(Ext2Error::Format("bad magic number"));
        }
        if sb.v_major < 1 {
            return Err(Ext2Error::Format("superblock version must be >= 1"));
        }
        if sb.block_size_log > 53 || sb.frag_size_log > 53 {
            return Err(Ext2Error::Format("block/fragment size log out of range"));
        }

        let groups_by_blocks = sb.group_count();
        let groups_by_inodes = sb.group_count_by_inodes();
        if groups_by_blocks != groups_by_inodes {
            return Err(Ext2Error::Format(
                "group count computed from blocks and inodes disagree",
            ));
        }

        // Unknown read-only-compat bits force a read-only mount rather than
        // aborting entirely, matching the "any other read-only-compat flag
        // forces a read-only mount" clause of `spec.md` §3 and ordinary
        // ext2 ro-compat semantics (an unsupported ro-compat feature
        // degrades to read-only, it does not refuse the mount — that is
        // what the *incompat* category is for, which this format does not
        // use). See `DESIGN.md` for the resolution of the apparent tension
        // with §4.2's "forces mount failure" wording against end-to-end
        // scenario S5.
        let known_ro = sb.features_ro & !features_ro::KNOWN == 0;
        let rw = known_ro
            && sb.features_ro == features_ro::DIRTYPE
            && sb.features_rw == features_rw::REQUIRED_FOR_RW;

        let block_size = sb.block_size();
        let frag_size = sb.frag_size();

        Ok(Self {
            device,
            rw,
            group_count: groups_by_blocks,
            block_size,
            frag_size,
            inode_size: sb.inode_size,
            inodes_per_group: sb.inodes_per_group,
            blocks_per_group: sb.blocks_per_group,
            bgd_table_block: sb.bgd_table_block(),
            size64: sb.features_rw & features_rw::SIZE64 != 0,
            dirtype: sb.features_ro & features_ro::DIRTYPE != 0,
        })
    }

    /// Effective file size, combining `size_upper` with `size_lower` only
    /// when the 64-bit-size feature is active and the inode is a regular
    /// file (`spec.md` §3 "Inode").
    pub(crate) fn file_size(&self, inode: &crate::layout::Inode) -> u64 {
        if self.size64 && inode.file_type() == crate::layout::inode_type::REGULAR {
            (u64::from(inode.size_upper) << 32) | u64::from(inode.size_lower)
        } else {
            u64::from(inode.size_lower)
        }
    }

    /// Frees the handle, returning the device adapter to the caller
    /// (`spec.md` §6 "close": "frees handle memory only").
    pub fn close(self) -> D {
        self.device
    }

    pub(crate) fn require_rw(&self) -> Result<(), Ext2Error> {
        if self.rw { Ok(()) } else { Err(Ext2Error::ReadOnly) }
    }

    /// Current time for `ctime`/`mtime`/`dtime`, substituting `u32::MAX`
    /// when the adapter has no clock (`spec.md` §4.1 "now"; see `SPEC_FULL.md`
    /// §4.1 for why `u32::MAX` and not `0`).
    pub fn now(&mut self) -> u32 {
        self.device.now().unwrap_or(u32::MAX)
    }

    /// Reads a whole fixed-size record with a single request/drop pair.
    pub(crate) fn read_record<T: Decode>(&mut self, off: u64, len: usize) -> Result<T, Ext2Error> {
        let req = Request::acquire(&mut self.device, len, off)?;
        let (value, _) = T::decode(Endian::Little, &req)?;
        req.release(false)?;
        Ok(value)
    }

    /// Writes a whole fixed-size record with a single request/drop pair.
    pub(crate) fn write_record<T: Encode>(&mut self, off: u64, len: usize, value: &T) -> Result<(), Ext2Error> {
        let mut req = Request::acquire(&mut self.device, len, off)?;
        value.encode(Endian::Little, &mut req)?;
        req.release(true)?;
        Ok(())
    }

    /// Reads, mutates, and conditionally writes back a record within one
    /// request/drop pair — the common shape for counter bumps and field
    /// updates (`spec.md` §9 "acquire → read a field → drop").
    pub(crate) fn mutate_record<T, F>(&mut self, off: u64, len: usize, f: F) -> Result<T, Ext2Error>
    where
        T: Decode + Encode,
        F: FnOnce(&mut T) -> Result<bool, Ext2Error>,
    {
        let mut req = Request::acquire(&mut self.device, len, off)?;
        let (mut value, _) = T::decode(Endian::Little, &req)?;
        let dirty = f(&mut value)?;
        if dirty {
            value.encode(Endian::Little, &mut req)?;
        }
        req.release(dirty)?;
        Ok(value)
    }

    pub fn request_superblock(&mut self) -> Result<SuperBlock, Ext2Error> {
        self.read_record(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)
    }

    pub(crate) fn write_superblock(&mut self, sb: &SuperBlock) -> Result<(), Ext2Error> {
        self.write_record(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE, sb)
    }

    pub(crate) fn bgd_offset(&self, group: u32) -> u64 {
        u64::from(self.bgd_table_block) * u64::from(self.block_size) + u64::from(group) * BGD_SIZE as u64
    }

    /// Reads a raw byte range with a single request/drop pair — used for
    /// scanning bitmaps, where the data isn't a fixed-layout record.
    pub(crate) fn read_bytes(&mut self, off: u64, len: usize) -> Result<alloc::vec::Vec<u8>, Ext2Error> {
        let req = Request::acquire(&mut self.device, len, off)?;
        let bytes = req.to_vec();
        req.release(false)?;
        Ok(bytes)
    }

    /// Writes a raw byte range with a single request/drop pair.
    pub(crate) fn write_bytes(&mut self, off: u64, bytes: &[u8]) -> Result<(), Ext2Error> {
        let mut req = Request::acquire(&mut self.device, bytes.len(), off)?;
        req.copy_from_slice(bytes);
        req.release(true)?;
        Ok(())
    }

    pub fn request_bgd(&mut self, group: u32) -> Result<Bgd, Ext2Error> {
        if group >= self.group_count {
            return Err(Ext2Error::Bounds("group index out of range"));
        }
        self.read_record(self.bgd_offset(group), BGD_SIZE)
    }

    pub(crate) fn write_bgd(&mut self, group: u32, bgd: &Bgd) -> Result<(), Ext2Error> {
        self.write_record(self.bgd_offset(group), BGD_SIZE, bgd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{format_minimal, FormatOptions, MemDevice};

    #[test]
    fn mounts_minimal_image_rw() {
        let dev = MemDevice::from_bytes(format_minimal(FormatOptions::default()));
        let fs = Filesystem::open_device(dev).unwrap();
        assert!(fs.rw);
        assert_eq!(fs.block_size, 1024);
        assert_eq!(fs.group_count, 1);
    }

    #[test]
    fn unknown_ro_feature_forces_read_only_not_failure() {
        let mut opts = FormatOptions::default();
        opts.features_ro = features_ro::DIRTYPE | 0x4;
        let dev = MemDevice::from_bytes(format_minimal(opts));
        let fs = Filesystem::open_device(dev).unwrap();
        assert!(!fs.rw);
    }

    #[test]
    fn bad_magic_fails_mount() {
        let mut img = format_minimal(FormatOptions::default());
        img[1024 + 56] = 0;
        img[1024 + 57] = 0;
        let dev = MemDevice::from_bytes(img);
        assert!(Filesystem::open_device(dev).is_err());
    }
}
