//! Locating inode records on disk and the thin request/write wrappers
//! around them (`spec.md` §4.3).

use crate::device::Device;
use crate::error::Ext2Error;
use crate::layout::Inode;
use crate::mount::Filesystem;

impl<D: Device> Filesystem<D> {
    /// `group = (n-1) div inodes_per_group; idx = (n-1) mod inodes_per_group`,
    /// byte offset `bgd.inode_table * block_size + idx * inode_size`.
    pub(crate) fn inode_position(&mut self, n: u32) -> Result<u64, Ext2Error> {
        if n == 0 {
            return Err(Ext2Error::Bounds("inode number 0 is invalid"));
        }
        let zero_based = n - 1;
        let group = zero_based / self.inodes_per_group;
        let idx = zero_based % self.inodes_per_group;
        if group >= self.group_count {
            return Err(Ext2Error::Bounds("inode number's group is out of range"));
        }
        let bgd = self.request_bgd(group)?;
        Ok(u64::from(bgd.inode_table) * u64::from(self.block_size)
            + u64::from(idx) * u64::from(self.inode_size))
    }

    pub fn request_inode(&mut self, n: u32) -> Result<Inode, Ext2Error> {
        let off = self.inode_position(n)?;
        self.read_record(off, core::mem::size_of::<Inode>())
    }

    pub(crate) fn write_inode(&mut self, n: u32, inode: &Inode) -> Result<(), Ext2Error> {
        let off = self.inode_position(n)?;
        self.write_record(off, core::mem::size_of::<Inode>(), inode)
    }

    /// Reads, mutates (if `f` returns `Ok(true)`), and writes back inode
    /// `n`'s record in a single request/drop pair.
    pub(crate) fn mutate_inode<F>(&mut self, n: u32, f: F) -> Result<Inode, Ext2Error>
    where
        F: FnOnce(&mut Inode) -> Result<bool, Ext2Error>,
    {
        let off = self.inode_position(n)?;
        self.mutate_record(off, core::mem::size_of::<Inode>(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{format_minimal, FormatOptions, MemDevice};

    #[test]
    fn root_inode_position_matches_table() {
        let dev = MemDevice::from_bytes(format_minimal(FormatOptions::default()));
        let mut fs = Filesystem::open_device(dev).unwrap();
        let root = fs.request_inode(2).unwrap();
        assert!(root.is_directory());
        assert_eq!(root.links, 2);
    }

    #[test]
    fn out_of_range_group_is_bounds_error() {
        let dev = MemDevice::from_bytes(format_minimal(FormatOptions::default()));
        let mut fs = Filesystem::open_device(dev).unwrap();
        let bogus = fs.inodes_per_group * fs.group_count + 1000;
        assert!(fs.request_inode(bogus).is_err());
    }
}
