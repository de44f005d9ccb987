//! Writing file data and growing a file's block-pointer structure on
//! demand (`spec.md` §4.6).

use crate::device::Device;
use crate::error::Ext2Error;
use crate::mount::Filesystem;

impl<D: Device> Filesystem<D> {
    /// `allocate_space`: ensures every logical block up to
    /// `ceil(total_len / block_size)` has a backing device block,
    /// allocating on demand. Bumps the inode's `sectors` once, after the
    /// whole range has been walked (`spec.md` §4.6).
    pub fn allocate_space(&mut self, inode_n: u32, total_len: u64) -> Result<(), Ext2Error> {
        self.require_rw()?;
        let mut inode = self.request_inode(inode_n)?;
        let block_size = u64::from(self.block_size);
        let n_blocks = total_len.div_ceil(block_size.max(1)) as u32;

        let mut allocated_total = 0u32;
        for logical_block in 0..n_blocks {
            let (_, allocated) = self.resolve_block(&mut inode, logical_block, true)?;
            allocated_total += allocated;
        }

        if allocated_total > 0 {
            inode.sectors += allocated_total * (block_size / 512) as u32;
            self.write_inode(inode_n, &inode)?;
        }
        Ok(())
    }

    /// `write`: preallocates space, verifies the range is fully backed,
    /// writes the bytes, then advances `size_lower`/`size_upper` if the
    /// write extended the file. On-disk `size` is never advanced past data
    /// that was durably written (`spec.md` §4.6).
    pub fn write(&mut self, inode_n: u32, src: &[u8], off: u64) -> Result<usize, Ext2Error> {
        self.require_rw()?;
        if src.is_empty() {
            return Ok(0);
        }
        let end = off.checked_add(src.len() as u64).ok_or(Ext2Error::Bounds("write range overflows u64"))?;
        self.allocate_space(inode_n, end)?;

        let mut inode = self.request_inode(inode_n)?;

        // Dry-run verify: defends against a buggy allocate_space leaving a
        // hole in the range we are about to write.
        let mut pos = off;
        while pos < end {
            let (device_off, available) = self.inode_on_disk(&mut inode, pos)?;
            if device_off.is_none() {
                return Err(Ext2Error::Consistency("allocate_space left a hole in the write range"));
            }
            pos += core::cmp::min(available as u64, end - pos);
        }

        let mut written = 0usize;
        while written < src.len() {
            let pos = off + written as u64;
            let (device_off, available) = self.inode_on_disk(&mut inode, pos)?;
            let doff = device_off.expect("verified above to be Some");
            let want = core::cmp::min(available, src.len() - written);
            self.write_bytes(doff, &src[written..written + want])?;
            written += want;
        }

        let new_size = off + written as u64;
        let size64 = self.size64;
        self.mutate_inode(inode_n, move |inode| {
            let current = if size64 && inode.file_type() == crate::layout::inode_type::REGULAR {
                (u64::from(inode.size_upper) << 32) | u64::from(inode.size_lower)
            } else {
                u64::from(inode.size_lower)
            };
            if current < new_size {
                set_file_size(inode, new_size, size64);
                Ok(true)
            } else {
                Ok(false)
            }
        })?;

        Ok(written)
    }
}

fn set_file_size(inode: &mut crate::layout::Inode, new_size: u64, size64: bool) {
    if size64 && inode.file_type() == crate::layout::inode_type::REGULAR {
        inode.size_lower = new_size as u32;
        inode.size_upper = (new_size >> 32) as u32;
    } else {
        inode.size_lower = new_size as u32;
    }
}
