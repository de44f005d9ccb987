//! Directory-entry insertion/removal and the link-count/cascade-free
//! machinery that keeps an inode's lifecycle consistent with its directory
//! entries (`spec.md` §4.8).

use wire::{Decode, Encode, Endian};

use crate::alloc_bitmap::Kind;
use crate::device::Device;
use crate::error::Ext2Error;
use crate::layout::{DIRECT_BLOCKS, DIRENT_HEADER_SIZE, DIRENT_MAX_NAME, DirEntryHeader, entry_size};
use crate::mount::Filesystem;

impl<D: Device> Filesystem<D> {
    /// `link`: inserts a directory entry for `target_n` named `name` into
    /// directory `dir_n`, bumping the target's link count first. Reuses a
    /// free slot in place, or splits a slot with enough slack. Does not
    /// grow the directory with a new block — that is out of scope for this
    /// library (`spec.md` §4.8).
    pub fn link(&mut self, dir_n: u32, name: &str, target_n: u32, type_flags: u8) -> Result<(), Ext2Error> {
        if name.len() > DIRENT_MAX_NAME {
            return Err(Ext2Error::Bounds("name longer than 255 bytes"));
        }
        self.require_rw()?;
        self.change_linkcount(target_n, 1)?;

        let needed = entry_size(name.len());
        let mut dir_inode = self.request_inode(dir_n)?;
        let size = self.file_size(&dir_inode);
        let mut pos = 0u64;

        while pos < size {
            let (device_off, available) = self.inode_on_disk(&mut dir_inode, pos)?;
            let doff = device_off.ok_or(Ext2Error::Consistency("hole inside directory data"))?;

            let header_bytes = self.read_bytes(doff, DIRENT_HEADER_SIZE)?;
            let (mut header, _) = DirEntryHeader::decode(Endian::Little, &header_bytes)?;
            if header.size < DIRENT_HEADER_SIZE as u16 || usize::from(header.size) > available {
                return Err(Ext2Error::Consistency("directory entry size is malformed"));
            }

            if header.inode == 0 && header.size >= needed {
                header.inode = target_n;
                header.namelen_lower = name.len() as u8;
                header.namelen_upper_or_type = type_flags & 7;
                let mut record = alloc::vec![0u8; DIRENT_HEADER_SIZE + name.len()];
                header.encode(Endian::Little, &mut record)?;
                record[DIRENT_HEADER_SIZE..].copy_from_slice(name.as_bytes());
                self.write_bytes(doff, &record)?;
                return Ok(());
            }

            let existing_slot_size = entry_size(usize::from(header.namelen_lower));
            if existing_slot_size + needed <= header.size {
                let remainder = header.size - existing_slot_size;
                let shrunk = DirEntryHeader { size: existing_slot_size, ..header };
                let mut hbuf = [0u8; DIRENT_HEADER_SIZE];
                shrunk.encode(Endian::Little, &mut hbuf)?;
                self.write_bytes(doff, &hbuf)?;

                let free_slot = DirEntryHeader {
                    inode: 0,
                    size: remainder,
                    namelen_lower: 0,
                    namelen_upper_or_type: 0,
                };
                let mut fbuf = [0u8; DIRENT_HEADER_SIZE];
                free_slot.encode(Endian::Little, &mut fbuf)?;
                self.write_bytes(doff + u64::from(existing_slot_size), &fbuf)?;

                pos += u64::from(existing_slot_size);
                continue;
            }

            pos += u64::from(header.size);
        }

        Err(Ext2Error::Unimplemented("directory is full; growing a directory is out of scope"))
    }

    /// `unlink`: removes the entry named `name` from directory `dir_n`,
    /// returning the former inode number, or 0 if not found (`spec.md` §6
    /// pins this `u32`-with-0 sentinel for compatibility).
    pub fn unlink(&mut self, dir_n: u32, name: &str) -> u32 {
        self.try_unlink(dir_n, name).unwrap_or(0)
    }

    fn try_unlink(&mut self, dir_n: u32, name: &str) -> Result<u32, Ext2Error> {
        self.require_rw()?;
        let mut dir_inode = self.request_inode(dir_n)?;
        let size = self.file_size(&dir_inode);
        let mut pos = 0u64;
        let mut found = None;

        while pos < size {
            let (device_off, available) = self.inode_on_disk(&mut dir_inode, pos)?;
            let doff = device_off.ok_or(Ext2Error::Consistency("hole inside directory data"))?;
            if available < DIRENT_HEADER_SIZE {
                break;
            }
            let header_bytes = self.read_bytes(doff, DIRENT_HEADER_SIZE)?;
            let (header, _) = DirEntryHeader::decode(Endian::Little, &header_bytes)?;
            if header.size < DIRENT_HEADER_SIZE as u16 {
                return Err(Ext2Error::Consistency("directory entry size is malformed"));
            }

            if header.inode != 0 && usize::from(header.namelen_lower) == name.len() {
                let name_bytes = self.read_bytes(doff + DIRENT_HEADER_SIZE as u64, name.len())?;
                if name_bytes == name.as_bytes() {
                    found = Some((doff, header.inode));
                    break;
                }
            }
            pos += u64::from(header.size);
        }

        let (doff, target_n) = found.ok_or(Ext2Error::Bounds("name not found in directory"))?;
        self.write_record(doff, 4, &0u32)?;
        self.change_linkcount(target_n, -1)?;
        Ok(target_n)
    }

    /// `change_linkcount`: adjusts `links` by `delta`, refusing to wrap
    /// past either end of the 16-bit field (`spec.md` §9 "Link-count
    /// overflow / underflow"). If the new count is 0, runs cascade-free.
    pub(crate) fn change_linkcount(&mut self, inode_n: u32, delta: i32) -> Result<u16, Ext2Error> {
        let updated = self.mutate_inode(inode_n, |inode| {
            let new_count = i32::from(inode.links) + delta;
            if !(0..=i32::from(u16::MAX)).contains(&new_count) {
                return Err(Ext2Error::Bounds("inode link count would overflow or underflow"));
            }
            inode.links = new_count as u16;
            Ok(true)
        })?;
        if updated.links == 0 {
            self.cascade_free(inode_n)?;
        }
        Ok(updated.links)
    }

    /// Releases an inode's blocks (bodies before the meta blocks that
    /// index them), then the inode itself — in that order, so a crash
    /// mid-cascade leaks blocks rather than releasing in-use ones
    /// (`spec.md` §5 "Cascade-free order", §9).
    fn cascade_free(&mut self, inode_n: u32) -> Result<(), Ext2Error> {
        let mut inode = self.request_inode(inode_n)?;

        for i in 0..DIRECT_BLOCKS {
            if inode.block[i] != 0 {
                self.bitmap_deallocate(inode.block[i], Kind::Block)?;
                inode.block[i] = 0;
            }
        }
        self.free_indirect_chain(inode.indirect_1, 1)?;
        self.free_indirect_chain(inode.indirect_2, 2)?;
        self.free_indirect_chain(inode.indirect_3, 3)?;
        inode.indirect_1 = 0;
        inode.indirect_2 = 0;
        inode.indirect_3 = 0;

        inode.dtime = self.now();
        inode.sectors = 0;
        self.write_inode(inode_n, &inode)?;
        self.bitmap_deallocate(inode_n, Kind::Inode)?;
        Ok(())
    }

    /// Frees a chain rooted at an indirect block of the given depth
    /// (1 = single, 2 = double, 3 = triple), bodies before the meta block
    /// that points to them.
    fn free_indirect_chain(&mut self, block: u32, depth: u32) -> Result<(), Ext2Error> {
        if block == 0 {
            return Ok(());
        }
        let p = self.addr_per_block();
        for i in 0..p {
            let word_off = u64::from(block) * u64::from(self.block_size) + i * 4;
            let word: u32 = self.read_record(word_off, 4)?;
            if word == 0 {
                continue;
            }
            if depth > 1 {
                self.free_indirect_chain(word, depth - 1)?;
            } else {
                self.bitmap_deallocate(word, Kind::Block)?;
            }
        }
        self.bitmap_deallocate(block, Kind::Block)
    }
}
