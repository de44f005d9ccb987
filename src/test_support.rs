//! Test-only device adapter and image formatter.
//!
//! [`MemDevice`] is grounded in `examples/original_source/ex_cache.c`'s
//! `e2device`: a single-outstanding-request in-memory cache that tracks the
//! region it last handed out so it knows where to write a dirty buffer
//! back, and asserts against being asked for a second region before the
//! first is returned.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::device::Device;
use crate::layout::{
    Bgd, DirEntryHeader, Inode, SuperBlock, entry_size, features_ro, features_rw, file_type_hint,
    inode_type,
};
use wire::{Encode, Endian};

pub struct MemDevice {
    data: Vec<u8>,
    pending: Option<(u64, usize)>,
    busy: bool,
    clock: u32,
}

impl MemDevice {
    pub fn with_size(bytes: usize) -> Self {
        Self {
            data: vec![0u8; bytes],
            pending: None,
            busy: false,
            clock: 1_700_000_000,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pending: None,
            busy: false,
            clock: 1_700_000_000,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set_clock(&mut self, t: u32) {
        self.clock = t;
    }
}

impl Device for MemDevice {
    fn request(&mut self, len: usize, off: u64) -> Option<Box<[u8]>> {
        debug_assert!(!self.busy, "MemDevice: nested request without matching drop");
        let start = usize::try_from(off).ok()?;
        let end = start.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        self.pending = Some((off, len));
        self.busy = true;
        Some(self.data[start..end].to_vec().into_boxed_slice())
    }

    fn drop_buffer(&mut self, buf: Box<[u8]>, dirty: bool) -> Result<(), ()> {
        let (off, len) = self.pending.take().ok_or(())?;
        self.busy = false;
        if buf.len() != len {
            return Err(());
        }
        if dirty {
            let start = usize::try_from(off).map_err(|_| ())?;
            self.data[start..start + len].copy_from_slice(&buf);
        }
        Ok(())
    }

    fn now(&mut self) -> Option<u32> {
        Some(self.clock)
    }
}

/// Parameters for [`format_minimal`]. Deliberately small: one group, enough
/// inodes/blocks for the end-to-end scenarios in `spec.md` §8.
pub struct FormatOptions {
    pub total_blocks: u32,
    pub inodes_per_group: u32,
    pub block_size_log: u32,
    pub features_ro: u32,
    pub features_rw: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            total_blocks: 1024,
            inodes_per_group: 128,
            block_size_log: 0,
            features_ro: features_ro::DIRTYPE,
            features_rw: features_rw::REQUIRED_FOR_RW,
        }
    }
}

/// Builds a minimal, single-block-group ext2 image with a populated root
/// directory (`.` and `..`, both pointing at inode 2), matching the "S1"
/// fixture `spec.md` §8 describes.
pub fn format_minimal(opts: FormatOptions) -> Vec<u8> {
    let block_size = 1024u32 << opts.block_size_log;
    let inode_size = 128u16;
    let bgd_block = if block_size == 1024 { 2 } else { 1 };

    let inode_table_blocks =
        (u64::from(opts.inodes_per_group) * u64::from(inode_size)).div_ceil(u64::from(block_size)) as u32;

    let block_bitmap_block = bgd_block + 1;
    let inode_bitmap_block = block_bitmap_block + 1;
    let inode_table_start = inode_bitmap_block + 1;
    let root_dir_block = inode_table_start + inode_table_blocks;

    let reserved_blocks = root_dir_block + 1; // blocks [0, root_dir_block] inclusive are in use
    let reserved_inodes = 11u32; // conventional first 10 + root (inode 2 among them)

    let total_bytes = u64::from(opts.total_blocks) * u64::from(block_size);
    let mut data = vec![0u8; total_bytes as usize];

    let sb = SuperBlock {
        inodes_total: opts.inodes_per_group,
        blocks_total: opts.total_blocks,
        blocks_reserved: 0,
        blocks_free: opts.total_blocks - reserved_blocks,
        inodes_free: opts.inodes_per_group - reserved_inodes,
        first_data_block: if block_size == 1024 { 1 } else { 0 },
        block_size_log: opts.block_size_log,
        frag_size_log: opts.block_size_log,
        blocks_per_group: opts.total_blocks,
        frags_per_group: opts.total_blocks,
        inodes_per_group: opts.inodes_per_group,
        mtime: 0,
        wtime: 0,
        mounts_since_check: 0,
        mounts_until_check: 0,
        magic: crate::layout::EXT2_MAGIC,
        state: 1,
        error_behavior: 1,
        v_minor: 0,
        last_check: 0,
        check_interval: 0,
        creator_os: 0,
        v_major: 1,
        reserved_uid: 0,
        reserved_gid: 0,
        first_nonreserved_inode: reserved_inodes,
        inode_size,
        block_group_nr: 0,
        features_optional: 0,
        features_ro: opts.features_ro,
        features_rw: opts.features_rw,
        fs_id: [0; 16],
        volume_name: [0; 16],
        last_mounted: [0; 64],
        algo_bitmap: 0,
    };
    write_at(&mut data, 1024, &sb);

    let bgd = Bgd {
        block_bitmap: block_bitmap_block,
        inode_bitmap: inode_bitmap_block,
        inode_table: inode_table_start,
        blocks_free: (opts.total_blocks - reserved_blocks) as u16,
        inodes_free: (opts.inodes_per_group - reserved_inodes) as u16,
        directory_amt: 1,
        pad: 0,
        reserved: [0; 3],
    };
    write_at(&mut data, u64::from(bgd_block) * u64::from(block_size), &bgd);

    set_bits(
        &mut data,
        u64::from(block_bitmap_block) * u64::from(block_size),
        0..reserved_blocks,
    );
    set_bits(
        &mut data,
        u64::from(inode_bitmap_block) * u64::from(block_size),
        0..reserved_inodes,
    );

    let root_inode = Inode {
        perms: inode_type::DIRECTORY | 0o755,
        uid: 0,
        size_lower: block_size,
        atime: 0,
        ctime: 0,
        mtime: 0,
        dtime: 0,
        gid: 0,
        links: 2,
        sectors: block_size / 512,
        flags: 0,
        os_specific_1: 0,
        block: {
            let mut b = [0u32; crate::layout::DIRECT_BLOCKS];
            b[0] = root_dir_block;
            b
        },
        indirect_1: 0,
        indirect_2: 0,
        indirect_3: 0,
        generation: 0,
        acl: 0,
        size_upper: 0,
        fragment_addr: 0,
        os_specific_2: [0; 3],
    };
    let root_inode_off =
        u64::from(inode_table_start) * u64::from(block_size) + u64::from(inode_size); // inode 2 is the 2nd slot (index 1)
    write_at(&mut data, root_inode_off, &root_inode);

    let dir_off = u64::from(root_dir_block) * u64::from(block_size);
    write_dirent(&mut data, dir_off, 2, ".", entry_size(1), file_type_hint::DIRECTORY);
    write_dirent(
        &mut data,
        dir_off + u64::from(entry_size(1)),
        2,
        "..",
        block_size as u16 - entry_size(1),
        file_type_hint::DIRECTORY,
    );

    data
}

fn write_at<T: Encode>(data: &mut [u8], off: u64, value: &T) {
    let off = off as usize;
    value.encode(Endian::Little, &mut data[off..]).expect("fixture record fits");
}

fn set_bits(data: &mut [u8], bitmap_off: u64, range: core::ops::Range<u32>) {
    let base = bitmap_off as usize;
    for bit in range {
        let byte = bit as usize / 8;
        let b = bit as usize % 8;
        data[base + byte] |= 1 << b;
    }
}

fn write_dirent(data: &mut [u8], off: u64, inode: u32, name: &str, size: u16, type_hint: u8) {
    let header = DirEntryHeader {
        inode,
        size,
        namelen_lower: name.len() as u8,
        namelen_upper_or_type: type_hint,
    };
    let off = off as usize;
    header
        .encode(Endian::Little, &mut data[off..off + crate::layout::DIRENT_HEADER_SIZE])
        .expect("dirent header fits");
    let name_off = off + crate::layout::DIRENT_HEADER_SIZE;
    data[name_off..name_off + name.len()].copy_from_slice(name.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_image_has_valid_magic() {
        let img = format_minimal(FormatOptions::default());
        let magic = u16::from_le_bytes([img[1024 + 56], img[1024 + 57]]);
        assert_eq!(magic, crate::layout::EXT2_MAGIC);
    }

    #[test]
    fn mem_device_round_trips_a_write() {
        let mut dev = MemDevice::with_size(128);
        {
            let buf = dev.request(16, 0).unwrap();
            assert_eq!(buf.len(), 16);
            dev.drop_buffer(buf, false).unwrap();
        }
        let mut buf = dev.request(16, 0).unwrap();
        buf[0] = 42;
        dev.drop_buffer(buf, true).unwrap();
        assert_eq!(dev.bytes()[0], 42);
    }
}
