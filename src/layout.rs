//! On-disk record shapes (`spec.md` §3 / §6): superblock, block group
//! descriptor, inode, directory entry. All packed, little-endian, decoded
//! with [`wire::Packed`] field-by-field — the same approach the `wire`
//! crate was built for.

use wire::Packed;

pub const EXT2_MAGIC: u16 = 0xef53;
pub const ROOT_INODE: u32 = 2;
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const BGD_SIZE: usize = 32;

/// Read-only-compat feature bits this driver understands. Any bit outside
/// this set aborts the mount (`spec.md` §4.2).
pub mod features_ro {
    /// Directory entries carry a file-type hint byte instead of an upper
    /// name-length byte (`spec.md` §3 "Directory entry").
    pub const DIRTYPE: u32 = 0x1;
    pub const KNOWN: u32 = DIRTYPE;
}

/// Read-write-compat feature bits. A read-write mount requires *exactly*
/// this set (`spec.md` §4.2), not merely a superset.
pub mod features_rw {
    pub const SPARSE_SUPER: u32 = 0x1;
    pub const SIZE64: u32 = 0x2;
    pub const REQUIRED_FOR_RW: u32 = SPARSE_SUPER | SIZE64;
}

/// File-type hint values used in a directory entry's trailing byte when
/// `features_ro::DIRTYPE` is active.
pub mod file_type_hint {
    pub const UNKNOWN: u8 = 0;
    pub const REGULAR: u8 = 1;
    pub const DIRECTORY: u8 = 2;
    pub const SYMLINK: u8 = 7;
}

pub mod inode_type {
    pub const MASK: u16 = 0xf000;
    pub const DIRECTORY: u16 = 0x4000;
    pub const REGULAR: u16 = 0x8000;
    pub const SYMLINK: u16 = 0xa000;
}

/// Direct-block slot count in an inode (`spec.md` §3).
pub const DIRECT_BLOCKS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Packed)]
#[repr(C)]
pub struct SuperBlock {
    pub inodes_total: u32,
    pub blocks_total: u32,
    pub blocks_reserved: u32,
    pub blocks_free: u32,
    pub inodes_free: u32,
    pub first_data_block: u32,
    pub block_size_log: u32,
    pub frag_size_log: u32,
    pub blocks_per_group: u32,
    pub frags_per_group: u32,
    pub inodes_per_group: u32,
    pub mtime: u32,
    pub wtime: u32,
    pub mounts_since_check: u16,
    pub mounts_until_check: u16,
    pub magic: u16,
    pub state: u16,
    pub error_behavior: u16,
    pub v_minor: u16,
    pub last_check: u32,
    pub check_interval: u32,
    pub creator_os: u32,
    pub v_major: u32,
    pub reserved_uid: u16,
    pub reserved_gid: u16,
    // revision-1 fields
    pub first_nonreserved_inode: u32,
    pub inode_size: u16,
    pub block_group_nr: u16,
    pub features_optional: u32,
    pub features_ro: u32,
    pub features_rw: u32,
    pub fs_id: [u8; 16],
    pub volume_name: [u8; 16],
    pub last_mounted: [u8; 64],
    pub algo_bitmap: u32,
}

impl SuperBlock {
    pub fn block_size(&self) -> u32 {
        1024u32 << self.block_size_log
    }

    pub fn frag_size(&self) -> u32 {
        1024u32 << self.frag_size_log
    }

    /// Block holding the start of the BGD table (`spec.md` §3, §6).
    pub fn bgd_table_block(&self) -> u32 {
        if self.block_size() == 1024 { 2 } else { 1 }
    }

    pub fn group_count(&self) -> u32 {
        self.blocks_total.div_ceil(self.blocks_per_group.max(1))
    }

    pub fn group_count_by_inodes(&self) -> u32 {
        self.inodes_total.div_ceil(self.inodes_per_group.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Packed)]
#[repr(C)]
pub struct Bgd {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub blocks_free: u16,
    pub inodes_free: u16,
    pub directory_amt: u16,
    pub pad: u16,
    pub reserved: [u32; 3],
}

/// The fixed-size portion of an inode record (`spec.md` §3). Implementations
/// vary the on-disk inode size (`sb.inode_size`); anything beyond this
/// fixed part is opaque padding the driver never interprets, matching
/// `spec.md`'s explicit non-goal on extended attributes beyond the `acl`
/// pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Packed)]
#[repr(C)]
pub struct Inode {
    pub perms: u16,
    pub uid: u16,
    pub size_lower: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links: u16,
    pub sectors: u32,
    pub flags: u32,
    pub os_specific_1: u32,
    pub block: [u32; DIRECT_BLOCKS],
    pub indirect_1: u32,
    pub indirect_2: u32,
    pub indirect_3: u32,
    pub generation: u32,
    pub acl: u32,
    pub size_upper: u32,
    pub fragment_addr: u32,
    pub os_specific_2: [u32; 3],
}

impl Inode {
    pub fn zeroed() -> Self {
        Self {
            perms: 0,
            uid: 0,
            size_lower: 0,
            atime: 0,
            ctime: 0,
            mtime: 0,
            dtime: 0,
            gid: 0,
            links: 0,
            sectors: 0,
            flags: 0,
            os_specific_1: 0,
            block: [0; DIRECT_BLOCKS],
            indirect_1: 0,
            indirect_2: 0,
            indirect_3: 0,
            generation: 0,
            acl: 0,
            size_upper: 0,
            fragment_addr: 0,
            os_specific_2: [0; 3],
        }
    }

    pub fn file_type(&self) -> u16 {
        self.perms & inode_type::MASK
    }

    pub fn is_directory(&self) -> bool {
        self.file_type() == inode_type::DIRECTORY
    }

    pub fn is_deleted(&self) -> bool {
        self.links == 0
    }
}

/// Fixed part of a directory entry (`spec.md` §3): inode number, record
/// size, lower name length, and the upper-namelen/type-hint byte, in that
/// order. The name bytes follow immediately and are handled separately
/// since the record is variable-length (`wire::Packed` only derives for
/// fixed-size structs).
pub const DIRENT_HEADER_SIZE: usize = 8;
pub const DIRENT_MAX_NAME: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Packed)]
#[repr(C)]
pub struct DirEntryHeader {
    pub inode: u32,
    pub size: u16,
    pub namelen_lower: u8,
    /// Upper byte of the name length, or a file-type hint — which
    /// interpretation applies depends on `features_ro::DIRTYPE`
    /// (`spec.md` §3, §9 "`namelen_upper` vs `type` union").
    pub namelen_upper_or_type: u8,
}

/// `entry_size(namelen) = (header + namelen + 3) & ~3` (`spec.md` §4.8).
pub fn entry_size(namelen: usize) -> u16 {
    ((DIRENT_HEADER_SIZE + namelen + 3) & !3) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use wire::{Decode, Encode, Endian};

    #[test]
    fn entry_size_is_4_aligned() {
        assert_eq!(entry_size(0), 8);
        assert_eq!(entry_size(1), 12);
        assert_eq!(entry_size(4), 12);
        assert_eq!(entry_size(5), 16);
    }

    #[test]
    fn dirent_header_round_trips() {
        let h = DirEntryHeader {
            inode: 7,
            size: 24,
            namelen_lower: 5,
            namelen_upper_or_type: 1,
        };
        let mut buf = [0u8; DIRENT_HEADER_SIZE];
        let n = h.encode(Endian::Little, &mut buf).unwrap();
        assert_eq!(n, DIRENT_HEADER_SIZE);
        let (decoded, n2) = DirEntryHeader::decode(Endian::Little, &buf).unwrap();
        assert_eq!(n2, DIRENT_HEADER_SIZE);
        assert_eq!(decoded, h);
    }

    #[test]
    fn superblock_geometry_helpers() {
        let mut sb = zeroed_superblock();
        sb.block_size_log = 0;
        assert_eq!(sb.block_size(), 1024);
        assert_eq!(sb.bgd_table_block(), 2);
        sb.block_size_log = 2;
        assert_eq!(sb.block_size(), 4096);
        assert_eq!(sb.bgd_table_block(), 1);
    }

    fn zeroed_superblock() -> SuperBlock {
        SuperBlock {
            inodes_total: 0,
            blocks_total: 0,
            blocks_reserved: 0,
            blocks_free: 0,
            inodes_free: 0,
            first_data_block: 0,
            block_size_log: 0,
            frag_size_log: 0,
            blocks_per_group: 1,
            frags_per_group: 1,
            inodes_per_group: 1,
            mtime: 0,
            wtime: 0,
            mounts_since_check: 0,
            mounts_until_check: 0,
            magic: EXT2_MAGIC,
            state: 0,
            error_behavior: 0,
            v_minor: 0,
            last_check: 0,
            check_interval: 0,
            creator_os: 0,
            v_major: 1,
            reserved_uid: 0,
            reserved_gid: 0,
            first_nonreserved_inode: 11,
            inode_size: 128,
            block_group_nr: 0,
            features_optional: 0,
            features_ro: 0,
            features_rw: 0,
            fs_id: [0; 16],
            volume_name: [0; 16],
            last_mounted: [0; 64],
            algo_bitmap: 0,
        }
    }
}
