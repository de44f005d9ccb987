//! An embeddable, synchronous, caller-driven ext2 filesystem driver.
//!
//! The caller owns the block device and exposes it through the [`Device`]
//! trait (`spec.md` §4.1); this crate never performs I/O on its own. It
//! reads and mutates the on-disk layout directly: superblock, block group
//! descriptors, inodes, and directory entries (`layout`), through a mount
//! step (`mount`) that validates geometry and feature flags, a block map
//! (`blockmap`) that walks direct/indirect pointers, a reader and writer
//! (`reader`, `writer`), a bitmap allocator (`alloc_bitmap`), and a link
//! manager (`link`) that handles directory-entry insertion/removal and the
//! cascade-free that runs when an inode's last link drops.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod alloc_bitmap;
pub mod blockmap;
pub mod device;
pub mod error;
pub mod inode;
pub mod layout;
pub mod link;
pub mod mount;
pub mod reader;
#[cfg(test)]
pub(crate) mod test_support;
pub mod walk;
pub mod writer;

pub use device::Device;
pub use error::Ext2Error;
pub use layout::{DirEntryHeader, Inode, SuperBlock};
pub use mount::Filesystem;
