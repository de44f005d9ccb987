//! Error type shared by every internal entry point in this crate.

use thiserror::Error;

/// Everything that can go wrong inside the driver.
///
/// Public functions whose signatures are pinned by `spec.md` §6 for
/// compatibility (`walk`, `unlink`, `allocate_inode`, `allocate_block`) still
/// collapse this down to a sentinel; everywhere else it is returned
/// directly.
#[derive(Debug, Error)]
pub enum Ext2Error {
    #[error("not an ext2 filesystem: {0}")]
    Format(&'static str),

    #[error("filesystem is mounted read-only")]
    ReadOnly,

    #[error("bounds violation: {0}")]
    Bounds(&'static str),

    #[error("device adapter failed: {0}")]
    Adapter(&'static str),

    #[error("on-disk inconsistency: {0}")]
    Consistency(&'static str),

    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
}

impl From<wire::EncodeError> for Ext2Error {
    fn from(_: wire::EncodeError) -> Self {
        Ext2Error::Consistency("failed to encode an on-disk record")
    }
}

impl From<wire::DecodeError> for Ext2Error {
    fn from(_: wire::DecodeError) -> Self {
        Ext2Error::Consistency("failed to decode an on-disk record")
    }
}
