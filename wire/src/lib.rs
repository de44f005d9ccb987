//! Minimal (de)serialization of fixed-layout, packed structs to and from
//! little/big-endian byte buffers.
//!
//! This exists so on-disk record types (superblocks, block group
//! descriptors, inodes, ...) can be described as plain Rust structs and
//! decoded from / encoded into the raw buffers handed out by a device
//! adapter, without relying on `#[repr(packed)]` pointer casts.
#![no_std]

mod numbers;

pub use wire_derive::Packed;

/// Byte order used when encoding or decoding a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
    /// Host-native; every type in this crate treats this the same as
    /// [`Endian::Little`].
    Native,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum EncodeError {
    #[error("target buffer too small to encode value")]
    BufferTooSmall,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum DecodeError {
    #[error("input buffer too small to decode value")]
    BufferTooSmall,
}

/// A value that can be written into a byte buffer in a chosen byte order.
pub trait Encode {
    /// Writes `self` into `target`, returning the number of bytes written.
    fn encode(&self, endian: Endian, target: &mut [u8]) -> Result<usize, EncodeError>;
}

/// A value that can be read out of a byte buffer in a chosen byte order.
pub trait Decode: Sized {
    /// Reads a value out of the front of `input`, returning it along with
    /// the number of bytes consumed.
    fn decode(endian: Endian, input: &[u8]) -> Result<(Self, usize), DecodeError>;
}
