use crate::{Decode, DecodeError, Encode, EncodeError, Endian};

macro_rules! impl_encode_decode {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, endian: Endian, target: &mut [u8]) -> Result<usize, EncodeError> {
                    const SIZE: usize = core::mem::size_of::<$t>();
                    if target.len() < SIZE {
                        return Err(EncodeError::BufferTooSmall);
                    }
                    let bytes = match endian {
                        Endian::Native | Endian::Little => self.to_le_bytes(),
                        Endian::Big => self.to_be_bytes(),
                    };
                    target[..SIZE].copy_from_slice(&bytes);
                    Ok(SIZE)
                }
            }
            impl Decode for $t {
                fn decode(endian: Endian, input: &[u8]) -> Result<(Self, usize), DecodeError> {
                    const SIZE: usize = core::mem::size_of::<$t>();
                    if input.len() < SIZE {
                        return Err(DecodeError::BufferTooSmall);
                    }
                    let mut bytes = [0u8; SIZE];
                    bytes.copy_from_slice(&input[..SIZE]);
                    let number = match endian {
                        Endian::Native | Endian::Little => <$t>::from_le_bytes(bytes),
                        Endian::Big => <$t>::from_be_bytes(bytes),
                    };
                    Ok((number, SIZE))
                }
            }
        )*
    };
}

macro_rules! impl_encode_decode_array {
    ($($t:ty),*) => {
        $(
            impl<const N: usize> Encode for [$t; N] {
                fn encode(&self, endian: Endian, target: &mut [u8]) -> Result<usize, EncodeError> {
                    const ELEM_SIZE: usize = core::mem::size_of::<$t>();
                    let total_size = ELEM_SIZE * N;
                    if target.len() < total_size {
                        return Err(EncodeError::BufferTooSmall);
                    }
                    for (i, elem) in self.iter().enumerate() {
                        let offset = i * ELEM_SIZE;
                        elem.encode(endian, &mut target[offset..offset + ELEM_SIZE])?;
                    }
                    Ok(total_size)
                }
            }

            impl<const N: usize> Decode for [$t; N] {
                fn decode(endian: Endian, input: &[u8]) -> Result<(Self, usize), DecodeError> {
                    const ELEM_SIZE: usize = core::mem::size_of::<$t>();
                    let total_size = ELEM_SIZE * N;
                    if input.len() < total_size {
                        return Err(DecodeError::BufferTooSmall);
                    }
                    let mut result = [<$t>::default(); N];
                    for i in 0..N {
                        let offset = i * ELEM_SIZE;
                        let (elem, _) = <$t>::decode(endian, &input[offset..offset + ELEM_SIZE])?;
                        result[i] = elem;
                    }
                    Ok((result, total_size))
                }
            }
        )*
    };
}

impl_encode_decode!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);
impl_encode_decode_array!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);
