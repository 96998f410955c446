use super::traits::{take, BusDeserialize, BusSerialize};
use super::CodecError;
use std::io::Write;

// All multi-byte fields on the bus are little-endian.
macro_rules! impl_primitive {
    ($type:ty, $bytes:expr) => {
        impl BusSerialize for $type {
            fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), CodecError> {
                writer.write_all(&self.to_le_bytes())?;
                Ok(())
            }
        }

        impl BusDeserialize for $type {
            fn deserialize(reader: &mut &[u8]) -> Result<Self, CodecError> {
                let bytes = take(reader, $bytes).ok_or(CodecError::TruncatedHeader)?;
                let mut buf = [0u8; $bytes];
                buf.copy_from_slice(bytes);
                Ok(<$type>::from_le_bytes(buf))
            }
        }
    };
}

impl_primitive!(u8, 1);
impl_primitive!(u16, 2);
impl_primitive!(u32, 4);
impl_primitive!(u64, 8);
