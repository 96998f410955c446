use super::CodecError;
use std::io::Write;

// Types that can be written to the bus wire format
pub trait BusSerialize {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), CodecError>;
}

// Types that can be read from the bus wire format. The slice is advanced past
// the consumed bytes.
pub trait BusDeserialize: Sized {
    fn deserialize(reader: &mut &[u8]) -> Result<Self, CodecError>;
}

/// Split `n` bytes off the front of `reader`.
pub(crate) fn take<'a>(reader: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if reader.len() < n {
        return None;
    }
    let (head, tail) = reader.split_at(n);
    *reader = tail;
    Some(head)
}
