use super::traits::{take, BusDeserialize, BusSerialize};
use super::CodecError;
use std::fmt;
use std::io::Write;

/// Maximum number of service specific bytes carried by one record.
pub const MAX_ADVERTISEMENT_DATA: usize = 16;

/// Class advertised for a vacant slot. Never matches a service.
pub const SERVICE_CLASS_NONE: u32 = 0;

/// Advertisement record describing one hosted service.
///
/// Wire layout: `service_class:u32 | service_flags:u8 | advertisement_size:u8 | payload`.
/// `advertisement_size` is always derived from the payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInformation {
    pub service_class: u32,
    pub service_flags: u8,
    payload: Vec<u8>,
}

impl ServiceInformation {
    pub const PREFIX_LENGTH: usize = 6;

    pub fn new(service_class: u32, service_flags: u8, payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() > MAX_ADVERTISEMENT_DATA {
            return Err(CodecError::PayloadTooLarge { len: payload.len() });
        }
        Ok(ServiceInformation {
            service_class,
            service_flags,
            payload: payload.to_vec(),
        })
    }

    /// Placeholder for a slot with no service behind it.
    pub fn vacant() -> Self {
        ServiceInformation {
            service_class: SERVICE_CLASS_NONE,
            service_flags: 0,
            payload: Vec::new(),
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.service_class == SERVICE_CLASS_NONE
    }

    pub fn advertisement_size(&self) -> u8 {
        self.payload.len() as u8
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of bytes this record occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        Self::PREFIX_LENGTH + self.payload.len()
    }
}

impl fmt::Display for ServiceInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class=0x{:08x} flags=0x{:02x} size={}",
            self.service_class,
            self.service_flags,
            self.payload.len()
        )
    }
}

impl BusSerialize for ServiceInformation {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), CodecError> {
        self.service_class.serialize(writer)?;
        self.service_flags.serialize(writer)?;
        self.advertisement_size().serialize(writer)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }
}

impl BusDeserialize for ServiceInformation {
    fn deserialize(reader: &mut &[u8]) -> Result<Self, CodecError> {
        let prefix = take(reader, Self::PREFIX_LENGTH).ok_or(CodecError::TruncatedRecord {
            declared: Self::PREFIX_LENGTH,
            available: reader.len(),
        })?;
        let service_class = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let service_flags = prefix[4];
        let declared = prefix[5] as usize;

        if declared > MAX_ADVERTISEMENT_DATA {
            return Err(CodecError::PayloadTooLarge { len: declared });
        }
        let available = reader.len();
        let payload = take(reader, declared).ok_or(CodecError::TruncatedRecord { declared, available })?;

        Ok(ServiceInformation {
            service_class,
            service_flags,
            payload: payload.to_vec(),
        })
    }
}
