use super::traits::{BusDeserialize, BusSerialize};
use super::CodecError;
use std::io::Write;

/// Control packet types carried in the first byte of a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Periodic identity announcement
    Hello,
    Unknown(u8),
}

impl From<u8> for PacketType {
    fn from(v: u8) -> Self {
        match v {
            0x01 => PacketType::Hello,
            other => PacketType::Unknown(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(pt: PacketType) -> u8 {
        match pt {
            PacketType::Hello => 0x01,
            PacketType::Unknown(v) => v,
        }
    }
}

/// Fixed identity header of a control frame.
///
/// Layout (little-endian, no padding):
///
/// | offset | size | field         |
/// |--------|------|---------------|
/// | 0      | 1    | packet_type   |
/// | 1      | 1    | address       |
/// | 2      | 2    | flags         |
/// | 4      | 4    | driver_class  |
/// | 8      | 4    | serial_number |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    pub packet_type: PacketType,
    pub address: u8,
    /// Low byte holds session flags, high byte is reserved.
    pub flags: u16,
    pub driver_class: u32,
    pub serial_number: u32,
}

impl ControlPacket {
    pub const HEADER_LENGTH: usize = 12;

    pub fn hello(address: u8, flags: u16, driver_class: u32, serial_number: u32) -> Self {
        ControlPacket {
            packet_type: PacketType::Hello,
            address,
            flags,
            driver_class,
            serial_number,
        }
    }

    pub fn is_hello(&self) -> bool {
        self.packet_type == PacketType::Hello
    }

    /// Session flags, i.e. the low byte of `flags`.
    pub fn session_flags(&self) -> u8 {
        (self.flags & 0x00FF) as u8
    }

    pub fn to_bytes(&self) -> [u8; Self::HEADER_LENGTH] {
        let mut buffer = [0u8; Self::HEADER_LENGTH];
        buffer[0] = self.packet_type.into();
        buffer[1] = self.address;
        buffer[2..4].copy_from_slice(&self.flags.to_le_bytes());
        buffer[4..8].copy_from_slice(&self.driver_class.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.serial_number.to_le_bytes());
        buffer
    }
}

impl BusSerialize for ControlPacket {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), CodecError> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

impl BusDeserialize for ControlPacket {
    fn deserialize(reader: &mut &[u8]) -> Result<Self, CodecError> {
        if reader.len() < Self::HEADER_LENGTH {
            return Err(CodecError::TruncatedHeader);
        }
        let packet_type = PacketType::from(u8::deserialize(reader)?);
        let address = u8::deserialize(reader)?;
        let flags = u16::deserialize(reader)?;
        let driver_class = u32::deserialize(reader)?;
        let serial_number = u32::deserialize(reader)?;

        Ok(ControlPacket {
            packet_type,
            address,
            flags,
            driver_class,
            serial_number,
        })
    }
}
