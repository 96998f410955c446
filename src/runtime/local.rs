use super::config::BusConfig;
use crate::codec::ControlPacket;
use crate::directory::{Device, DEVICE_FLAGS_CP_SEEN, DEVICE_FLAGS_INITIALISED};
use crate::transport::UNASSIGNED_ADDRESS;

/// Identity of this device on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDevice {
    pub address: u8,
    pub serial_number: u32,
    pub device_class: u32,
    /// Low byte: session flags. High byte: reserved, survives reconnects.
    pub flags: u16,
    pub communication_rate: u8,
}

impl LocalDevice {
    pub fn from_config(config: &BusConfig) -> Self {
        let mut flags = config.flags;
        if config.address != UNASSIGNED_ADDRESS {
            flags |= (DEVICE_FLAGS_INITIALISED | DEVICE_FLAGS_CP_SEEN) as u16;
        }
        LocalDevice {
            address: config.address,
            serial_number: config.serial_number,
            device_class: config.device_class,
            flags,
            communication_rate: config.communication_rate,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.flags & DEVICE_FLAGS_INITIALISED as u16 != 0
    }

    /// Take `address`. Session flags are reset, the reserved high byte is kept.
    pub fn connected(&mut self, address: u8) {
        let reserved = self.flags & 0xFF00;
        self.address = address;
        self.flags = reserved | (DEVICE_FLAGS_INITIALISED | DEVICE_FLAGS_CP_SEEN) as u16;
    }

    pub fn removed(&mut self) {
        self.flags &= !(DEVICE_FLAGS_INITIALISED as u16);
        self.address = UNASSIGNED_ADDRESS;
    }

    /// This device as a directory entry, as handed to host services on connect.
    pub fn as_device(&self) -> Device {
        Device::new(
            self.serial_number as u64,
            self.address,
            (self.flags & 0x00FF) as u8,
            self.communication_rate,
        )
    }

    /// The identity header announced by this device. Only the session flags go on the wire.
    pub fn hello(&self) -> ControlPacket {
        ControlPacket::hello(self.address, self.flags & 0x00FF, self.device_class, self.serial_number)
    }
}
