use super::broadcast_map::BroadcastMap;
use std::fmt;

/// Device has been enumerated and holds its address.
pub const DEVICE_FLAGS_INITIALISED: u8 = 0x01;
/// A control packet has been seen from the device.
pub const DEVICE_FLAGS_CP_SEEN: u8 = 0x02;

/// Stable reference to a directory entry. A handle to a removed device never
/// resolves again, even after its arena slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A remote device known to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub udid: u64,
    pub device_flags: u8,
    pub address: u8,
    pub communication_rate: u8,
    /// Bumped on every control packet from this device.
    pub rolling_counter: u8,
    pub broadcast_map: BroadcastMap,
    pub name: Option<String>,
}

impl Device {
    pub fn new(udid: u64, address: u8, device_flags: u8, communication_rate: u8) -> Self {
        Device {
            udid,
            device_flags,
            address,
            communication_rate,
            rolling_counter: 0,
            broadcast_map: BroadcastMap::new(),
            name: None,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.device_flags & DEVICE_FLAGS_INITIALISED != 0
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}@{}", name, self.address),
            None => write!(f, "dev@{}", self.address),
        }
    }
}
