use std::fmt;

/// Service number reserved for control traffic on every device.
pub const CONTROL_SERVICE_NUMBER: u8 = 0;

/// Address used by control traffic and by devices that have not been enumerated.
pub const UNASSIGNED_ADDRESS: u8 = 0;

/// Destination of an outgoing frame: a device address plus a service slot on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub address: u8,
    pub service_number: u8,
}

impl Target {
    pub const CONTROL: Target = Target {
        address: UNASSIGNED_ADDRESS,
        service_number: CONTROL_SERVICE_NUMBER,
    };

    pub fn new(address: u8, service_number: u8) -> Self {
        Target { address, service_number }
    }

    pub fn is_control(&self) -> bool {
        *self == Target::CONTROL
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.service_number)
    }
}

/// An inbound packet as handed over by the lower transport: already framed,
/// checksummed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusPacket {
    pub address: u8,
    pub service_number: u8,
    pub communication_rate: u8,
    pub data: Vec<u8>,
}

impl BusPacket {
    pub fn new(target: Target, communication_rate: u8, data: &[u8]) -> Self {
        BusPacket {
            address: target.address,
            service_number: target.service_number,
            communication_rate,
            data: data.to_vec(),
        }
    }

    pub fn target(&self) -> Target {
        Target::new(self.address, self.service_number)
    }

    pub fn is_control(&self) -> bool {
        self.target().is_control()
    }
}
