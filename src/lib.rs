pub mod codec;
pub mod directory;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod service;
pub mod transport;

pub use transport::{BusPacket, BusTransport, MemoryBus, MemoryTransport, Target};
pub use codec::{BusDeserialize, BusSerialize, ControlFrame, ControlPacket, ServiceInformation};

pub use directory::{Device, DeviceDirectory, DeviceHandle};
pub use error::{BusError, Result};
pub use service::{Delivery, Offer, Service, ServiceHandler, ServiceId, ServiceMode};
pub use runtime::{BusConfig, BusRuntime, DispatchHandle, Dispatcher};
