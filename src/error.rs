use crate::codec::CodecError;
use crate::service::ServiceId;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the directory, the service registry and the runtime.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("address {address} is already held by another initialised device")]
    AddressCollision { address: u8 },

    #[error("service is not connected")]
    NotConnected,

    /// The dynamic identifier range is used up. Retrying cannot succeed.
    #[error("dynamic service identifiers exhausted")]
    IdSpaceExhausted,

    #[error("unknown service {0}")]
    UnknownService(ServiceId),

    #[error("service id {0} is already registered")]
    DuplicateServiceId(ServiceId),

    #[error("no free service slot left on this device")]
    NoFreeSlot,

    #[error("service callback failed: {0}")]
    Callback(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BusError {
    /// Whether the same operation may succeed later without reconfiguration.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            BusError::IdSpaceExhausted | BusError::NoFreeSlot | BusError::DuplicateServiceId(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
