//! # Bus Codec Module
//!
//! Byte-exact encoding of the control traffic exchanged on the bus.
//!
//! ## Key Types
//!
//! - [`ControlPacket`] - 12-byte identity ("hello") header
//! - [`ServiceInformation`] - per-service advertisement record (6-byte prefix + up to 16 bytes)
//! - [`ControlFrame`] - a hello header followed by packed advertisement records
//! - [`BusSerialize`] / [`BusDeserialize`] - Traits for wire encoding
//!
//! All multi-byte fields are little-endian. No field relies on in-memory layout.
//!
//! ## Example
//!
//! ```ignore
//! use jdbus::codec::{ControlPacket, BusSerialize};
//!
//! let hello = ControlPacket::hello(5, 0x00FF, 0x1234, 42);
//! let mut bytes = Vec::new();
//! hello.serialize(&mut bytes)?;
//! ```

pub mod frame;
pub mod header;
pub mod primitives;
pub mod service_info;
pub mod traits;

pub use frame::{ControlFrame, ServiceInfoIter};
pub use header::{ControlPacket, PacketType};
pub use service_info::{ServiceInformation, MAX_ADVERTISEMENT_DATA, SERVICE_CLASS_NONE};
pub use traits::{BusDeserialize, BusSerialize};

use thiserror::Error;

/// Errors raised while encoding or decoding bus structures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer too small for control packet header")]
    TruncatedHeader,

    #[error("truncated service record: {declared} payload bytes declared, {available} available")]
    TruncatedRecord { declared: usize, available: usize },

    #[error("advertisement payload of {len} bytes exceeds the {max} byte limit", max = MAX_ADVERTISEMENT_DATA)]
    PayloadTooLarge { len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

mod tests;
