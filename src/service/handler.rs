use crate::codec::ServiceInformation;
use crate::directory::Device;
use crate::transport::BusPacket;
use super::{Delivery, Offer};

/// Application behaviour attached to a registered service.
///
/// The runtime enforces the binding rules (class matching, required device,
/// mode); these hooks only add service specific behaviour on top.
pub trait ServiceHandler: Send {
    /// Append service specific bytes for the next advertisement. At most 16
    /// bytes may be written; more fails the control packet build.
    fn add_advertisement_data(&mut self, _data: &mut Vec<u8>) {}

    /// Last say on an offer that already matched by class and device.
    fn handle_service_information(&mut self, _device: &Device, _info: &ServiceInformation) -> Offer {
        Offer::Handled
    }

    fn handle_packet(&mut self, _packet: &BusPacket) -> Delivery {
        Delivery::Handled
    }

    /// Called when the service becomes connected: bound to the peer `device`,
    /// or for hosts, the local device itself once it has an address. An error
    /// aborts the connection.
    fn host_connected(&mut self, _device: &Device) -> Result<(), String> {
        Ok(())
    }

    /// Called when the service stops being connected.
    fn host_disconnected(&mut self) {}
}

/// Handler with every hook left at its default.
pub struct NullHandler;

impl ServiceHandler for NullHandler {}
