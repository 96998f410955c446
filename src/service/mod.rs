//! # Services
//!
//! Local participants on the bus. A [`Service`] couples the protocol side
//! (mode, class, slot, binding state) with an application [`ServiceHandler`].
//!
//! ## Binding
//!
//! Client and Host services start `Unbound` and bind to the first advertised
//! record whose class equals theirs (and whose device is the required one, if
//! set). Host and BroadcastHost services are also connected while the local
//! device holds a bus address, since that is the address they are reached on.
//! BroadcastHost services never bind to a peer and are addressed by class.
//!
//! `host_connected` and `host_disconnected` fire when [`Service::is_connected`]
//! changes, whichever of the two causes it.

pub mod dynamic_id;
pub mod handler;

pub use dynamic_id::*;
pub use handler::*;

use crate::codec::{CodecError, ServiceInformation, MAX_ADVERTISEMENT_DATA};
use crate::directory::{Device, DeviceHandle};
use crate::transport::BusPacket;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub u32);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Seeks another device's resource
    Client,
    /// Hosts a resource for others to use
    Host,
    /// Hosts a resource and receives every packet of its class on the bus
    BroadcastHost,
}

impl ServiceMode {
    /// Whether services in this mode own a slot and advertise it.
    pub fn advertises(&self) -> bool {
        !matches!(self, ServiceMode::Client)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Unbound,
    Bound,
}

/// Answer to an advertised record offered to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Handled,
    /// Keep searching other services.
    NotHandled,
}

/// Answer to a data packet dispatched to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Handled,
    /// Keep searching other services of the same class.
    NotForMe,
}

/// What happened when a record was offered to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OfferOutcome {
    Declined,
    /// Already bound to this device and slot.
    Refreshed,
    Bound,
    /// `host_connected` failed; the service stays unbound.
    Rejected(String),
}

impl OfferOutcome {
    pub(crate) fn offer(&self) -> Offer {
        match self {
            OfferOutcome::Refreshed | OfferOutcome::Bound => Offer::Handled,
            OfferOutcome::Declined | OfferOutcome::Rejected(_) => Offer::NotHandled,
        }
    }
}

pub struct Service {
    id: Option<ServiceId>,
    mode: ServiceMode,
    service_class: u32,
    // Local slot, 0 until a Host/BroadcastHost is registered.
    service_number: u8,
    service_flags: u8,
    // Binding to a remote device.
    state: ServiceState,
    // Local device enumerated; Host and BroadcastHost only.
    online: bool,
    device: Option<DeviceHandle>,
    remote_slot: u8,
    required_device: Option<DeviceHandle>,
    handler: Box<dyn ServiceHandler>,
}

impl Service {
    pub fn new(mode: ServiceMode, service_class: u32, handler: Box<dyn ServiceHandler>) -> Self {
        Service {
            id: None,
            mode,
            service_class,
            service_number: 0,
            service_flags: 0,
            state: ServiceState::Unbound,
            online: false,
            device: None,
            remote_slot: 0,
            required_device: None,
            handler,
        }
    }

    pub fn client(service_class: u32, handler: impl ServiceHandler + 'static) -> Self {
        Self::new(ServiceMode::Client, service_class, Box::new(handler))
    }

    pub fn host(service_class: u32, handler: impl ServiceHandler + 'static) -> Self {
        Self::new(ServiceMode::Host, service_class, Box::new(handler))
    }

    pub fn broadcast_host(service_class: u32, handler: impl ServiceHandler + 'static) -> Self {
        Self::new(ServiceMode::BroadcastHost, service_class, Box::new(handler))
    }

    /// Use a fixed identifier instead of a dynamically allocated one.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(ServiceId(id));
        self
    }

    pub fn with_flags(mut self, service_flags: u8) -> Self {
        self.service_flags = service_flags;
        self
    }

    /// Only bind to this particular device.
    pub fn require_device(mut self, device: DeviceHandle) -> Self {
        self.required_device = Some(device);
        self
    }

    pub fn id(&self) -> Option<ServiceId> {
        self.id
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn service_class(&self) -> u32 {
        self.service_class
    }

    pub fn service_flags(&self) -> u8 {
        self.service_flags
    }

    /// Local slot of an advertising service.
    pub fn service_number(&self) -> Option<u8> {
        (self.service_number != 0).then_some(self.service_number)
    }

    pub fn state(&self) -> ServiceState {
        if self.is_connected() { ServiceState::Bound } else { ServiceState::Unbound }
    }

    pub fn is_connected(&self) -> bool {
        match self.mode {
            ServiceMode::Client => self.state == ServiceState::Bound,
            ServiceMode::Host => self.online || self.state == ServiceState::Bound,
            ServiceMode::BroadcastHost => self.online,
        }
    }

    /// The device this service is bound to.
    pub fn host_device(&self) -> Option<DeviceHandle> {
        self.device
    }

    /// Slot on the bound device this service talks to.
    pub fn remote_slot(&self) -> Option<u8> {
        self.device.map(|_| self.remote_slot)
    }

    pub fn required_device(&self) -> Option<DeviceHandle> {
        self.required_device
    }

    pub(crate) fn assign(&mut self, id: ServiceId, service_number: u8) {
        self.id = Some(id);
        self.service_number = service_number;
    }

    /// The local device was given an address. Client services ignore this.
    /// A refusal from `host_connected` leaves the service offline.
    pub(crate) fn local_connected(&mut self, local: &Device) -> Result<(), String> {
        if !self.mode.advertises() || self.online {
            return Ok(());
        }
        if self.state != ServiceState::Bound {
            self.handler.host_connected(local)?;
        }
        self.online = true;
        Ok(())
    }

    /// The local device lost its address. Returns true when the service was online.
    pub(crate) fn local_disconnected(&mut self) -> bool {
        if !self.online {
            return false;
        }
        self.online = false;
        if self.state != ServiceState::Bound {
            self.handler.host_disconnected();
        }
        true
    }

    /// Offer a record advertised by `device` in `slot`.
    pub(crate) fn offer(&mut self, handle: DeviceHandle, device: &Device, slot: u8, info: &ServiceInformation) -> OfferOutcome {
        if self.mode == ServiceMode::BroadcastHost || info.is_vacant() || info.service_class != self.service_class {
            return OfferOutcome::Declined;
        }

        if self.state == ServiceState::Bound {
            if self.device == Some(handle) && self.remote_slot == slot {
                return OfferOutcome::Refreshed;
            }
            return OfferOutcome::Declined;
        }

        if self.required_device.is_some_and(|required| required != handle) {
            return OfferOutcome::Declined;
        }
        if self.handler.handle_service_information(device, info) == Offer::NotHandled {
            return OfferOutcome::Declined;
        }
        if !self.online {
            if let Err(reason) = self.handler.host_connected(device) {
                return OfferOutcome::Rejected(reason);
            }
        }

        self.device = Some(handle);
        self.remote_slot = slot;
        self.state = ServiceState::Bound;
        OfferOutcome::Bound
    }

    /// Drop the binding to a device. BroadcastHost services are unaffected.
    /// Returns true when a binding was actually released.
    pub(crate) fn unbind(&mut self) -> bool {
        if self.mode == ServiceMode::BroadcastHost || self.state == ServiceState::Unbound {
            return false;
        }
        self.state = ServiceState::Unbound;
        self.device = None;
        self.remote_slot = 0;
        if !self.online {
            self.handler.host_disconnected();
        }
        true
    }

    /// Final teardown on removal from the registry.
    pub(crate) fn detach(&mut self) {
        self.unbind();
        self.local_disconnected();
        self.service_number = 0;
    }

    /// Append this service's advertisement payload to `data`.
    ///
    /// Clients advertise nothing and always succeed with zero bytes. A handler
    /// writing more than 16 bytes is rejected and `data` is restored.
    pub fn add_advertisement_data(&mut self, data: &mut Vec<u8>) -> Result<usize, CodecError> {
        if !self.mode.advertises() {
            return Ok(0);
        }
        let start = data.len();
        self.handler.add_advertisement_data(data);
        let written = data.len() - start;
        if written > MAX_ADVERTISEMENT_DATA {
            data.truncate(start);
            return Err(CodecError::PayloadTooLarge { len: written });
        }
        Ok(written)
    }

    /// The record this service contributes to the local control packet.
    pub(crate) fn advertisement(&mut self) -> Result<Option<ServiceInformation>, CodecError> {
        if !self.mode.advertises() {
            return Ok(None);
        }
        let mut payload = Vec::with_capacity(MAX_ADVERTISEMENT_DATA);
        self.add_advertisement_data(&mut payload)?;
        ServiceInformation::new(self.service_class, self.service_flags, &payload).map(Some)
    }

    pub(crate) fn handle_packet(&mut self, packet: &BusPacket) -> Delivery {
        if !self.is_connected() {
            return Delivery::NotForMe;
        }
        self.handler.handle_packet(packet)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            ServiceMode::Client => "client",
            ServiceMode::Host => "host",
            ServiceMode::BroadcastHost => "broadcast host",
        };
        match self.id {
            Some(id) => write!(f, "{} {}", mode, id),
            None => write!(f, "{} (unregistered)", mode),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("service_class", &format_args!("0x{:08x}", self.service_class))
            .field("service_number", &self.service_number)
            .field("state", &self.state)
            .field("online", &self.online)
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DEVICE_FLAGS_CP_SEEN, DEVICE_FLAGS_INITIALISED};
    use std::sync::{Arc, Mutex};

    const CLASS: u32 = 0x1001;

    fn handle(index: u32) -> DeviceHandle {
        DeviceHandle { index, generation: 0 }
    }

    fn device(address: u8) -> Device {
        Device::new(address as u64, address, DEVICE_FLAGS_INITIALISED | DEVICE_FLAGS_CP_SEEN, 1)
    }

    fn record(class: u32) -> ServiceInformation {
        ServiceInformation::new(class, 0, &[]).unwrap()
    }

    struct Refusing;

    impl ServiceHandler for Refusing {
        fn host_connected(&mut self, _device: &Device) -> Result<(), String> {
            Err("busy".to_string())
        }
    }

    #[derive(Clone, Default)]
    struct Hooks(Arc<Mutex<Vec<String>>>);

    impl ServiceHandler for Hooks {
        fn host_connected(&mut self, device: &Device) -> Result<(), String> {
            self.0.lock().unwrap().push(format!("up {}", device.address));
            Ok(())
        }

        fn host_disconnected(&mut self) {
            self.0.lock().unwrap().push("down".to_string());
        }
    }

    struct Chatty;

    impl ServiceHandler for Chatty {
        fn add_advertisement_data(&mut self, data: &mut Vec<u8>) {
            data.extend_from_slice(&[0xAB; 17]);
        }
    }

    #[test]
    fn test_client_binds_on_matching_class() {
        let mut svc = Service::client(CLASS, NullHandler);
        assert!(!svc.is_connected());

        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(0x2002)), OfferOutcome::Declined);
        assert!(!svc.is_connected());

        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(CLASS)), OfferOutcome::Bound);
        assert!(svc.is_connected());
        assert_eq!(svc.host_device(), Some(handle(0)));
        assert_eq!(svc.remote_slot(), Some(1));
    }

    #[test]
    fn test_bound_service_refreshes_only_its_binding() {
        let mut svc = Service::client(CLASS, NullHandler);
        svc.offer(handle(0), &device(4), 1, &record(CLASS));

        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(CLASS)), OfferOutcome::Refreshed);
        assert_eq!(svc.offer(handle(0), &device(4), 2, &record(CLASS)), OfferOutcome::Declined);
        assert_eq!(svc.offer(handle(1), &device(5), 1, &record(CLASS)), OfferOutcome::Declined);
    }

    #[test]
    fn test_required_device() {
        let mut svc = Service::client(CLASS, NullHandler).require_device(handle(3));
        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(CLASS)), OfferOutcome::Declined);
        assert_eq!(svc.offer(handle(3), &device(7), 1, &record(CLASS)), OfferOutcome::Bound);
    }

    #[test]
    fn test_failed_host_connected_leaves_unbound() {
        let mut svc = Service::host(CLASS, Refusing);
        let outcome = svc.offer(handle(0), &device(4), 1, &record(CLASS));
        assert_eq!(outcome, OfferOutcome::Rejected("busy".to_string()));
        assert_eq!(outcome.offer(), Offer::NotHandled);
        assert_eq!(svc.state(), ServiceState::Unbound);
        assert!(svc.host_device().is_none());
    }

    #[test]
    fn test_broadcast_host_never_binds() {
        let mut svc = Service::broadcast_host(CLASS, NullHandler);
        svc.assign(ServiceId(3000), 1);
        assert!(!svc.is_connected());
        svc.local_connected(&device(1)).unwrap();
        assert!(svc.is_connected());
        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(CLASS)), OfferOutcome::Declined);
        assert!(!svc.unbind());
        assert!(svc.is_connected());

        svc.detach();
        assert!(!svc.is_connected());
    }

    #[test]
    fn test_host_connection_follows_local_device() {
        let hooks = Hooks::default();
        let mut svc = Service::host(CLASS, hooks.clone());
        svc.assign(ServiceId(3000), 1);
        assert!(!svc.is_connected());

        svc.local_connected(&device(1)).unwrap();
        assert!(svc.is_connected());
        assert_eq!(svc.state(), ServiceState::Bound);

        // A peer of the same class binds without a second connect.
        assert_eq!(svc.offer(handle(0), &device(4), 1, &record(CLASS)), OfferOutcome::Bound);
        assert_eq!(svc.host_device(), Some(handle(0)));
        assert!(svc.unbind());
        assert!(svc.is_connected());

        assert!(svc.local_disconnected());
        assert!(!svc.is_connected());
        assert!(!svc.local_disconnected());
        assert_eq!(*hooks.0.lock().unwrap(), vec!["up 1", "down"]);
    }

    #[test]
    fn test_bound_host_stays_connected_offline() {
        let hooks = Hooks::default();
        let mut svc = Service::host(CLASS, hooks.clone());
        svc.offer(handle(0), &device(4), 1, &record(CLASS));
        svc.local_connected(&device(1)).unwrap();
        svc.local_disconnected();
        assert!(svc.is_connected());

        svc.detach();
        assert!(!svc.is_connected());
        assert_eq!(*hooks.0.lock().unwrap(), vec!["up 4", "down"]);
    }

    #[test]
    fn test_host_may_refuse_local_device() {
        let mut svc = Service::host(CLASS, Refusing);
        assert_eq!(svc.local_connected(&device(1)), Err("busy".to_string()));
        assert!(!svc.is_connected());
    }

    #[test]
    fn test_client_ignores_local_device() {
        let mut svc = Service::client(CLASS, NullHandler);
        svc.local_connected(&device(1)).unwrap();
        assert!(!svc.is_connected());
        assert!(!svc.local_disconnected());
    }

    #[test]
    fn test_vacant_record_never_matches() {
        let mut svc = Service::client(0, NullHandler);
        assert_eq!(svc.offer(handle(0), &device(4), 1, &ServiceInformation::vacant()), OfferOutcome::Declined);
    }

    #[test]
    fn test_unbind_clears_device() {
        let mut svc = Service::client(CLASS, NullHandler);
        svc.offer(handle(0), &device(4), 1, &record(CLASS));
        assert!(svc.unbind());
        assert!(!svc.is_connected());
        assert!(svc.host_device().is_none());
        assert!(svc.remote_slot().is_none());
        assert!(!svc.unbind());
    }

    #[test]
    fn test_client_advertises_nothing() {
        let mut svc = Service::client(CLASS, Chatty);
        let mut data = Vec::new();
        assert_eq!(svc.add_advertisement_data(&mut data).unwrap(), 0);
        assert!(data.is_empty());
        assert!(svc.advertisement().unwrap().is_none());
    }

    #[test]
    fn test_oversized_advertisement_rejected() {
        let mut svc = Service::host(CLASS, Chatty);
        let mut data = vec![0x01];
        let result = svc.add_advertisement_data(&mut data);
        assert!(matches!(result, Err(CodecError::PayloadTooLarge { len: 17 })));
        assert_eq!(data, vec![0x01]);
    }

    #[test]
    fn test_unbound_service_ignores_packets() {
        let mut svc = Service::client(CLASS, NullHandler);
        let packet = BusPacket {
            address: 4,
            service_number: 1,
            communication_rate: 1,
            data: vec![],
        };
        assert_eq!(svc.handle_packet(&packet), Delivery::NotForMe);
    }
}
