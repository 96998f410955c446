//! # Bus Runtime
//!
//! The context object tying together the local identity, the device
//! directory, the registered services and the transport.
//!
//! ## Key Types
//!
//! - [`BusRuntime`] - applies control packets, routes data packets, builds announcements
//! - [`Dispatcher`] / [`DispatchHandle`] - single dispatch context around a runtime
//! - [`BusConfig`] - local device configuration
//!
//! ## Lifecycle
//!
//! 1. Create: `BusRuntime::new(&config, transport)`
//! 2. Register services: `runtime.register_service(Service::client(class, handler))`
//! 3. Hand packets from the transport to `handle_packet` (or through a [`Dispatcher`])
//! 4. Announce periodically with `queue_control_packet`
//! 5. Report vanished devices with `remove_device`
//!
//! ## Example
//!
//! ```ignore
//! let bus = MemoryBus::new();
//! let mut runtime = BusRuntime::new(&BusConfig::new(5, 42, 0x1234), bus.attach(1));
//! let id = runtime.register_service(Service::client(0x2001, NullHandler))?;
//! runtime.queue_control_packet()?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod local;

pub use config::*;
pub use dispatcher::*;
pub use local::*;

use crate::codec::{ControlFrame, ServiceInformation};
use crate::directory::{
    BroadcastMap, Device, DeviceDirectory, DeviceHandle, Upsert, DEVICE_FLAGS_CP_SEEN, DEVICE_FLAGS_INITIALISED,
    MAX_HOST_SERVICES,
};
use crate::error::{BusError, Result};
use crate::logging::{BusLogger, LogFacade, LogLevel};
use crate::service::{Delivery, DynamicIdAllocator, Offer, OfferOutcome, Service, ServiceId, ServiceMode};
use crate::transport::{BusPacket, BusTransport, Target, UNASSIGNED_ADDRESS};
use std::sync::Arc;

pub struct BusRuntime {
    local: LocalDevice,
    transport: Arc<dyn BusTransport>,
    directory: DeviceDirectory,
    // Registration order is matching order.
    services: Vec<Service>,
    ids: Arc<DynamicIdAllocator>,
    logger: Arc<dyn BusLogger>,
}

impl BusRuntime {
    pub fn new(config: &BusConfig, transport: Arc<dyn BusTransport>) -> Self {
        BusRuntime {
            local: LocalDevice::from_config(config),
            transport,
            directory: DeviceDirectory::new(),
            services: Vec::new(),
            ids: DynamicIdAllocator::shared(),
            logger: LogFacade::new(),
        }
    }

    /// Load the configuration at `path`, install the logger and build a runtime.
    pub fn load(path: &str, transport: Arc<dyn BusTransport>) -> std::result::Result<Self, ConfigError> {
        let config = BusConfig::load(path)?;
        crate::logging::init(config.log_filter.as_deref());
        let runtime = Self::new(&config, transport);
        runtime.logger.log(
            LogLevel::Info,
            "Runtime",
            &format!("Loaded config from {} (serial {})", path, config.serial_number),
        );
        Ok(runtime)
    }

    pub fn with_id_allocator(mut self, ids: Arc<DynamicIdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn BusLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> Arc<dyn BusLogger> {
        self.logger.clone()
    }

    pub fn local(&self) -> &LocalDevice {
        &self.local
    }

    /// Record the address handed to this device by the bus controller.
    /// Host and BroadcastHost services come online with it.
    pub fn assign_address(&mut self, address: u8) {
        self.local.connected(address);
        self.logger.log(
            LogLevel::Info,
            "Control",
            &format!("Local device a:{} sn:{} connected", address, self.local.serial_number),
        );
        let local = self.local.as_device();
        for service in self.services.iter_mut() {
            Self::connect_local(&self.logger, service, &local);
        }
    }

    /// Give up the local address. Host and BroadcastHost services go offline.
    pub fn release_address(&mut self) {
        self.logger.log(
            LogLevel::Info,
            "Control",
            &format!("Local device a:{} sn:{} disconnected", self.local.address, self.local.serial_number),
        );
        self.local.removed();
        for service in self.services.iter_mut() {
            if service.local_disconnected() {
                self.logger.log(LogLevel::Debug, "Service", &format!("{} offline", service));
            }
        }
    }

    fn connect_local(logger: &Arc<dyn BusLogger>, service: &mut Service, local: &Device) {
        if let Err(reason) = service.local_connected(local) {
            logger.log(
                LogLevel::Warn,
                "Service",
                &format!("{} refused local device a:{}: {}", service, local.address, reason),
            );
        }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub fn rename_device(&mut self, handle: DeviceHandle, name: &str) -> bool {
        self.directory.rename(handle, name)
    }

    // ---- service registry ----

    /// Register `service`, assigning its identifier and, for hosts, a local slot.
    pub fn register_service(&mut self, mut service: Service) -> Result<ServiceId> {
        if let Some(id) = service.id() {
            if self.position(id).is_some() {
                return Err(BusError::DuplicateServiceId(id));
            }
        }

        let slot = if service.mode().advertises() { self.free_slot().ok_or(BusError::NoFreeSlot)? } else { 0 };

        let id = match service.id() {
            Some(id) => id,
            None => ServiceId(self.ids.allocate()?),
        };

        service.assign(id, slot);
        if self.local.is_connected() {
            Self::connect_local(&self.logger, &mut service, &self.local.as_device());
        }
        self.logger.log(
            LogLevel::Info,
            "Service",
            &format!(
                "Registered {:?} service {} class 0x{:08x} slot {}",
                service.mode(),
                id,
                service.service_class(),
                slot
            ),
        );
        self.services.push(service);
        Ok(id)
    }

    /// Remove a service and hand it back. Other services keep their bindings.
    pub fn remove_service(&mut self, id: ServiceId) -> Result<Service> {
        let index = self.position(id).ok_or(BusError::UnknownService(id))?;
        let mut service = self.services.remove(index);

        if service.mode() == ServiceMode::BroadcastHost {
            if let Some(slot) = service.service_number() {
                self.directory.clear_broadcast_slot(slot);
            }
        }
        service.detach();

        self.logger.log(LogLevel::Info, "Service", &format!("Removed service {}", id));
        Ok(service)
    }

    pub fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id() == Some(id))
    }

    /// Registered services in registration order.
    pub fn services(&self) -> impl Iterator<Item = &Service> + '_ {
        self.services.iter()
    }

    pub fn is_connected(&self, id: ServiceId) -> bool {
        self.service(id).is_some_and(|s| s.is_connected())
    }

    /// The device `id` is bound to.
    pub fn host_device(&self, id: ServiceId) -> Option<&Device> {
        let handle = self.service(id)?.host_device()?;
        self.directory.get(handle)
    }

    fn position(&self, id: ServiceId) -> Option<usize> {
        self.services.iter().position(|s| s.id() == Some(id))
    }

    fn free_slot(&self) -> Option<u8> {
        (1..MAX_HOST_SERVICES as u8).find(|slot| !self.services.iter().any(|s| s.service_number() == Some(*slot)))
    }

    // ---- outgoing control packets ----

    /// Build the local control frame: the hello header followed by one record
    /// per slot up to the highest one in use. Vacant slots get placeholder records.
    pub fn build_control_packet(&mut self) -> Result<Vec<u8>> {
        let mut frame = ControlFrame::new(self.local.hello());

        let highest = self.services.iter().filter_map(|s| s.service_number()).max().unwrap_or(0);
        frame.records = vec![ServiceInformation::vacant(); highest as usize];

        for service in self.services.iter_mut() {
            let Some(slot) = service.service_number() else { continue };
            if let Some(record) = service.advertisement()? {
                frame.records[slot as usize - 1] = record;
            }
        }

        Ok(frame.to_bytes()?)
    }

    /// Build and transmit the local control frame.
    pub fn queue_control_packet(&mut self) -> Result<()> {
        let bytes = self.build_control_packet()?;
        self.transport.transmit(&bytes, Target::CONTROL)?;
        self.logger.log(
            LogLevel::Debug,
            "Control",
            &format!("Queued control packet a:{} ({} bytes)", self.local.address, bytes.len()),
        );
        Ok(())
    }

    // ---- incoming packets ----

    /// Entry point for every packet handed over by the transport.
    pub fn handle_packet(&mut self, packet: &BusPacket) -> Result<Delivery> {
        #[cfg(feature = "packet-dump")]
        self.logger.log(
            LogLevel::Debug,
            "Dispatch",
            &format!("RX {} rate {} {:02x?}", packet.target(), packet.communication_rate, packet.data),
        );

        if packet.is_control() {
            self.handle_control_packet(packet)?;
            return Ok(Delivery::Handled);
        }
        Ok(self.route_packet(packet))
    }

    /// Apply a control packet: refresh the sender's directory entry, offer its
    /// advertised records to local services and rebuild its broadcast map.
    ///
    /// Returns the sender's handle, or `None` when the packet was ignored.
    pub fn handle_control_packet(&mut self, packet: &BusPacket) -> Result<Option<DeviceHandle>> {
        let (hello, records) = ControlFrame::parse(&packet.data)?;

        if !hello.is_hello() {
            self.logger.log(
                LogLevel::Debug,
                "Control",
                &format!("Ignoring control packet type {:?}", hello.packet_type),
            );
            return Ok(None);
        }
        if hello.address == UNASSIGNED_ADDRESS {
            return Ok(None);
        }
        if self.local.is_connected() && hello.address == self.local.address {
            if hello.serial_number == self.local.serial_number {
                return Ok(None);
            }
            self.logger.log(
                LogLevel::Warn,
                "Control",
                &format!("Device sn:{} claims our address {}", hello.serial_number, hello.address),
            );
            return Err(BusError::AddressCollision { address: hello.address });
        }

        let flags = hello.session_flags() | DEVICE_FLAGS_INITIALISED | DEVICE_FLAGS_CP_SEEN;
        let (handle, kind) = match self.directory.upsert(
            hello.serial_number as u64,
            hello.address,
            flags,
            packet.communication_rate,
        ) {
            Ok(result) => result,
            Err(e) => {
                self.logger.log(
                    LogLevel::Warn,
                    "Directory",
                    &format!("Rejected control packet from sn:{}: {}", hello.serial_number, e),
                );
                return Err(e);
            }
        };
        if kind == Upsert::Inserted {
            self.logger.log(
                LogLevel::Info,
                "Directory",
                &format!("Discovered a:{} sn:{} class 0x{:08x}", hello.address, hello.serial_number, hello.driver_class),
            );
        }

        // Record k describes the sender's slot k + 1.
        let mut advertised: Vec<(u8, ServiceInformation)> = Vec::new();
        let mut complete = true;
        for (index, record) in records.enumerate() {
            if index + 1 >= MAX_HOST_SERVICES {
                self.logger.log(
                    LogLevel::Warn,
                    "Control",
                    &format!("a:{} advertises more than {} services", hello.address, MAX_HOST_SERVICES - 1),
                );
                break;
            }
            match record {
                Ok(info) => advertised.push((index as u8 + 1, info)),
                Err(e) => {
                    self.logger.log(
                        LogLevel::Warn,
                        "Control",
                        &format!("Dropping rest of control packet from a:{}: {}", hello.address, e),
                    );
                    complete = false;
                    break;
                }
            }
        }

        self.release_withdrawn(handle, &advertised, complete);
        self.offer_records(handle, &advertised);
        self.update_broadcast_map(handle, &advertised, complete);

        Ok(Some(handle))
    }

    /// Unbind services whose slot on `handle` no longer carries their class.
    fn release_withdrawn(&mut self, handle: DeviceHandle, advertised: &[(u8, ServiceInformation)], complete: bool) {
        for service in self.services.iter_mut() {
            if service.host_device() != Some(handle) {
                continue;
            }
            let Some(slot) = service.remote_slot() else { continue };
            let withdrawn = match advertised.iter().find(|(s, _)| *s == slot) {
                Some((_, info)) => info.service_class != service.service_class(),
                None => complete,
            };
            if withdrawn && service.unbind() {
                self.logger.log(
                    LogLevel::Info,
                    "Service",
                    &format!("{} lost its host: slot {} withdrawn", service, slot),
                );
            }
        }
    }

    /// Offer each record to the services in registration order; first taker wins.
    fn offer_records(&mut self, handle: DeviceHandle, advertised: &[(u8, ServiceInformation)]) {
        let Some(device) = self.directory.get(handle) else { return };

        for (slot, info) in advertised.iter().filter(|(_, info)| !info.is_vacant()) {
            for service in self.services.iter_mut() {
                let outcome = service.offer(handle, device, *slot, info);
                match &outcome {
                    OfferOutcome::Bound => self.logger.log(
                        LogLevel::Info,
                        "Service",
                        &format!("{} bound to {} slot {} ({})", service, device, slot, info),
                    ),
                    OfferOutcome::Rejected(reason) => self.logger.log(
                        LogLevel::Warn,
                        "Service",
                        &format!("{} refused {} slot {}: {}", service, device, slot, reason),
                    ),
                    OfferOutcome::Declined | OfferOutcome::Refreshed => {}
                }
                if outcome.offer() == Offer::Handled {
                    break;
                }
            }
        }
    }

    /// Point the sender's broadcast slots at the local BroadcastHost of the same class.
    fn update_broadcast_map(&mut self, handle: DeviceHandle, advertised: &[(u8, ServiceInformation)], complete: bool) {
        let Some(device) = self.directory.get_mut(handle) else { return };

        let mut map = if complete { BroadcastMap::new() } else { device.broadcast_map };
        for (slot, info) in advertised {
            let local = if info.is_vacant() {
                None
            } else {
                self.services
                    .iter()
                    .find(|s| s.mode() == ServiceMode::BroadcastHost && s.service_class() == info.service_class)
                    .and_then(|s| s.service_number())
            };
            match local {
                Some(local) => {
                    map.set(*slot, local);
                }
                None => map.clear(*slot),
            }
        }
        device.broadcast_map = map;
    }

    /// Route a data packet to the service it belongs to.
    ///
    /// Packets carry the address of the hosting device: our own address means
    /// a local host slot, a remote address means a client bound to that device
    /// or, failing that, a broadcast translation.
    pub fn route_packet(&mut self, packet: &BusPacket) -> Delivery {
        if self.local.is_connected() && packet.address == self.local.address {
            return match self
                .services
                .iter_mut()
                .find(|s| s.mode().advertises() && s.service_number() == Some(packet.service_number))
            {
                Some(service) => service.handle_packet(packet),
                None => Delivery::NotForMe,
            };
        }

        let Some((handle, device)) = self.directory.lookup_by_address(packet.address) else {
            self.logger.log(
                LogLevel::Debug,
                "Dispatch",
                &format!("Packet from unknown address {}", packet.address),
            );
            return Delivery::NotForMe;
        };
        let broadcast_slot = device.broadcast_map.get(packet.service_number);

        for service in self.services.iter_mut() {
            if service.mode() == ServiceMode::BroadcastHost
                || service.host_device() != Some(handle)
                || service.remote_slot() != Some(packet.service_number)
            {
                continue;
            }
            if service.handle_packet(packet) == Delivery::Handled {
                return Delivery::Handled;
            }
        }

        if let Some(local) = broadcast_slot {
            for service in self.services.iter_mut() {
                if service.mode() == ServiceMode::BroadcastHost
                    && service.service_number() == Some(local)
                    && service.handle_packet(packet) == Delivery::Handled
                {
                    return Delivery::Handled;
                }
            }
        }
        Delivery::NotForMe
    }

    /// Forget the device at `address`. Every service bound to it is
    /// disconnected before the entry is freed.
    pub fn remove_device(&mut self, address: u8) -> Option<Device> {
        let (handle, _) = self.directory.lookup_by_address(address)?;
        self.release_device(handle, address);

        let (_, device) = self.directory.remove(address)?;
        self.logger.log(
            LogLevel::Info,
            "Directory",
            &format!("Removed {} sn:{}", device, device.udid),
        );
        Some(device)
    }

    /// Unbind every service bound to `handle`.
    fn release_device(&mut self, handle: DeviceHandle, address: u8) {
        for service in self.services.iter_mut() {
            if service.host_device() == Some(handle) && service.unbind() {
                self.logger.log(
                    LogLevel::Info,
                    "Service",
                    &format!("{} disconnected: a:{} removed", service, address),
                );
            }
        }
    }

    // ---- outgoing data ----

    /// Send `data` on behalf of service `id`.
    pub fn send(&self, id: ServiceId, data: &[u8]) -> Result<()> {
        let service = self.service(id).ok_or(BusError::UnknownService(id))?;
        if !service.is_connected() {
            return Err(BusError::NotConnected);
        }

        let target = match service.mode() {
            ServiceMode::Client => {
                let device = service
                    .host_device()
                    .and_then(|h| self.directory.get(h))
                    .ok_or(BusError::NotConnected)?;
                Target::new(device.address, service.remote_slot().unwrap_or_default())
            }
            ServiceMode::Host | ServiceMode::BroadcastHost => {
                if !self.local.is_connected() {
                    return Err(BusError::NotConnected);
                }
                Target::new(self.local.address, service.service_number().unwrap_or_default())
            }
        };

        self.transport.transmit(data, target)?;
        Ok(())
    }
}
