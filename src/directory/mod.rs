//! # Device Directory
//!
//! Remote devices discovered from control packets, keyed by bus address.
//! Entries live in an arena with a free list; [`DeviceHandle`]s carry a
//! generation so services can hold them without risk of dangling.

pub mod broadcast_map;
pub mod device;

pub use broadcast_map::*;
pub use device::*;

use crate::error::{BusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    device: Option<Device>,
}

#[derive(Debug, Default)]
pub struct DeviceDirectory {
    slots: Vec<Slot>,
    free: Vec<u32>,
    // Discovery order.
    order: Vec<DeviceHandle>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, handle: DeviceHandle) -> Option<&Device> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.device.as_ref()
    }

    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut Device> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.device.as_mut()
    }

    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn lookup_by_address(&self, address: u8) -> Option<(DeviceHandle, &Device)> {
        self.devices().find(|(_, d)| d.address == address)
    }

    /// Devices in discovery order.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceHandle, &Device)> + '_ {
        self.order.iter().filter_map(move |h| self.get(*h).map(|d| (*h, d)))
    }

    /// Record a control packet from `address`.
    ///
    /// An existing entry with the same identity is refreshed and its rolling
    /// counter bumped. A different identity on an uninitialised entry replaces
    /// it under a new handle. On an initialised entry it is an address
    /// collision and leaves the entry untouched.
    pub fn upsert(&mut self, udid: u64, address: u8, flags: u8, communication_rate: u8) -> Result<(DeviceHandle, Upsert)> {
        if let Some((handle, existing)) = self.lookup_by_address(address) {
            if existing.udid != udid && existing.is_initialised() {
                return Err(BusError::AddressCollision { address });
            }
            if existing.udid != udid {
                // Uninitialised entry taken over by a new identity: old handles go stale.
                self.remove(address);
                let handle = self.insert(Device::new(udid, address, flags, communication_rate));
                return Ok((handle, Upsert::Inserted));
            }
            let device = self.get_mut(handle).ok_or(BusError::AddressCollision { address })?;
            device.device_flags = flags;
            device.communication_rate = communication_rate;
            device.rolling_counter = device.rolling_counter.wrapping_add(1);
            return Ok((handle, Upsert::Updated));
        }

        let handle = self.insert(Device::new(udid, address, flags, communication_rate));
        Ok((handle, Upsert::Inserted))
    }

    pub fn rename(&mut self, handle: DeviceHandle, name: impl Into<String>) -> bool {
        match self.get_mut(handle) {
            Some(device) => {
                device.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, device: Device) -> DeviceHandle {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.device = Some(device);
                DeviceHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    device: Some(device),
                });
                DeviceHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.order.push(handle);
        handle
    }

    /// Detach the entry at `address`. Callers must unbind services first;
    /// `BusRuntime::remove_device` is the public entry point.
    pub(crate) fn remove(&mut self, address: u8) -> Option<(DeviceHandle, Device)> {
        let (handle, _) = self.lookup_by_address(address)?;
        let slot = self.slots.get_mut(handle.index as usize)?;
        let device = slot.device.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.order.retain(|h| *h != handle);
        Some((handle, device))
    }

    /// Drop broadcast translations pointing at a local slot that went away.
    pub(crate) fn clear_broadcast_slot(&mut self, local_slot: u8) {
        for slot in self.slots.iter_mut() {
            if let Some(device) = slot.device.as_mut() {
                device.broadcast_map.clear_local(local_slot);
            }
        }
    }
}
