use super::packet::{BusPacket, Target};
use super::traits::{BusTransport, PacketCallback, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct Endpoint {
    callback: Option<PacketCallback>,
    communication_rate: u8,
}

/// In-memory multi-drop bus. Every frame transmitted by one endpoint is
/// delivered to the receive callback of every other attached endpoint.
#[derive(Clone, Default)]
pub struct MemoryBus {
    endpoints: Arc<Mutex<Vec<Endpoint>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint communicating at `communication_rate`.
    pub fn attach(&self, communication_rate: u8) -> Arc<MemoryTransport> {
        self.attach_endpoint(communication_rate, None)
    }

    fn attach_endpoint(&self, communication_rate: u8, max_frame: Option<usize>) -> Arc<MemoryTransport> {
        let mut endpoints = lock(&self.endpoints);
        endpoints.push(Endpoint {
            callback: None,
            communication_rate,
        });
        Arc::new(MemoryTransport {
            bus: self.clone(),
            index: endpoints.len() - 1,
            max_frame,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn set_callback(&self, index: usize, callback: PacketCallback) {
        if let Some(endpoint) = lock(&self.endpoints).get_mut(index) {
            endpoint.callback = Some(callback);
        }
    }

    fn broadcast(&self, from: usize, data: &[u8], target: Target) {
        // Callbacks run outside the lock so a receiver may transmit in turn.
        let (rate, receivers): (u8, Vec<PacketCallback>) = {
            let endpoints = lock(&self.endpoints);
            let rate = endpoints.get(from).map(|e| e.communication_rate).unwrap_or_default();
            let receivers = endpoints
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != from)
                .filter_map(|(_, e)| e.callback.clone())
                .collect();
            (rate, receivers)
        };
        for callback in receivers {
            callback(BusPacket::new(target, rate, data));
        }
    }
}

/// One device's view of a [`MemoryBus`]. Keeps a log of transmitted frames.
pub struct MemoryTransport {
    bus: MemoryBus,
    index: usize,
    max_frame: Option<usize>,
    sent: Mutex<Vec<(Target, Vec<u8>)>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// A detached endpoint: frames are only logged, nothing is delivered.
    pub fn standalone() -> Arc<Self> {
        MemoryBus::new().attach(1)
    }

    pub fn with_max_frame(bus: &MemoryBus, communication_rate: u8, max_frame: usize) -> Arc<Self> {
        bus.attach_endpoint(communication_rate, Some(max_frame))
    }

    /// Deliver `packet` to this endpoint as if it had arrived from the bus.
    pub fn inject(&self, packet: BusPacket) {
        let callback = lock(&self.bus.endpoints).get(self.index).and_then(|e| e.callback.clone());
        if let Some(callback) = callback {
            callback(packet);
        }
    }

    /// Frames transmitted so far, oldest first. Clears the log.
    pub fn take_sent(&self) -> Vec<(Target, Vec<u8>)> {
        std::mem::take(&mut *lock(&self.sent))
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl BusTransport for MemoryTransport {
    fn transmit(&self, data: &[u8], target: Target) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if let Some(max) = self.max_frame {
            if data.len() > max {
                return Err(TransportError::FrameTooLarge { len: data.len(), max });
            }
        }
        lock(&self.sent).push((target, data.to_vec()));
        self.bus.broadcast(self.index, data, target);
        Ok(())
    }

    fn on_packet_received(&self, callback: PacketCallback) {
        self.bus.set_callback(self.index, callback);
    }
}
