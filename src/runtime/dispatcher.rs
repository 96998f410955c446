use super::BusRuntime;
use crate::logging::LogLevel;
use crate::transport::{BusPacket, BusTransport};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Work items for the dispatch context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Packet(BusPacket),
    /// The outer system decided the device at this address is gone.
    RemoveDevice(u8),
    Shutdown,
}

/// Cloneable entry point into a [`Dispatcher`]. Safe to use from any thread,
/// including a transport's receive callback.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: UnboundedSender<Inbound>,
}

impl DispatchHandle {
    /// Queue a received packet. Returns false once the dispatcher is gone.
    pub fn deliver(&self, packet: BusPacket) -> bool {
        self.tx.send(Inbound::Packet(packet)).is_ok()
    }

    pub fn remove_device(&self, address: u8) -> bool {
        self.tx.send(Inbound::RemoveDevice(address)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Inbound::Shutdown);
    }

    /// Route everything `transport` receives into this dispatcher.
    pub fn attach(&self, transport: &dyn BusTransport) {
        let handle = self.clone();
        transport.on_packet_received(Arc::new(move |packet| {
            handle.deliver(packet);
        }));
    }
}

/// Owns a [`BusRuntime`] and applies inbound work to it one item at a time.
///
/// Each item is applied entirely under the runtime lock, so a matching attempt
/// never observes a half-updated device. Application code shares the same
/// lock through [`Dispatcher::runtime`] to send or inspect state.
pub struct Dispatcher {
    runtime: Arc<Mutex<BusRuntime>>,
    inbox: UnboundedReceiver<Inbound>,
    stopped: bool,
}

fn lock(runtime: &Mutex<BusRuntime>) -> MutexGuard<'_, BusRuntime> {
    runtime.lock().unwrap_or_else(|e| e.into_inner())
}

impl Dispatcher {
    pub fn new(runtime: BusRuntime) -> (Self, DispatchHandle) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            runtime: Arc::new(Mutex::new(runtime)),
            inbox,
            stopped: false,
        };
        (dispatcher, DispatchHandle { tx })
    }

    pub fn runtime(&self) -> Arc<Mutex<BusRuntime>> {
        self.runtime.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Apply everything already queued without waiting. Returns the number of
    /// items applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while !self.stopped {
            match self.inbox.try_recv() {
                Ok(item) => {
                    self.apply(item);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Process work until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        self.log(LogLevel::Info, "Event loop started");
        while !self.stopped {
            match self.inbox.recv().await {
                Some(item) => self.apply(item),
                None => break,
            }
        }
        self.log(LogLevel::Info, "Event loop stopped");
    }

    /// Like [`run`](Self::run), additionally announcing the local device every `period`.
    pub async fn run_announcing(mut self, period: Duration) {
        self.log(LogLevel::Info, &format!("Event loop started, announcing every {:?}", period));
        let mut ticker = tokio::time::interval(period);
        while !self.stopped {
            tokio::select! {
                _ = ticker.tick() => {
                    let announced = lock(&self.runtime).queue_control_packet();
                    if let Err(e) = announced {
                        self.log(LogLevel::Warn, &format!("Announcement failed: {}", e));
                    }
                }
                item = self.inbox.recv() => match item {
                    Some(item) => self.apply(item),
                    None => break,
                },
            }
        }
        self.log(LogLevel::Info, "Event loop stopped");
    }

    fn apply(&mut self, item: Inbound) {
        match item {
            Inbound::Packet(packet) => {
                let mut runtime = lock(&self.runtime);
                if let Err(e) = runtime.handle_packet(&packet) {
                    runtime.logger().log(
                        LogLevel::Warn,
                        "Dispatch",
                        &format!("Packet from {} dropped: {}", packet.target(), e),
                    );
                }
            }
            Inbound::RemoveDevice(address) => {
                lock(&self.runtime).remove_device(address);
            }
            Inbound::Shutdown => self.stopped = true,
        }
    }

    fn log(&self, level: LogLevel, msg: &str) {
        lock(&self.runtime).logger().log(level, "Dispatch", msg);
    }
}
