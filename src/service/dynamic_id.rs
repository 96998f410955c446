use crate::error::{BusError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// First identifier handed out to services without a fixed id.
pub const DYNAMIC_ID_START: u32 = 3000;
/// One past the last dynamic identifier.
pub const DYNAMIC_ID_END: u32 = 4000;

/// Hands out unique, strictly increasing service identifiers from
/// `[DYNAMIC_ID_START, DYNAMIC_ID_END)`. Identifiers are never recycled.
pub struct DynamicIdAllocator {
    // Next identifier to return.
    next: AtomicU32,
}

impl DynamicIdAllocator {
    pub fn new() -> Self {
        DynamicIdAllocator {
            next: AtomicU32::new(DYNAMIC_ID_START),
        }
    }

    /// The process-wide allocator shared by runtimes that are not given their own.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<DynamicIdAllocator>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(DynamicIdAllocator::new())).clone()
    }

    /// Allocate the next identifier.
    ///
    /// Once the range is used up every call fails with
    /// [`BusError::IdSpaceExhausted`]; this is a sizing problem, not a transient one.
    pub fn allocate(&self) -> Result<u32> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| (v < DYNAMIC_ID_END).then_some(v + 1))
            .map_err(|_| BusError::IdSpaceExhausted)
    }

    pub fn remaining(&self) -> u32 {
        DYNAMIC_ID_END.saturating_sub(self.next.load(Ordering::SeqCst))
    }
}

impl Default for DynamicIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
