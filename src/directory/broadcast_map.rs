/// Number of service slots a device can host, control slot included.
pub const MAX_HOST_SERVICES: usize = 16;

/// Bytes needed to store one 4-bit local slot per remote slot.
pub const BROADCAST_MAP_SIZE: usize = MAX_HOST_SERVICES.div_ceil(2);

/// Translation from a remote device's broadcast slots to local broadcast slots.
///
/// Two slots per byte: the low nibble holds the even slot, the high nibble the
/// odd one. A nibble of zero means unmapped, which is why local slot 0 (the
/// control slot) can never be a translation target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastMap {
    table: [u8; BROADCAST_MAP_SIZE],
}

impl BroadcastMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local slot that `remote_slot` translates to, if any.
    pub fn get(&self, remote_slot: u8) -> Option<u8> {
        let slot = remote_slot as usize;
        if slot >= MAX_HOST_SERVICES {
            return None;
        }
        let byte = self.table[slot / 2];
        let local = if slot % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        (local != 0).then_some(local)
    }

    /// Map `remote_slot` to `local_slot`. Returns false when either slot is out of range.
    pub fn set(&mut self, remote_slot: u8, local_slot: u8) -> bool {
        if remote_slot as usize >= MAX_HOST_SERVICES || local_slot as usize >= MAX_HOST_SERVICES {
            return false;
        }
        self.write(remote_slot as usize, local_slot);
        true
    }

    pub fn clear(&mut self, remote_slot: u8) {
        if (remote_slot as usize) < MAX_HOST_SERVICES {
            self.write(remote_slot as usize, 0);
        }
    }

    /// Drop every translation that lands on `local_slot`.
    pub fn clear_local(&mut self, local_slot: u8) {
        for remote in 0..MAX_HOST_SERVICES as u8 {
            if self.get(remote) == Some(local_slot) {
                self.clear(remote);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; BROADCAST_MAP_SIZE] {
        &self.table
    }

    fn write(&mut self, slot: usize, value: u8) {
        let byte = &mut self.table[slot / 2];
        if slot % 2 == 0 {
            *byte = (*byte & 0xF0) | (value & 0x0F);
        } else {
            *byte = (*byte & 0x0F) | ((value & 0x0F) << 4);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_packing() {
        let mut map = BroadcastMap::new();
        assert!(map.set(2, 5));
        assert!(map.set(3, 9));

        assert_eq!(map.as_bytes()[1], 0x95);
        assert_eq!(map.get(2), Some(5));
        assert_eq!(map.get(3), Some(9));
        assert_eq!(map.get(4), None);
    }

    #[test]
    fn test_out_of_range_slots() {
        let mut map = BroadcastMap::new();
        assert!(!map.set(16, 1));
        assert!(!map.set(1, 16));
        assert_eq!(map.get(200), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_clear_keeps_neighbour() {
        let mut map = BroadcastMap::new();
        map.set(6, 1);
        map.set(7, 2);
        map.clear(6);
        assert_eq!(map.get(6), None);
        assert_eq!(map.get(7), Some(2));
    }

    #[test]
    fn test_clear_local() {
        let mut map = BroadcastMap::new();
        map.set(1, 3);
        map.set(4, 3);
        map.set(5, 2);
        map.clear_local(3);
        assert_eq!(map.get(1), None);
        assert_eq!(map.get(4), None);
        assert_eq!(map.get(5), Some(2));
    }
}
