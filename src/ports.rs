//! Bounded pool of local ports handed to recording sinks.

use crate::error::{RecordError, RecordResult};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

struct PoolState {
    /// Next port to try (next-fit scan with wraparound)
    cursor: u16,
    in_use: HashSet<u16>,
}

/// Process-wide port allocator over the inclusive range `[min, max]`
pub struct PortAllocator {
    min: u16,
    max: u16,
    state: Mutex<PoolState>,
}

impl PortAllocator {
    pub fn new(min: u16, max: u16) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            state: Mutex::new(PoolState {
                cursor: min,
                in_use: HashSet::new(),
            }),
        }
    }

    pub fn range(&self) -> (u16, u16) {
        (self.min, self.max)
    }

    fn capacity(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take an unused port and mark it in use
    pub fn acquire(&self) -> RecordResult<u16> {
        let mut state = self.lock();

        if state.in_use.len() >= self.capacity() {
            return Err(RecordError::PoolExhausted {
                min: self.min,
                max: self.max,
            });
        }

        let mut port = state.cursor;
        loop {
            if !state.in_use.contains(&port) {
                break;
            }
            port = if port == self.max { self.min } else { port + 1 };
        }

        state.in_use.insert(port);
        state.cursor = if port == self.max { self.min } else { port + 1 };

        debug!("Acquired port {} ({} in use)", port, state.in_use.len());

        Ok(port)
    }

    /// Return a port to the pool. Unknown or out-of-range ports are ignored.
    pub fn release(&self, port: u16) {
        let mut state = self.lock();
        if state.in_use.remove(&port) {
            debug!("Released port {} ({} in use)", port, state.in_use.len());
        }
    }

    pub fn release_all(&self, ports: &[u16]) {
        let mut state = self.lock();
        for port in ports {
            state.in_use.remove(port);
        }
        debug!("Released {} ports ({} in use)", ports.len(), state.in_use.len());
    }

    pub fn is_in_use(&self, port: u16) -> bool {
        self.lock().in_use.contains(&port)
    }

    pub fn in_use_count(&self) -> usize {
        self.lock().in_use.len()
    }
}
