//! Services supplied by the ledger host: block time, block entropy and
//! outbound value transfer.

use crate::error::Result;
use crate::types::{Address, Wei};
use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current block timestamp (unix seconds).
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, secs: i64) -> i64 {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Block-level entropy mixed into board layouts and draws.
pub trait EntropySource: Send + Sync {
    fn entropy(&self) -> [u8; 32];
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn entropy(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

/// Constant entropy, for reproducible boards and draw sequences.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy([u8; 32]);

impl FixedEntropy {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u64(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self(bytes)
    }
}

impl EntropySource for FixedEntropy {
    fn entropy(&self) -> [u8; 32] {
        self.0
    }
}

/// Outbound value transfer. This is the only external call an operation
/// makes, and it is always the last step.
pub trait FundsTransport: Send + Sync {
    fn send(&self, to: &Address, amount: Wei) -> Result<()>;
}

/// Transport that records what every address has received.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    received: Mutex<BTreeMap<Address, Wei>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self, address: &Address) -> Wei {
        self.received.lock().get(address).copied().unwrap_or(0)
    }

    pub fn total_sent(&self) -> Wei {
        self.received.lock().values().sum()
    }
}

impl FundsTransport for InMemoryTransport {
    fn send(&self, to: &Address, amount: Wei) -> Result<()> {
        *self.received.lock().entry(*to).or_insert(0) += amount;
        tracing::debug!("Sent {} wei to {}", amount, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.advance(10), 1_010);
        assert_eq!(clock.now(), 1_010);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_in_memory_transport_accumulates() {
        let transport = InMemoryTransport::new();
        let alice = Address::from_low_u64_be(1);
        transport.send(&alice, 5).unwrap();
        transport.send(&alice, 7).unwrap();
        assert_eq!(transport.received(&alice), 12);
        assert_eq!(transport.received(&Address::from_low_u64_be(2)), 0);
        assert_eq!(transport.total_sent(), 12);
    }

    #[test]
    fn test_fixed_entropy_is_stable() {
        let entropy = FixedEntropy::from_u64(42);
        assert_eq!(entropy.entropy(), entropy.entropy());
        assert_ne!(OsEntropy.entropy(), OsEntropy.entropy());
    }
}
