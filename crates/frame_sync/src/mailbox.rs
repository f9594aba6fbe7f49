//! Single-slot, latest-wins landmark mailbox.
//!
//! The poller writes with a non-blocking lock attempt and drops the packet
//! when the reader currently holds the slot. The reader takes the packet out
//! under a blocking lock. Packets are never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use contracts::LandmarkPacket;
use tracing::{trace, warn};

/// Shared slot contents
#[derive(Debug, Default)]
struct Slot {
    packet: Option<LandmarkPacket>,
    timestamp: u64,
    occupied: bool,
}

/// Result of a poller write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Slot was empty
    Stored,
    /// An unconsumed packet was replaced
    Overwrote,
    /// Reader held the slot; packet discarded
    Dropped,
    /// Packet had no points
    Ignored,
}

/// Latest-wins landmark mailbox
#[derive(Debug, Clone, Default)]
pub struct LandmarkMailbox {
    slot: Arc<Mutex<Slot>>,
    contention_drops: Arc<AtomicU64>,
    published: Arc<AtomicU64>,
}

impl LandmarkMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer side: store `packet` unless the reader holds the slot
    pub fn try_publish(&self, packet: LandmarkPacket) -> PublishOutcome {
        if packet.is_empty() {
            return PublishOutcome::Ignored;
        }

        let mut slot = match self.slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.contention_drops.fetch_add(1, Ordering::Relaxed);
                observability::record_slot_contention_drop();
                warn!(
                    timestamp = packet.timestamp,
                    "Landmark slot busy, packet dropped"
                );
                return PublishOutcome::Dropped;
            }
        };

        let outcome = if slot.occupied {
            PublishOutcome::Overwrote
        } else {
            PublishOutcome::Stored
        };
        slot.timestamp = packet.timestamp;
        slot.packet = Some(packet);
        slot.occupied = true;
        self.published.fetch_add(1, Ordering::Relaxed);

        trace!(timestamp = slot.timestamp, ?outcome, "Landmark packet published");
        outcome
    }

    /// Reader side: take the packet if it is at least as new as `min_timestamp`
    ///
    /// Older packets stay in the slot until overwritten.
    pub fn take_fresh(&self, min_timestamp: u64) -> Option<LandmarkPacket> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if !slot.occupied || slot.timestamp < min_timestamp {
            return None;
        }
        slot.occupied = false;
        slot.packet.take()
    }

    /// Timestamp of the packet currently held, if any
    pub fn peek_timestamp(&self) -> Option<u64> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.occupied.then_some(slot.timestamp)
    }

    /// Packets discarded because the reader held the slot
    pub fn contention_drops(&self) -> u64 {
        self.contention_drops.load(Ordering::Relaxed)
    }

    /// Packets successfully written
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn packet(ts: u64) -> LandmarkPacket {
        LandmarkPacket::new(ts, vec![Point2::new(0.5, 0.5); 10])
    }

    #[test]
    fn test_latest_wins() {
        let mailbox = LandmarkMailbox::new();
        assert_eq!(mailbox.try_publish(packet(1)), PublishOutcome::Stored);
        assert_eq!(mailbox.try_publish(packet(2)), PublishOutcome::Overwrote);

        let taken = mailbox.take_fresh(2).unwrap();
        assert_eq!(taken.timestamp, 2);
        assert!(mailbox.take_fresh(0).is_none());
    }

    #[test]
    fn test_stale_packet_not_taken() {
        let mailbox = LandmarkMailbox::new();
        mailbox.try_publish(packet(4));
        assert!(mailbox.take_fresh(5).is_none());
        assert_eq!(mailbox.peek_timestamp(), Some(4));
    }

    #[test]
    fn test_drop_on_contention() {
        let mailbox = LandmarkMailbox::new();
        let guard = mailbox.slot.lock().unwrap();

        assert_eq!(mailbox.try_publish(packet(3)), PublishOutcome::Dropped);
        assert_eq!(mailbox.contention_drops(), 1);
        drop(guard);

        assert!(mailbox.take_fresh(0).is_none());
        assert_eq!(mailbox.published(), 0);
    }

    #[test]
    fn test_empty_packet_ignored() {
        let mailbox = LandmarkMailbox::new();
        let empty = LandmarkPacket::new(1, Vec::new());
        assert_eq!(mailbox.try_publish(empty), PublishOutcome::Ignored);
        assert_eq!(mailbox.peek_timestamp(), None);
    }
}
