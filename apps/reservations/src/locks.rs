//! # Slot Locks
//!
//! One async mutex per (date, time). Writers to the same slot queue up;
//! writers to different slots never contend. Readers take no lock.
//!
//! ```text
//! create 2026-09-15 14:00 ──► lock(14:00) ──► insert_checked ──► unlock
//! create 2026-09-15 14:00 ──► lock(14:00) ... waits ...
//! create 2026-09-15 21:00 ──► lock(21:00) ──► runs in parallel
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use mesa_core::SlotKey;

/// Entries above this count trigger a sweep of idle locks.
const SWEEP_THRESHOLD: usize = 256;

/// Per-slot write locks. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SlotLocks {
    inner: Arc<Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `slot`. Released on drop.
    pub async fn acquire(&self, slot: SlotKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() > SWEEP_THRESHOLD {
                // Only the map holds an idle lock
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            map.entry(slot).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of slots with a lock entry.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::time::Duration;

    fn slot(hour: u32) -> SlotKey {
        SlotKey::new(
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_same_slot_is_exclusive() {
        let locks = SlotLocks::new();
        let guard = locks.acquire(slot(14)).await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.acquire(slot(14)).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_slots_do_not_contend() {
        let locks = SlotLocks::new();
        let _lunch = locks.acquire(slot(14)).await;

        let dinner = tokio::time::timeout(Duration::from_secs(1), locks.acquire(slot(21))).await;
        assert!(dinner.is_ok());
        assert_eq!(locks.len().await, 2);
    }
}
