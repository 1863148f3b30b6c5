use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

type Slots<K> = Arc<Mutex<HashMap<K, Slot>>>;

/// Lock table with one async mutex per key.
///
/// Slots are created on first use and removed again once nobody holds or
/// waits on them, so the table only grows with the number of keys that are
/// contended right now.
pub struct KeyedLocks<K> {
    slots: Slots<K>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and holds it until the guard is dropped.
    ///
    /// Dropping the returned future before it resolves gives the slot back
    /// as well.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let (ticket, mutex) = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let ticket = Ticket {
                key,
                slots: self.slots.clone(),
            };
            (ticket, slot.mutex.clone())
        };

        let guard = mutex.lock_owned().await;

        KeyedGuard {
            _guard: guard,
            _ticket: ticket,
        }
    }

    /// Number of keys currently held or waited on.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds the key. Fields drop in order: the mutex is released before the
/// slot is given back.
pub struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    _guard: OwnedMutexGuard<()>,
    _ticket: Ticket<K>,
}

/// One registered user of a slot, waiting or holding.
struct Ticket<K>
where
    K: Eq + Hash,
{
    key: K,
    slots: Slots<K>,
}

impl<K> Drop for Ticket<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = match slots.get_mut(&self.key) {
            Some(slot) => {
                slot.users -= 1;
                slot.users == 0
            }
            None => false,
        };
        if idle {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[actix_web::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let worker = |locks: Arc<KeyedLocks<u64>>,
                      inside: Arc<AtomicUsize>,
                      max_seen: Arc<AtomicUsize>| async move {
            let _guard = locks.lock(42).await;
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            actix_web::rt::time::sleep(Duration::from_millis(5)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
        };

        futures::join!(
            worker(locks.clone(), inside.clone(), max_seen.clone()),
            worker(locks.clone(), inside.clone(), max_seen.clone()),
            worker(locks.clone(), inside.clone(), max_seen.clone()),
        );

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[actix_web::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let b = actix_web::rt::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[actix_web::test]
    async fn released_slot_is_evicted() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.lock(1u64).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[actix_web::test]
    async fn slot_survives_while_someone_waits() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock(9u64).await;

        let waiter = {
            let locks = locks.clone();
            actix_web::rt::spawn(async move {
                let _guard = locks.lock(9u64).await;
            })
        };
        // let the waiter register on the slot
        actix_web::rt::time::sleep(Duration::from_millis(10)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[actix_web::test]
    async fn abandoned_waiter_gives_its_slot_back() {
        let locks = KeyedLocks::new();
        let first = locks.lock(9u64).await;

        let mut waiter = Box::pin(locks.lock(9u64));
        assert!(futures::poll!(waiter.as_mut()).is_pending());

        // holder leaves while the waiter is still queued, then the waiter is cancelled
        drop(first);
        assert_eq!(locks.len(), 1);
        drop(waiter);
        assert_eq!(locks.len(), 0);

        // the key is usable again afterwards
        let _again = locks.lock(9u64).await;
        assert_eq!(locks.len(), 1);
    }
}
