//! Row locks for the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::{CartId, CustomerId, ProductId};

/// Identifies a lockable row, by primary or natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    Product(ProductId),
    Cart(CustomerId, String),
    CartItem(CartId, ProductId),
}

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Table of per-row async mutexes.
///
/// Slots are created on first use and pruned once nobody holds or awaits them.
#[derive(Default)]
pub(crate) struct LockTable {
    slots: Mutex<HashMap<RowKey, Slot>>,
}

impl LockTable {
    /// Waits for exclusive ownership of `key`.
    pub(crate) async fn acquire(&self, key: RowKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Drops slots for `keys` that no guard or waiter still references.
    pub(crate) fn prune<'a>(&self, keys: impl IntoIterator<Item = &'a RowKey>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let table = Arc::new(LockTable::default());
        let key = RowKey::Product(ProductId::new(1));

        let guard = table.acquire(key.clone()).await;

        let waiter = {
            let table = Arc::clone(&table);
            let key = key.clone();
            tokio::spawn(async move { table.acquire(key).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        let second = waiter.await.unwrap();
        drop(second);
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_block() {
        let table = LockTable::default();
        let _a = table.acquire(RowKey::Product(ProductId::new(1))).await;
        let _b = table.acquire(RowKey::Product(ProductId::new(2))).await;
        let _c = table
            .acquire(RowKey::Cart(CustomerId::new(1), "default".to_string()))
            .await;
    }

    #[tokio::test]
    async fn prune_removes_released_slots_only() {
        let table = LockTable::default();
        let held = RowKey::Product(ProductId::new(1));
        let released = RowKey::Product(ProductId::new(2));

        let _guard = table.acquire(held.clone()).await;
        drop(table.acquire(released.clone()).await);

        table.prune([&held, &released]);
        assert_eq!(table.len(), 1);
    }
}
