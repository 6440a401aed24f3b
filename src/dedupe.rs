use crate::model::{Item, Store};

/// Collapses repeated Items and Stores to one record per natural key.
///
/// Last-seen-wins: a later `observe` for the same key replaces the earlier record.
/// Memory grows with the number of distinct entities, not with the number of rows.
#[derive(Debug, Default)]
pub struct EntityDeduplicator {
    items: ahash::AHashMap<i64, Item>,
    stores: ahash::AHashMap<i64, Store>,
    observed: u64,
}

impl EntityDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, item: Item, store: Store) {
        self.observe_item(item);
        self.observe_store(store);
        self.observed += 1;
    }

    pub fn observe_item(&mut self, item: Item) {
        self.items.insert(item.number, item);
    }

    pub fn observe_store(&mut self, store: Store) {
        self.stores.insert(store.number, store);
    }

    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn store_count(&self) -> usize { self.stores.len() }

    /// Number of rows folded in via `observe`.
    pub fn rows_observed(&self) -> u64 { self.observed }

    /// Final unique entities, each sorted by natural key.
    pub fn into_parts(self) -> (Vec<Item>, Vec<Store>) {
        let mut items: Vec<Item> = self.items.into_values().collect();
        items.sort_unstable_by_key(|i| i.number);
        let mut stores: Vec<Store> = self.stores.into_values().collect();
        stores.sort_unstable_by_key(|s| s.number);
        (items, stores)
    }
}
