use contour_store::{same_store, StoreHandle};

/// Ordered, immutable list of candidate stores plus the designated fallback.
///
/// The fallback is always a member of the list; if it was not given
/// explicitly it is appended last.
#[derive(Clone, Debug)]
pub struct StoreRegistry {
    stores: Vec<StoreHandle>,
    fallback: StoreHandle,
}

impl StoreRegistry {
    pub fn new(stores: Vec<StoreHandle>, fallback: StoreHandle) -> Self {
        let mut unique: Vec<StoreHandle> = Vec::with_capacity(stores.len() + 1);
        for store in stores {
            if !unique.iter().any(|known| same_store(known, &store)) {
                unique.push(store);
            }
        }
        if !unique.iter().any(|known| same_store(known, &fallback)) {
            unique.push(fallback.clone());
        }
        Self {
            stores: unique,
            fallback,
        }
    }

    /// Every store, in declared order.
    pub fn all_stores(&self) -> &[StoreHandle] {
        &self.stores
    }

    pub fn fallback(&self) -> &StoreHandle {
        &self.fallback
    }

    pub fn writable_stores(&self) -> impl Iterator<Item = &StoreHandle> {
        self.stores.iter().filter(|store| store.is_write_supported())
    }

    pub fn contains(&self, store: &StoreHandle) -> bool {
        self.stores.iter().any(|known| same_store(known, store))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
