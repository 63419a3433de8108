use std::rc::{Rc, Weak};

use super::store::{Store, StoreInner};
use crate::error::StoreError;
use crate::merge::Merge;

/// `get`/`set` bound to a store by reference.
///
/// Accessors are handed to the store initializer before the initial state
/// exists, so action closures stored inside the state can capture them. They
/// hold a weak reference: state that embeds its own accessors does not keep
/// the store alive.
pub struct Accessors<T> {
    store: Weak<StoreInner<T>>,
}

impl<T: 'static> Accessors<T> {
    pub(crate) fn new(store: Weak<StoreInner<T>>) -> Self {
        Self { store }
    }

    /// The current state.
    ///
    /// # Panics
    ///
    /// Panics if called from inside the initializer, or after the store has
    /// been dropped. Use [`try_get`](Self::try_get) to handle those cases.
    pub fn get(&self) -> Rc<T> {
        match self.try_get() {
            Ok(state) => state,
            Err(err) => panic!("Accessors::get: {err}"),
        }
    }

    pub fn try_get(&self) -> Result<Rc<T>, StoreError> {
        self.upgrade()?.current().ok_or(StoreError::Uninitialized)
    }

    /// The store these accessors are bound to.
    ///
    /// `None` once the store has been dropped, and also while the initializer
    /// is still running, since the store has no state yet.
    pub fn store(&self) -> Option<Store<T>> {
        self.store
            .upgrade()
            .filter(|inner| inner.current().is_some())
            .map(Store::from_inner)
    }

    fn upgrade(&self) -> Result<Rc<StoreInner<T>>, StoreError> {
        self.store.upgrade().ok_or(StoreError::Dropped)
    }
}

impl<T: Merge + 'static> Accessors<T> {
    /// Merge `partial` into the state and run a notify pass.
    ///
    /// An update that cannot be applied is logged and dropped.
    pub fn set(&self, partial: T::Partial) {
        if let Err(err) = self.try_set(partial) {
            log::warn!("dropping state update: {err}");
        }
    }

    pub fn try_set(&self, partial: T::Partial) -> Result<(), StoreError> {
        self.upgrade()?.merge(partial)
    }

    /// Compute a partial from the current state and merge it.
    pub fn update(&self, f: impl FnOnce(&T) -> T::Partial) {
        match self.try_get() {
            Ok(state) => self.set(f(&state)),
            Err(err) => log::warn!("dropping state update: {err}"),
        }
    }
}

impl<T> Clone for Accessors<T> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
        }
    }
}

impl<T> std::fmt::Debug for Accessors<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessors")
            .field("alive", &(self.store.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn get_inside_initializer_is_uninitialized() {
        let store = Store::new(|accessors: Accessors<HashMap<&'static str, i32>>| {
            assert_eq!(accessors.try_get().unwrap_err(), StoreError::Uninitialized);
            assert_eq!(
                accessors.try_set(HashMap::from([("count", 1)])),
                Err(StoreError::Uninitialized)
            );
            HashMap::from([("count", 0)])
        });
        assert_eq!(store.get()["count"], 0);
    }

    #[test]
    fn store_handle_is_withheld_inside_initializer() {
        let seen_inside = Rc::new(std::cell::Cell::new(true));
        let store = {
            let seen_inside = seen_inside.clone();
            Store::new(move |accessors: Accessors<HashMap<&'static str, i32>>| {
                seen_inside.set(accessors.store().is_some());
                // logged and dropped, no panic
                accessors.set(HashMap::from([("count", 5)]));
                HashMap::from([("count", 0)])
            })
        };

        assert!(!seen_inside.get());
        assert_eq!(store.get()["count"], 0);
        assert!(store.accessors().store().is_some());
    }

    #[test]
    fn accessors_do_not_keep_store_alive() {
        let store = Store::from_state(HashMap::from([("count", 0)]));
        let accessors = store.accessors();
        assert!(accessors.store().is_some());

        drop(store);

        assert_eq!(accessors.try_get().unwrap_err(), StoreError::Dropped);
        assert_eq!(
            accessors.try_set(HashMap::from([("count", 1)])),
            Err(StoreError::Dropped)
        );
        // logged, not raised
        accessors.set(HashMap::new());
    }

    #[test]
    fn update_reads_latest_state() {
        let store = Store::from_state(HashMap::from([("count", 1)]));
        let accessors = store.accessors();

        accessors.update(|state| HashMap::from([("count", state["count"] + 1)]));
        accessors.update(|state| HashMap::from([("count", state["count"] * 10)]));

        assert_eq!(store.get()["count"], 20);
    }
}
