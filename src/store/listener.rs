use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::store::StoreInner;
use crate::runtime::Slot;

slotmap::new_key_type! {
    /// Identifies a listener in its store's registry.
    ///
    /// Keys are never reused, so a key that outlives its listener stays
    /// harmless: unsubscribing it again is a no-op.
    pub struct ListenerKey;
}

pub(crate) type Selector<T, V> = Rc<dyn Fn(&T) -> V>;
pub(crate) type Equals<V> = Rc<dyn Fn(&V, &V) -> bool>;
type Handler<V> = Rc<dyn Fn(&V)>;

pub(crate) fn default_equals<V: PartialEq + 'static>() -> Equals<V> {
    Rc::new(|a: &V, b: &V| a == b)
}

/// Type-erased view of a listener, as held by the registry.
pub(crate) trait Observe<T> {
    /// Re-derive the slice from `state`. Returns whether the listener fired.
    fn observe(&self, state: &T) -> bool;
}

pub(crate) struct Slice<T, V> {
    selector: Selector<T, V>,
    equals: Equals<V>,
    current: V,
    handler: Handler<V>,
}

impl<T, V: Clone> Observe<T> for RefCell<Slice<T, V>> {
    fn observe(&self, state: &T) -> bool {
        // No borrow is held while user code runs; selectors and handlers may
        // touch the store again.
        let (selector, equals) = {
            let slice = self.borrow();
            (Rc::clone(&slice.selector), Rc::clone(&slice.equals))
        };
        let next = selector(state);
        let current = self.borrow().current.clone();
        if equals(&current, &next) {
            return false;
        }

        let handler = {
            let mut slice = self.borrow_mut();
            slice.current = next.clone();
            Rc::clone(&slice.handler)
        };
        handler(&next);
        true
    }
}

/// A live listener on a [`Store`](super::Store).
///
/// The handle shares the listener with the store's registry: swapping the
/// selector or equality here affects the next notify pass without
/// re-registering and without resetting the cached slice.
///
/// Dropping a `Subscription` does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) or [`Store::unsubscribe`](super::Store::unsubscribe).
pub struct Subscription<T, V> {
    key: ListenerKey,
    slice: Rc<RefCell<Slice<T, V>>>,
    store: Weak<StoreInner<T>>,
}

impl<T: 'static, V: Clone + 'static> Subscription<T, V> {
    pub(crate) fn register(
        store: &Rc<StoreInner<T>>,
        selector: Selector<T, V>,
        equals: Equals<V>,
        handler: Handler<V>,
    ) -> Self {
        let current = store.read_with(|state| selector(state));
        let slice = Rc::new(RefCell::new(Slice {
            selector,
            equals,
            current,
            handler,
        }));
        let key = store.insert_listener(slice.clone());
        Self {
            key,
            slice,
            store: Rc::downgrade(store),
        }
    }

    pub fn key(&self) -> ListenerKey {
        self.key
    }

    /// The cached slice, as computed at subscribe time or by the last notify
    /// pass that changed it.
    pub fn current(&self) -> V {
        self.slice.borrow().current.clone()
    }

    pub fn with_current<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.slice.borrow().current)
    }

    pub fn set_selector(&self, selector: impl Fn(&T) -> V + 'static) {
        self.slice.borrow_mut().selector = Rc::new(selector);
    }

    pub fn set_equals(&self, equals: impl Fn(&V, &V) -> bool + 'static) {
        self.slice.borrow_mut().equals = Rc::new(equals);
    }

    /// Swap both closures at once.
    pub fn update(
        &self,
        selector: impl Fn(&T) -> V + 'static,
        equals: impl Fn(&V, &V) -> bool + 'static,
    ) {
        self.replace_closures(Rc::new(selector), Rc::new(equals));
    }

    pub(crate) fn replace_closures(&self, selector: Selector<T, V>, equals: Equals<V>) {
        let mut slice = self.slice.borrow_mut();
        slice.selector = selector;
        slice.equals = equals;
    }

    /// Remove the listener from its store. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            store.remove_listener(self.key);
        }
    }

    pub(crate) fn is_bound_to(&self, store: &Rc<StoreInner<T>>) -> bool {
        std::ptr::eq(self.store.as_ptr(), Rc::as_ptr(store))
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.contains_listener(self.key))
    }
}

impl<T: 'static, V: Clone + PartialEq + 'static> Subscription<T, V> {
    /// Go back to comparing slices with `PartialEq`.
    pub fn reset_equals(&self) {
        self.slice.borrow_mut().equals = default_equals();
    }
}

impl<T, V> Clone for Subscription<T, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            slice: Rc::clone(&self.slice),
            store: Weak::clone(&self.store),
        }
    }
}

impl<T, V> std::fmt::Debug for Subscription<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}

impl<T: 'static, V: Clone + 'static> Slot for Subscription<T, V> {
    fn release(&mut self) {
        self.unsubscribe();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
