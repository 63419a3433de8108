use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::SlotMap;

use super::accessors::Accessors;
use super::listener::{default_equals, ListenerKey, Observe, Subscription};
use super::options::StoreOptions;
use crate::error::StoreError;
use crate::merge::Merge;

type Registry<T> = SlotMap<ListenerKey, Rc<dyn Observe<T>>>;

pub(crate) struct StoreInner<T> {
    state: RefCell<Option<Rc<T>>>,
    listeners: RefCell<Registry<T>>,
    options: StoreOptions,
    depth: Cell<usize>,
    pending: Cell<bool>,
}

impl<T: 'static> StoreInner<T> {
    fn new(options: StoreOptions) -> Self {
        Self {
            state: RefCell::new(None),
            listeners: RefCell::new(SlotMap::with_key()),
            options,
            depth: Cell::new(0),
            pending: Cell::new(false),
        }
    }

    pub(crate) fn current(&self) -> Option<Rc<T>> {
        self.state.borrow().clone()
    }

    fn state(&self) -> Rc<T> {
        self.current()
            .expect("store state is populated before the store is handed out")
    }

    pub(crate) fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state())
    }

    pub(crate) fn merge(&self, partial: T::Partial) -> Result<(), StoreError>
    where
        T: Merge,
    {
        let base = self.current().ok_or(StoreError::Uninitialized)?;
        self.commit(base.merge(partial));
        Ok(())
    }

    fn commit(&self, next: T) {
        *self.state.borrow_mut() = Some(Rc::new(next));
        self.notify();
    }

    pub(crate) fn insert_listener(&self, listener: Rc<dyn Observe<T>>) -> ListenerKey {
        let key = self.listeners.borrow_mut().insert(listener);
        log::debug!("{}: subscribed listener {:?}", self.options.label(), key);
        key
    }

    pub(crate) fn remove_listener(&self, key: ListenerKey) -> bool {
        let removed = self.listeners.borrow_mut().remove(key).is_some();
        if removed {
            log::debug!("{}: unsubscribed listener {:?}", self.options.label(), key);
        }
        removed
    }

    pub(crate) fn contains_listener(&self, key: ListenerKey) -> bool {
        self.listeners.borrow().contains_key(key)
    }

    /// Run one notify pass over every registered listener.
    fn notify(&self) {
        if let Some(max) = self.options.notify_depth() {
            if self.depth.get() >= max.get() {
                log::trace!(
                    "{}: notify depth {} reached, deferring pass",
                    self.options.label(),
                    max
                );
                self.pending.set(true);
                return;
            }
        }

        let _depth = DepthGuard::enter(&self.depth);
        loop {
            self.pending.set(false);
            self.notify_pass();
            if !self.pending.get() {
                break;
            }
        }
    }

    fn notify_pass(&self) {
        // Listeners removed mid-pass are skipped; ones added mid-pass were
        // initialized from the state that triggered their registration.
        let keys: Vec<ListenerKey> = self.listeners.borrow().keys().collect();
        log::trace!(
            "{}: notify pass over {} listeners (depth {})",
            self.options.label(),
            keys.len(),
            self.depth.get()
        );

        for key in keys {
            let Some(listener) = self.listeners.borrow().get(key).cloned() else {
                continue;
            };
            // Re-read per listener: an earlier callback may have set again.
            let state = self.state();
            if listener.observe(&state) {
                log::trace!("{}: notified listener {:?}", self.options.label(), key);
            }
        }
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// A single-threaded state container with selective change notification.
///
/// A store holds one state value and a set of listeners. Each listener
/// derives a slice of the state with a selector and is only notified when its
/// slice changes according to its equality function. Cloning a store clones
/// the handle; all clones share the same state and listeners.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use specks::{create_store, store_state, Accessors};
///
/// store_state! {
///     #[derive(Clone)]
///     struct Counter => CounterPatch {
///         count: i64,
///         add: Rc<dyn Fn(i64)>,
///     }
/// }
///
/// let store = create_store(|acc: Accessors<Counter>| {
///     let set = acc.clone();
///     Counter {
///         count: 1,
///         add: Rc::new(move |n: i64| {
///             let count = set.get().count;
///             set.set(CounterPatch::new().count(count + n));
///         }),
///     }
/// });
///
/// (store.get().add)(1);
/// (store.get().add)(10);
/// assert_eq!(store.get().count, 12);
/// ```
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T: 'static> Store<T> {
    /// Create a store from an initializer.
    ///
    /// The initializer runs exactly once. It receives [`Accessors`] bound to
    /// the store under construction and returns the initial state.
    pub fn new<F>(initializer: F) -> Self
    where
        F: FnOnce(Accessors<T>) -> T,
    {
        Self::with_options(StoreOptions::default(), initializer)
    }

    pub fn with_options<F>(options: StoreOptions, initializer: F) -> Self
    where
        F: FnOnce(Accessors<T>) -> T,
    {
        let inner = Rc::new(StoreInner::new(options));
        let initial = initializer(Accessors::new(Rc::downgrade(&inner)));
        *inner.state.borrow_mut() = Some(Rc::new(initial));
        log::debug!("{}: created", inner.options.label());
        Self { inner }
    }

    /// Create a store from a ready-made initial state.
    pub fn from_state(initial: T) -> Self {
        Self::new(move |_| initial)
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner<T>>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<StoreInner<T>> {
        &self.inner
    }

    /// The current state.
    pub fn get(&self) -> Rc<T> {
        self.inner.state()
    }

    /// Read the state without cloning the handle.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.read_with(f)
    }

    /// Replace the whole state and run a notify pass.
    pub fn replace(&self, state: T) {
        self.inner.commit(state);
    }

    /// Accessors bound to this store, as handed to the initializer.
    pub fn accessors(&self) -> Accessors<T> {
        Accessors::new(Rc::downgrade(&self.inner))
    }

    /// Subscribe to a slice of the state, compared with `PartialEq`.
    ///
    /// The selector runs once immediately to seed the cached slice.
    /// `on_change` receives the new slice whenever a notify pass finds it
    /// different from the cached one.
    ///
    /// `PartialEq` is not reflexive for every type: a float slice holding NaN
    /// never equals itself and fires on every pass. Use
    /// [`subscribe_with`](Self::subscribe_with) with e.g. `f64::total_cmp` or
    /// a bitwise comparison for such slices.
    pub fn subscribe<V, S, H>(&self, selector: S, on_change: H) -> Subscription<T, V>
    where
        V: Clone + PartialEq + 'static,
        S: Fn(&T) -> V + 'static,
        H: Fn(&V) + 'static,
    {
        Subscription::register(
            &self.inner,
            Rc::new(selector),
            default_equals(),
            Rc::new(on_change),
        )
    }

    /// Subscribe to a slice of the state with a custom equality function.
    pub fn subscribe_with<V, S, E, H>(
        &self,
        selector: S,
        equals: E,
        on_change: H,
    ) -> Subscription<T, V>
    where
        V: Clone + 'static,
        S: Fn(&T) -> V + 'static,
        E: Fn(&V, &V) -> bool + 'static,
        H: Fn(&V) + 'static,
    {
        Subscription::register(
            &self.inner,
            Rc::new(selector),
            Rc::new(equals),
            Rc::new(on_change),
        )
    }

    /// Remove a listener. Unknown or already removed keys are ignored.
    ///
    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.inner.remove_listener(key)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }
}

impl<T: Merge + 'static> Store<T> {
    /// Shallow-merge `partial` into the state and run a notify pass.
    ///
    /// Fields absent from `partial` keep their value. An empty partial still
    /// re-evaluates every listener.
    pub fn set(&self, partial: T::Partial) {
        let base = self.get();
        self.inner.commit(base.merge(partial));
    }

    /// Compute a partial from the current state and [`set`](Self::set) it.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T::Partial,
    {
        let partial = self.read(f);
        self.set(partial);
    }
}

/// Create a store from an initializer. Same as [`Store::new`].
pub fn create_store<T, F>(initializer: F) -> Store<T>
where
    T: 'static,
    F: FnOnce(Accessors<T>) -> T,
{
    Store::new(initializer)
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.options.name_ref())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}
