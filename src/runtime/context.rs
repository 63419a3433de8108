use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-unit hook storage that must be released on teardown.
pub(crate) trait Slot: Any {
    fn release(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct UnitInner {
    id: usize,
    slots: RefCell<Vec<Option<Box<dyn Slot>>>>,
    cursor: Cell<usize>,
    on_invalidate: Rc<dyn Fn()>,
    dirty: Cell<bool>,
    invalidations: Cell<usize>,
    torn_down: Cell<bool>,
}

impl UnitInner {
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    /// Claim the next slot index for this evaluation.
    pub(crate) fn next_slot(&self) -> usize {
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        index
    }

    /// Take a slot out, leaving it empty until [`put_slot`](Self::put_slot).
    pub(crate) fn take_slot(&self, index: usize) -> Option<Box<dyn Slot>> {
        self.slots.borrow_mut().get_mut(index).and_then(Option::take)
    }

    pub(crate) fn put_slot(&self, index: usize, slot: Box<dyn Slot>) {
        let mut slots = self.slots.borrow_mut();
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        slots[index] = Some(slot);
    }

    fn invalidate(&self) {
        self.dirty.set(true);
        self.invalidations.set(self.invalidations.get() + 1);
        (self.on_invalidate)();
    }

    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        log::debug!("unit {}: teardown, releasing {} slots", self.id, slots.len());
        for mut slot in slots.into_iter().flatten() {
            slot.release();
        }
    }
}

impl Drop for UnitInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

// Thread-local stack of units under evaluation
thread_local! {
    static UNIT_STACK: RefCell<Vec<Rc<UnitInner>>> = const { RefCell::new(Vec::new()) };
}

static NEXT_UNIT_ID: AtomicUsize = AtomicUsize::new(0);

/// An observing unit, such as one mounted component instance.
///
/// A unit gives hooks a place to keep per-instance state across evaluations.
/// The host drives it: [`evaluate`](Self::evaluate) runs the unit's body,
/// the `on_invalidate` callback tells the host a store slice the unit reads
/// has changed, and [`teardown`](Self::teardown) (or dropping the last
/// handle) releases every store listener the unit registered.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use specks::{Store, Unit};
///
/// let store = Store::from_state(HashMap::from([("count", 1)]));
/// let unit = Unit::detached();
///
/// let count = unit.evaluate(|| store.use_store(|s| s["count"]));
/// assert_eq!(count, 1);
///
/// store.set(HashMap::from([("count", 2)]));
/// assert!(unit.is_dirty());
///
/// unit.teardown();
/// assert_eq!(store.listener_count(), 0);
/// ```
#[derive(Clone)]
pub struct Unit {
    inner: Rc<UnitInner>,
}

impl Unit {
    /// Create a unit that calls `on_invalidate` whenever one of its store
    /// slices changes.
    pub fn new(on_invalidate: impl Fn() + 'static) -> Self {
        let id = NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Rc::new(UnitInner {
                id,
                slots: RefCell::new(Vec::new()),
                cursor: Cell::new(0),
                on_invalidate: Rc::new(on_invalidate),
                dirty: Cell::new(false),
                invalidations: Cell::new(0),
                torn_down: Cell::new(false),
            }),
        }
    }

    /// Create a unit with no invalidation callback; the host polls
    /// [`is_dirty`](Self::is_dirty) instead.
    pub fn detached() -> Self {
        Self::new(|| {})
    }

    /// The unit currently being evaluated on this thread, if any.
    pub fn current() -> Option<Unit> {
        current_inner().map(|inner| Unit { inner })
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Run one evaluation of the unit.
    ///
    /// Hooks called by `f` bind to this unit, in call order. The dirty flag
    /// is cleared before `f` runs.
    pub fn evaluate<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.inner.is_torn_down() {
            log::warn!("unit {}: evaluated after teardown", self.inner.id);
        }
        self.inner.cursor.set(0);
        self.inner.dirty.set(false);

        UNIT_STACK.with(|stack| {
            stack.borrow_mut().push(Rc::clone(&self.inner));
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        UNIT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Whether a slice read by the unit changed since its last evaluation.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// How many times the unit has been invalidated over its lifetime.
    pub fn invalidations(&self) -> usize {
        self.inner.invalidations.get()
    }

    /// Release every store listener the unit holds. Safe to call more than
    /// once.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.is_torn_down()
    }

    /// A callback that invalidates this unit without keeping it alive.
    pub(crate) fn invalidator(inner: &Rc<UnitInner>) -> Rc<dyn Fn()> {
        let unit: Weak<UnitInner> = Rc::downgrade(inner);
        Rc::new(move || {
            if let Some(unit) = unit.upgrade() {
                unit.invalidate();
            }
        })
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .field("torn_down", &self.inner.torn_down.get())
            .finish()
    }
}

pub(crate) fn current_inner() -> Option<Rc<UnitInner>> {
    UNIT_STACK.with(|stack| stack.borrow().last().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag(Rc<Cell<bool>>);

    impl Slot for Flag {
        fn release(&mut self) {
            assert!(!self.0.replace(true), "slot released twice");
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn evaluate_sets_current_unit() {
        assert!(Unit::current().is_none());

        let outer = Unit::detached();
        let inner = Unit::detached();
        outer.evaluate(|| {
            assert_eq!(Unit::current().map(|u| u.id()), Some(outer.id()));
            inner.evaluate(|| {
                assert_eq!(Unit::current().map(|u| u.id()), Some(inner.id()));
            });
            assert_eq!(Unit::current().map(|u| u.id()), Some(outer.id()));
        });

        assert!(Unit::current().is_none());
    }

    #[test]
    fn evaluate_pops_on_panic() {
        let unit = Unit::detached();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            unit.evaluate(|| panic!("render failed"));
        }));
        assert!(result.is_err());
        assert!(Unit::current().is_none());
    }

    #[test]
    fn slots_follow_call_order() {
        let unit = Unit::detached();
        unit.evaluate(|| {
            let inner = current_inner().unwrap();
            assert_eq!(inner.next_slot(), 0);
            assert_eq!(inner.next_slot(), 1);
        });
        unit.evaluate(|| {
            let inner = current_inner().unwrap();
            assert_eq!(inner.next_slot(), 0);
        });
    }

    #[test]
    fn teardown_releases_slots_once() {
        let released = Rc::new(Cell::new(false));
        let unit = Unit::detached();
        unit.inner.put_slot(2, Box::new(Flag(released.clone())));

        unit.teardown();
        unit.teardown();

        assert!(released.get());
        assert!(unit.is_torn_down());
    }

    #[test]
    fn drop_tears_down() {
        let released = Rc::new(Cell::new(false));
        let unit = Unit::detached();
        unit.inner.put_slot(0, Box::new(Flag(released.clone())));

        drop(unit);

        assert!(released.get());
    }

    #[test]
    fn invalidator_marks_dirty_and_calls_host() {
        let renders = Rc::new(Cell::new(0));
        let unit = {
            let renders = renders.clone();
            Unit::new(move || renders.set(renders.get() + 1))
        };
        let invalidate = Unit::invalidator(&unit.inner);

        invalidate();
        assert!(unit.is_dirty());
        assert_eq!(renders.get(), 1);
        assert_eq!(unit.invalidations(), 1);

        unit.evaluate(|| {});
        assert!(!unit.is_dirty());

        drop(unit);
        invalidate();
        assert_eq!(renders.get(), 1);
    }
}
