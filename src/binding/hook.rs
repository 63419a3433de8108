use std::rc::Rc;

use crate::error::BindingError;
use crate::runtime::{current_inner, Unit, UnitInner};
use crate::store::{default_equals, Equals, Selector, Store, Subscription};

/// Read a slice of `store` from inside a unit evaluation, comparing slices
/// with `PartialEq`.
///
/// The first call from a given hook position registers a listener that
/// invalidates the unit when the slice changes. Later calls swap in the new
/// selector and return the cached slice. The listener is removed when the
/// unit is torn down.
///
/// A slice whose `PartialEq` is not reflexive (a float holding NaN) compares
/// unequal to itself and invalidates the unit on every notify pass; pass an
/// explicit comparison to [`use_store_with`] for those.
///
/// # Panics
///
/// Panics when called outside [`Unit::evaluate`] or by a torn-down unit.
/// See [`try_use_store`] for the fallible form.
pub fn use_store<T, V, S>(store: &Store<T>, selector: S) -> V
where
    T: 'static,
    V: Clone + PartialEq + 'static,
    S: Fn(&T) -> V + 'static,
{
    unwrap_binding(try_use_store(store, selector))
}

/// Like [`use_store`], with a custom equality function.
///
/// # Panics
///
/// Same as [`use_store`].
pub fn use_store_with<T, V, S, E>(store: &Store<T>, selector: S, equals: E) -> V
where
    T: 'static,
    V: Clone + 'static,
    S: Fn(&T) -> V + 'static,
    E: Fn(&V, &V) -> bool + 'static,
{
    unwrap_binding(try_use_store_with(store, selector, equals))
}

pub fn try_use_store<T, V, S>(store: &Store<T>, selector: S) -> Result<V, BindingError>
where
    T: 'static,
    V: Clone + PartialEq + 'static,
    S: Fn(&T) -> V + 'static,
{
    bind(store, Rc::new(selector), default_equals())
}

pub fn try_use_store_with<T, V, S, E>(
    store: &Store<T>,
    selector: S,
    equals: E,
) -> Result<V, BindingError>
where
    T: 'static,
    V: Clone + 'static,
    S: Fn(&T) -> V + 'static,
    E: Fn(&V, &V) -> bool + 'static,
{
    bind(store, Rc::new(selector), Rc::new(equals))
}

fn unwrap_binding<V>(result: Result<V, BindingError>) -> V {
    match result {
        Ok(value) => value,
        Err(err) => panic!("use_store: {err}"),
    }
}

fn bind<T, V>(
    store: &Store<T>,
    selector: Selector<T, V>,
    equals: Equals<V>,
) -> Result<V, BindingError>
where
    T: 'static,
    V: Clone + 'static,
{
    let unit = current_inner().ok_or(BindingError::NoActiveUnit)?;
    if unit.is_torn_down() {
        return Err(BindingError::TornDown(unit.id()));
    }

    let index = unit.next_slot();
    if let Some(mut slot) = unit.take_slot(index) {
        let reused = match slot.as_any_mut().downcast_mut::<Subscription<T, V>>() {
            Some(sub) if sub.is_bound_to(store.inner()) => {
                sub.replace_closures(Rc::clone(&selector), Rc::clone(&equals));
                Some(sub.current())
            }
            _ => None,
        };
        if let Some(value) = reused {
            unit.put_slot(index, slot);
            return Ok(value);
        }

        log::warn!(
            "unit {}: hook slot {} changed store or slice type; re-subscribing. \
             Hooks must be called in the same order on every evaluation.",
            unit.id(),
            index
        );
        slot.release();
    }

    let sub = subscribe_unit(&unit, store, selector, equals);
    let value = sub.current();
    unit.put_slot(index, Box::new(sub));
    Ok(value)
}

fn subscribe_unit<T, V>(
    unit: &Rc<UnitInner>,
    store: &Store<T>,
    selector: Selector<T, V>,
    equals: Equals<V>,
) -> Subscription<T, V>
where
    T: 'static,
    V: Clone + 'static,
{
    let invalidate = Unit::invalidator(unit);
    Subscription::register(
        store.inner(),
        selector,
        equals,
        Rc::new(move |_: &V| invalidate()),
    )
}

impl<T: 'static> Store<T> {
    /// Method form of [`use_store`].
    pub fn use_store<V, S>(&self, selector: S) -> V
    where
        V: Clone + PartialEq + 'static,
        S: Fn(&T) -> V + 'static,
    {
        use_store(self, selector)
    }

    /// Method form of [`use_store_with`].
    pub fn use_store_with<V, S, E>(&self, selector: S, equals: E) -> V
    where
        V: Clone + 'static,
        S: Fn(&T) -> V + 'static,
        E: Fn(&V, &V) -> bool + 'static,
    {
        use_store_with(self, selector, equals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    type State = HashMap<&'static str, i32>;

    fn store() -> Store<State> {
        Store::from_state(HashMap::from([("count", 1), ("other", 0)]))
    }

    #[test]
    fn outside_evaluation_is_an_error() {
        let store = store();
        assert_eq!(
            try_use_store(&store, |s: &State| s["count"]),
            Err(BindingError::NoActiveUnit)
        );
    }

    #[test]
    fn torn_down_unit_is_an_error() {
        let store = store();
        let unit = Unit::detached();
        unit.teardown();

        let result = unit.evaluate(|| try_use_store(&store, |s: &State| s["count"]));

        assert_eq!(result, Err(BindingError::TornDown(unit.id())));
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn registers_once_per_slot() {
        let store = store();
        let unit = Unit::detached();

        for _ in 0..3 {
            unit.evaluate(|| {
                store.use_store(|s| s["count"]);
                store.use_store(|s| s["other"]);
            });
        }

        assert_eq!(store.listener_count(), 2);
    }

    #[test]
    fn invalidates_only_on_relevant_change() {
        let store = store();
        let renders = Rc::new(Cell::new(0));
        let unit = {
            let renders = renders.clone();
            Unit::new(move || renders.set(renders.get() + 1))
        };
        unit.evaluate(|| store.use_store(|s| s["count"]));

        store.set(HashMap::from([("other", 5)]));
        assert_eq!(renders.get(), 0);
        assert!(!unit.is_dirty());

        store.set(HashMap::from([("count", 2)]));
        assert_eq!(renders.get(), 1);
        assert!(unit.is_dirty());
        assert_eq!(unit.evaluate(|| store.use_store(|s| s["count"])), 2);
    }

    #[test]
    fn returns_cached_slice_not_fresh_evaluation() {
        let store = store();
        let unit = Unit::detached();
        unit.evaluate(|| store.use_store(|s| s["count"]));

        // A new selector takes effect on the next notify pass, not now.
        let value = unit.evaluate(|| store.use_store(|s| s["count"] * 100));
        assert_eq!(value, 1);

        store.set(HashMap::new());
        assert_eq!(unit.evaluate(|| store.use_store(|s| s["count"] * 100)), 100);
    }

    #[test]
    fn latest_selector_closure_is_used() {
        let store = store();
        let unit = Unit::detached();
        let mut factor = 1;

        let render = |factor: i32| unit.evaluate(|| store.use_store(move |s| s["count"] * factor));
        assert_eq!(render(factor), 1);

        factor = 3;
        render(factor);
        store.set(HashMap::from([("count", 2)]));

        assert_eq!(render(factor), 6);
    }

    #[test]
    fn custom_equality_is_swapped_each_evaluation() {
        let store = store();
        let unit = Unit::detached();

        unit.evaluate(|| store.use_store_with(|s| s["count"], |_, _| true));
        store.set(HashMap::from([("count", 2)]));
        assert!(!unit.is_dirty());

        unit.evaluate(|| store.use_store(|s| s["count"]));
        store.set(HashMap::from([("count", 3)]));
        assert!(unit.is_dirty());
    }

    #[test]
    fn teardown_unsubscribes_exactly_once() {
        let store = store();
        let unit = Unit::detached();
        unit.evaluate(|| {
            store.use_store(|s| s["count"]);
            store.use_store(|s| s["other"]);
        });
        assert_eq!(store.listener_count(), 2);

        unit.teardown();
        unit.teardown();
        assert_eq!(store.listener_count(), 0);

        store.set(HashMap::from([("count", 9)]));
        assert_eq!(unit.invalidations(), 0);
    }

    #[test]
    fn changed_slot_type_resubscribes() {
        let store = store();
        let unit = Unit::detached();
        unit.evaluate(|| store.use_store(|s| s["count"]));
        unit.evaluate(|| store.use_store(|s| s["count"].to_string()));

        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn changed_store_resubscribes() {
        let first = store();
        let second = store();
        let unit = Unit::detached();

        unit.evaluate(|| first.use_store(|s| s["count"]));
        unit.evaluate(|| second.use_store(|s| s["count"]));

        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 1);
    }
}
