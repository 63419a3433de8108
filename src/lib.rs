//! # Specks
//!
//! A small state container for component-style UI code.
//!
//! Application code defines a state value and its update logic once; many
//! observing units subscribe to derived slices of that state and are only
//! re-evaluated when their own slice changes.
//!
//! ## Store (state and notification)
//!
//! - `Store<T>` - Holds the state and a registry of slice listeners
//! - `Store::set` - Shallow-merges a partial update, then notifies selectively
//! - `Accessors<T>` - `get`/`set` handed to the initializer, for actions that
//!   live inside the state
//! - `store_state!` - Declares a state struct and its partial update type
//!
//! ## Binding (units and hooks)
//!
//! Helpers that tie a unit's lifecycle to store listeners:
//! - `Unit` - One observing instance: hook slots, invalidation, teardown
//! - `use_store` - Reads a slice inside `Unit::evaluate`, subscribing once
//!
//! ```
//! use std::rc::Rc;
//! use specks::{create_store, store_state, Accessors, Unit};
//!
//! store_state! {
//!     #[derive(Clone)]
//!     struct Counter => CounterPatch {
//!         count: i64,
//!         label: String,
//!         add: Rc<dyn Fn(i64)>,
//!     }
//! }
//!
//! let store = create_store(|acc: Accessors<Counter>| {
//!     let set = acc.clone();
//!     Counter {
//!         count: 1,
//!         label: "clicks".to_string(),
//!         add: Rc::new(move |n: i64| set.update(|s| CounterPatch::new().count(s.count + n))),
//!     }
//! });
//!
//! let unit = Unit::detached();
//! let count = unit.evaluate(|| store.use_store(|s| s.count));
//! assert_eq!(count, 1);
//!
//! store.set(CounterPatch::new().label("taps".to_string()));
//! assert!(!unit.is_dirty());
//!
//! (store.get().add)(10);
//! assert!(unit.is_dirty());
//! assert_eq!(unit.evaluate(|| store.use_store(|s| s.count)), 11);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod binding;
pub mod error;
pub mod merge;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use binding::{try_use_store, try_use_store_with, use_store, use_store_with};
pub use error::{BindingError, StoreError};
pub use merge::Merge;
pub use runtime::Unit;
pub use store::{create_store, Accessors, ListenerKey, Store, StoreOptions, Subscription};
