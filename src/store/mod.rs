//! The state container and its listener registry.
//!
//! A [`Store`] owns one state value. Writes go through a shallow merge
//! ([`Store::set`]) or a whole replacement ([`Store::replace`]); either one
//! runs a notify pass that re-derives every listener's slice and only calls
//! back the listeners whose slice changed.

mod accessors;
mod listener;
mod options;
#[allow(clippy::module_inception)]
mod store;

pub use accessors::Accessors;
pub use listener::{ListenerKey, Subscription};
pub use options::StoreOptions;
pub use store::{create_store, Store};

pub(crate) use listener::{default_equals, Equals, Selector};
