//! Hooks that bind a unit's lifecycle to store listeners.

mod hook;

pub use hook::{try_use_store, try_use_store_with, use_store, use_store_with};
