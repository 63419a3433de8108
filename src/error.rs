//! Error types for store accessors and unit bindings.

use thiserror::Error;

/// Errors reported by [`Accessors`](crate::Accessors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The accessors were used from inside the initializer, before the
    /// initial state existed.
    #[error("store state is not initialized yet")]
    Uninitialized,
    /// Every handle to the store has been dropped.
    #[error("store has been dropped")]
    Dropped,
}

/// Errors reported by the `use_store` hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The hook was called outside of [`Unit::evaluate`](crate::Unit::evaluate).
    #[error("store hook used outside of a unit evaluation")]
    NoActiveUnit,
    /// The unit being evaluated has already been torn down.
    #[error("store hook used by a torn-down unit (unit {0})")]
    TornDown(usize),
}
