//! Runtime support for observing units.
//!
//! This module provides the host-facing unit lifecycle: evaluation scopes,
//! per-unit hook slots, invalidation, and teardown.

mod context;

pub use context::Unit;
pub(crate) use context::{current_inner, Slot, UnitInner};
