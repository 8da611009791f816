//! The `authority` module admits or rejects calls by their caller origin.
//!
//! An authority rule carries a list of origins and a strategy.
//! With `White` only the listed origins may call the resource, with `Black` the listed origins are rejected.
//! Calls without an origin are never checked.

pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
