//! mod `system` provides the adaptive protection of the whole process.
//!
//! System rules are not bound to a resource, they guard all the inbound traffic,
//! whose statistics are kept by the global inbound node.
//! Outbound entries are never checked.

pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
