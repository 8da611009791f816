//! The `flow` module implements flow shaping control.
//!
//! A traffic shaping `Controller` consists of two parts: a `Calculator` and a `Checker`.
//!
//!  1. The `Calculator` calculates the actual threshold of the current call. Two strategies are supported: `Direct` and `WarmUp`.
//!  2. The `Checker` compares the current metric with that threshold and yields the token result. Two control behaviors are supported: `Reject` and `Throttling`.
//!
//! Customized controllers can be registered with `set_traffic_shaping_generator()`
//! and unregistered with `remove_traffic_shaping_generator()`,
//! the built-in combinations can not be overridden.
//!
//! Besides the resource itself, a rule may limit a single caller origin (`limit_origin`),
//! an associated resource (`RelationStrategy::Associated`) or the calls entered
//! under a specific context (`RelationStrategy::Chain`).

pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod standalone_stat_slot;
pub mod traffic_shaping;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use standalone_stat_slot::*;
pub use traffic_shaping::*;
