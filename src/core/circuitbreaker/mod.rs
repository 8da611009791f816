//! The `circuitbreaker` module implements the degrade stage: per-rule circuit breakers
//! over a sliding window of completed requests.
//!
//! Three strategies are supported, `SlowRequestRatio`, `ErrorRatio` and `ErrorCount`,
//! customized breakers can be registered with `set_circuit_breaker_generator()`.
//! The check slot asks every breaker of the resource for admission,
//! the stat slot feeds the outcome of each completed call back to them.

pub mod breaker;
pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod stat_slot;

pub use breaker::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use stat_slot::*;
