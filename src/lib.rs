#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Sentinel invocation pipeline
//!
//! Every call to a protected resource walks a per-resource `SlotChain`:
//! the prepare slots resolve the statistic nodes of the call tree,
//! the rule check slots (authority, system, flow, circuit breaker) decide whether the call may proceed,
//! and the statistic slots record the outcome on the sliding windows those decisions read.
//!
//! Generally, there are several steps when using the pipeline:
//! 1. Initialize the configuration, `init_default()`, `init_with_config()` or `init_with_config_file()`.
//! 2. Load the rules of each rule class with `load_rules()`.
//! 3. Build an entry for the resource and exit it when the business logic finishes.
//!
//! ```rust
//! use sentinel_pipeline::{api::EntryBuilder, base::TrafficType, flow, load_rules, RuleSet};
//! use std::sync::Arc;
//!
//! load_rules(RuleSet::Flow(vec![Arc::new(flow::Rule {
//!     resource: "example".into(),
//!     threshold: 10.0,
//!     ..Default::default()
//! })]));
//!
//! match EntryBuilder::new("example".into())
//!     .with_traffic_type(TrafficType::Inbound)
//!     .build()
//! {
//!     Ok(entry) => {
//!         // the request is admitted, run the business logic
//!         entry.exit().unwrap();
//!     }
//!     Err(blocked) => {
//!         // the request is blocked, branch on `blocked.block_type()`
//!     }
//! }
//! ```
//!
//! Entries opened on one thread of control nest strictly: they share one call context,
//! and must be exited in the reverse order of their creation.
//! When work moves to another thread or task, capture the context with `capture_context()`
//! and re-attach it there with `attach_context()`.

/// Entry points of the pipeline: initialization, entries, contexts,
/// slot chain assembly, rule loading and node queries.
pub mod api;
/// Core implementations, including the statistic structures
/// such as the sliding window and its underlying LeapArray, the rule managers
/// and the slots checking them.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
// Utility functions.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
