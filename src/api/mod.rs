//! mod `api` provides the topmost fundamental APIs of the pipeline.
//! The configuration must be initialized before loading rules. There are three ways to perform initialization:
//!
//!  1. `init_default()`, using default config to initialize.
//!  2. `init_with_config(config_entity: config::ConfigEntity)`, using customized config entity to initialize.
//!  3. `init_with_config_file(config_path: &mut String)`, using yaml file to initialize.
//!
//! Entries are built with [`EntryBuilder`], each of them walks the slot chain of its resource.
//! The chains are assembled by the resolved [`SlotChainBuilder`] and cached per resource.

mod base;
mod context;
mod init;
mod metric;
mod provider;
mod rule;
mod slot_chain;

pub use base::*;
pub use context::*;
pub use init::*;
pub use metric::*;
pub use provider::*;
pub use rule::*;
pub use slot_chain::*;
