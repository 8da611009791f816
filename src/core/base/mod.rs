//! Base types of the invocation pipeline: resources, entries, contexts, slot chains and their results.
pub mod block_error;
pub mod call_context;
pub mod constant;
pub mod context;
pub mod entry;
pub mod error;
pub mod resource;
pub mod result;
pub mod rule;
pub mod slot_chain;
pub mod stat;

pub use block_error::*;
pub(crate) use call_context::EntryFrame;
pub use call_context::{CallContext, ContextHandle};
pub use constant::*;
pub use context::*;
pub use entry::*;
pub use error::*;
pub use resource::*;
pub use result::*;
pub use rule::*;
pub use slot_chain::*;
pub use stat::*;
