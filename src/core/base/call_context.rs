//! Call context: the call tree of one logical thread of control.
//!
//! A context is bound to the current thread through a thread-local slot,
//! nested entries built on the same thread share it without passing it around.
//! It is never inherited by other threads or tasks:
//! hand it over explicitly with [`ContextHandle`] and re-bind it there.
use super::{EntryWeakPtr, NULL_CONTEXT_NAME};
use crate::stat::DefaultNode;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// One active entry of a call context.
pub(crate) struct EntryFrame {
    pub(crate) id: u64,
    pub(crate) resource: String,
    pub(crate) entry: EntryWeakPtr,
    /// per-path node of the entry, set once the entry passed the rule checks
    pub(crate) cur_node: Option<Arc<DefaultNode>>,
}

pub struct CallContext {
    name: String,
    origin: String,
    /// `None` for the null context, whose entries skip the slot chain
    entrance_node: Option<Arc<DefaultNode>>,
    /// active entries, innermost last
    stack: Vec<EntryFrame>,
    /// created implicitly by an entry, released with its outermost entry
    auto_created: bool,
}

impl CallContext {
    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn entrance_node(&self) -> Option<Arc<DefaultNode>> {
        self.entrance_node.clone()
    }

    pub fn is_null(&self) -> bool {
        self.entrance_node.is_none()
    }

    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The id of the innermost active entry.
    pub fn current_entry_id(&self) -> Option<u64> {
        self.stack.last().map(|f| f.id)
    }

    /// The resource of the innermost active entry.
    pub fn current_resource(&self) -> Option<String> {
        self.stack.last().map(|f| f.resource.clone())
    }

    /// The node a new entry attaches its per-path node to:
    /// the node of the innermost active entry, or the entrance node.
    pub(crate) fn last_node(&self) -> Option<Arc<DefaultNode>> {
        match self.stack.last() {
            Some(frame) => frame.cur_node.clone().or_else(|| self.entrance_node.clone()),
            None => self.entrance_node.clone(),
        }
    }

    pub(crate) fn push(&mut self, frame: EntryFrame) {
        self.stack.push(frame);
    }

    pub(crate) fn pop_if_top(&mut self, id: u64) -> bool {
        if self.current_entry_id() == Some(id) {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    /// Removes all active entries, innermost first.
    pub(crate) fn drain(&mut self) -> Vec<EntryFrame> {
        let mut frames: Vec<EntryFrame> = self.stack.drain(..).collect();
        frames.reverse();
        frames
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("null", &self.is_null())
            .field(
                "stack",
                &self.stack.iter().map(|f| &f.resource).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A shareable handle of a call context.
/// Capture it on one thread or task and attach it on another to continue the same call tree.
#[derive(Clone, Debug)]
pub struct ContextHandle(Arc<Mutex<CallContext>>);

impl ContextHandle {
    pub fn new(name: String, origin: String, entrance_node: Arc<DefaultNode>) -> Self {
        Self::with_node(name, origin, Some(entrance_node), false)
    }

    pub(crate) fn with_node(
        name: String,
        origin: String,
        entrance_node: Option<Arc<DefaultNode>>,
        auto_created: bool,
    ) -> Self {
        ContextHandle(Arc::new(Mutex::new(CallContext {
            name,
            origin,
            entrance_node,
            stack: Vec::new(),
            auto_created,
        })))
    }

    /// A context whose entries are admitted without rule checking.
    pub fn null_context() -> Self {
        Self::with_node(NULL_CONTEXT_NAME.into(), String::new(), None, false)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CallContext> {
        self.0.lock().unwrap()
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn origin(&self) -> String {
        self.lock().origin.clone()
    }

    pub fn entrance_node(&self) -> Option<Arc<DefaultNode>> {
        self.lock().entrance_node()
    }

    pub fn is_null(&self) -> bool {
        self.lock().is_null()
    }

    pub fn depth(&self) -> usize {
        self.lock().depth()
    }

    pub fn current_entry_id(&self) -> Option<u64> {
        self.lock().current_entry_id()
    }

    pub fn current_resource(&self) -> Option<String> {
        self.lock().current_resource()
    }

    pub fn ptr_eq(&self, other: &ContextHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<ContextHandle>> = RefCell::new(None);
}

/// The context bound to the current thread.
pub fn current() -> Option<ContextHandle> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Binds `ctx` to the current thread, returning the previously bound context.
pub fn replace_current(ctx: Option<ContextHandle>) -> Option<ContextHandle> {
    CURRENT.with(|c| c.replace(ctx))
}

/// Unbinds `ctx` if it is the context bound to the current thread.
pub(crate) fn clear_current_if(ctx: &ContextHandle) -> bool {
    CURRENT.with(|c| {
        let mut cur = c.borrow_mut();
        match cur.as_ref() {
            Some(bound) if bound.ptr_eq(ctx) => {
                *cur = None;
                true
            }
            _ => false,
        }
    })
}
