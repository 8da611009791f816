use super::{call_context, ContextHandle, ContextPtr, EntryFreeError, SlotChain};
use crate::utils::curr_time_millis;
use crate::{logging, Error, Result};
use lazy_static::lazy_static;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::vec::Vec;

type ExitHandler = Box<dyn Send + Sync + Fn(&SentinelEntry, ContextPtr) -> Result<()>>;

lazy_static! {
    static ref ENTRY_ID: AtomicU64 = AtomicU64::new(1);
}

// entries are handed over between threads and tasks,
// therefore, we need Arc (for Sync and Send) and RwLock (for inner mutability)
type EntryStrongPtrInner = Arc<RwLock<SentinelEntry>>;
pub type EntryWeakPtr = Weak<RwLock<SentinelEntry>>;

/// SentinelEntry is one active invocation of a protected resource.
pub struct SentinelEntry {
    id: u64,
    parent_id: Option<u64>,
    ctx: ContextPtr,
    call_ctx: ContextHandle,
    exit_handlers: Vec<ExitHandler>,
    /// `None` when the entry is admitted without rule checking
    sc: Option<Arc<SlotChain>>,
    exited: AtomicBool,
    complete_time: AtomicU64,
}

impl SentinelEntry {
    pub fn new(ctx: ContextPtr, call_ctx: ContextHandle, sc: Option<Arc<SlotChain>>) -> Self {
        let parent_id = call_ctx.current_entry_id();
        SentinelEntry {
            id: ENTRY_ID.fetch_add(1, Ordering::SeqCst),
            parent_id,
            ctx,
            call_ctx,
            exit_handlers: Vec::new(),
            sc,
            exited: AtomicBool::new(false),
            complete_time: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The id of the entry which was the current entry of the context when this one was created.
    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    pub fn context(&self) -> &ContextPtr {
        &self.ctx
    }

    pub fn call_context(&self) -> &ContextHandle {
        &self.call_ctx
    }

    pub fn slot_chain(&self) -> Option<&Arc<SlotChain>> {
        self.sc.as_ref()
    }

    pub fn create_time(&self) -> u64 {
        self.ctx.read().unwrap().start_time()
    }

    /// The time the entry exited, 0 while it is active.
    pub fn complete_time(&self) -> u64 {
        self.complete_time.load(Ordering::SeqCst)
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn set_err(&self, err: Error) {
        self.ctx.write().unwrap().set_err(err);
    }

    /// Exits the entry, it must be the innermost active entry of its context.
    ///
    /// On a mismatch every entry still active in the context is exited, innermost first,
    /// so the call tree is left empty instead of corrupted.
    pub fn exit(&self) -> std::result::Result<(), EntryFreeError> {
        if self.exited.swap(true, Ordering::SeqCst) {
            return Err(EntryFreeError::AlreadyExited {
                resource: self.resource_name(),
            });
        }
        let mut call_ctx = self.call_ctx.lock();
        // a null context skips the rule checks, its stack is kept all the same
        if call_ctx.pop_if_top(self.id) {
            let release = call_ctx.is_auto_created() && call_ctx.depth() == 0;
            drop(call_ctx);
            self.complete();
            if release {
                call_context::clear_current_if(&self.call_ctx);
            }
            return Ok(());
        }

        let context = call_ctx.name().clone();
        let current = call_ctx.current_resource();
        let release = call_ctx.is_auto_created();
        let frames = call_ctx.drain();
        drop(call_ctx);
        logging::warn!(
            "[SentinelEntry exit] entry of resource {} is not the current entry of context {}, unwind {} entries",
            self.resource_name(),
            context,
            frames.len()
        );
        let mut self_completed = false;
        for frame in frames {
            if frame.id == self.id {
                self.complete();
                self_completed = true;
                continue;
            }
            if let Some(entry) = frame.entry.upgrade() {
                let entry = entry.read().unwrap();
                if !entry.exited.swap(true, Ordering::SeqCst) {
                    entry.complete();
                }
            }
        }
        if !self_completed {
            self.complete();
        }
        if release {
            call_context::clear_current_if(&self.call_ctx);
        }
        Err(EntryFreeError::Mismatch {
            context,
            exited: self.resource_name(),
            current,
        })
    }

    /// Completes an entry the slot chain blocked, it was never pushed to its context.
    /// Only the exit handlers run, the statistic slots already recorded the block.
    pub(crate) fn exit_blocked(&self) {
        if !self.exited.swap(true, Ordering::SeqCst) {
            self.complete();
        }
    }

    fn resource_name(&self) -> String {
        self.ctx.read().unwrap().resource().name().clone()
    }

    // runs the exit handlers and the completion of the slot chain
    fn complete(&self) {
        let now = curr_time_millis();
        self.complete_time.store(now, Ordering::SeqCst);
        {
            let mut ctx = self.ctx.write().unwrap();
            let round_trip = now.saturating_sub(ctx.start_time());
            ctx.set_round_trip(round_trip);
        }
        for handler in &self.exit_handlers {
            if let Err(err) = handler(self, self.ctx.clone()) {
                logging::error!("[SentinelEntry exit] fail to execute exit handler, {:?}", err);
            }
        }
        if let Some(sc) = &self.sc {
            sc.exit(self.ctx.clone());
        }
    }
}

/// The admitted entry returned to the caller.
pub struct EntryStrongPtr(EntryStrongPtrInner);

impl fmt::Debug for EntryStrongPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.0.read().unwrap();
        f.debug_struct("EntryStrongPtr")
            .field("id", &entry.id())
            .field("parent_id", &entry.parent_id())
            .field("exited", &entry.is_exited())
            .finish()
    }
}

impl EntryStrongPtr {
    pub fn new(entry: EntryStrongPtrInner) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub fn id(&self) -> u64 {
        self.0.read().unwrap().id()
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.0.read().unwrap().parent_id()
    }

    pub fn context(&self) -> ContextPtr {
        let entry = self.0.read().unwrap();
        entry.context().clone()
    }

    pub fn call_context(&self) -> ContextHandle {
        self.0.read().unwrap().call_context().clone()
    }

    pub fn is_exited(&self) -> bool {
        self.0.read().unwrap().is_exited()
    }

    /// Records the business error of the invocation, it is counted as an error on exit.
    pub fn set_err(&self, err: Error) {
        self.0.read().unwrap().set_err(err);
    }

    pub fn exit(&self) -> std::result::Result<(), EntryFreeError> {
        self.0.read().unwrap().exit()
    }

    /// Exits the entry, completing `count` invocations instead of the acquired amount.
    pub fn exit_with(&self, count: u32) -> std::result::Result<(), EntryFreeError> {
        let entry = self.0.read().unwrap();
        if !entry.is_exited() {
            entry
                .context()
                .write()
                .unwrap()
                .input_mut()
                .set_batch_count(count);
        }
        entry.exit()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryContext, EntryFrame};
    use std::cell::RefCell;

    std::thread_local! {
        static EXIT_FLAG: RefCell<u8> = RefCell::new(0);
    }
    fn exit_handler_mock(_entry: &SentinelEntry, _ctx: ContextPtr) -> Result<()> {
        EXIT_FLAG.with(|f| {
            *f.borrow_mut() += 1;
        });
        Ok(())
    }

    fn push(call_ctx: &ContextHandle, res: &str) -> EntryStrongPtr {
        let mut ctx = EntryContext::new();
        ctx.set_resource(crate::base::ResourceWrapper::new(
            res.into(),
            Default::default(),
            Default::default(),
        ));
        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(SentinelEntry::new(
            ctx.clone(),
            call_ctx.clone(),
            Some(Arc::new(SlotChain::new())),
        )));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));
        let id = entry.read().unwrap().id();
        call_ctx.lock().push(EntryFrame {
            id,
            resource: res.into(),
            entry: Arc::downgrade(&entry),
            cur_node: None,
        });
        EntryStrongPtr::new(entry)
    }

    fn call_context() -> ContextHandle {
        let node = Arc::new(crate::stat::DefaultNode::new_entrance(
            crate::base::ResourceWrapper::default(),
        ));
        ContextHandle::new("entry_test".into(), String::new(), node)
    }

    #[test]
    fn exit() {
        let call_ctx = call_context();
        let entry = push(&call_ctx, "exit");
        entry.0.write().unwrap().when_exit(Box::new(exit_handler_mock));
        entry.exit().unwrap();
        EXIT_FLAG.with(|f| {
            assert_eq!(*f.borrow(), 1);
        });
        assert!(entry.is_exited());
        assert_eq!(call_ctx.depth(), 0);
    }

    #[test]
    fn exit_twice() {
        let call_ctx = call_context();
        let entry = push(&call_ctx, "twice");
        entry.exit().unwrap();
        assert_eq!(
            entry.exit().unwrap_err(),
            EntryFreeError::AlreadyExited {
                resource: "twice".into()
            }
        );
    }

    #[test]
    fn nested_parent() {
        let call_ctx = call_context();
        let outer = push(&call_ctx, "outer");
        let inner = push(&call_ctx, "inner");
        assert_eq!(inner.parent_id(), Some(outer.id()));
        assert_eq!(outer.parent_id(), None);
        assert_eq!(call_ctx.current_entry_id(), Some(inner.id()));
        inner.exit().unwrap();
        assert_eq!(call_ctx.current_entry_id(), Some(outer.id()));
        outer.exit().unwrap();
        assert_eq!(call_ctx.current_entry_id(), None);
    }

    #[test]
    fn mismatch_unwinds() {
        let call_ctx = call_context();
        let outer = push(&call_ctx, "outer");
        let inner = push(&call_ctx, "inner");
        let err = outer.exit().unwrap_err();
        assert_eq!(
            err,
            EntryFreeError::Mismatch {
                context: "entry_test".into(),
                exited: "outer".into(),
                current: Some("inner".into()),
            }
        );
        assert!(inner.is_exited());
        assert_eq!(call_ctx.depth(), 0);
        assert!(matches!(
            inner.exit(),
            Err(EntryFreeError::AlreadyExited { .. })
        ));
    }
}
