use super::{context::new_context, is_enabled, slot_chain_of};
use crate::base::{
    call_context, BlockError, EntryContext, EntryFrame, EntryStrongPtr, ParamKey,
    ParamsList, ResourceType, ResourceWrapper, SentinelEntry, SentinelInput, SlotChain,
    TokenResult, TrafficType,
};
use crate::Error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// EntryBuilder is the basic API of the pipeline.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    batch_count: u32,
    flag: i32,
    origin: Option<String>,
    slot_chain: Option<Arc<SlotChain>>,
    args: Option<ParamsList>,
    attachments: Option<HashMap<String, ParamKey>>,
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            batch_count: 1,
            flag: 0,
            origin: None,
            slot_chain: None,
            args: None,
            attachments: None,
        }
    }

    /// Walks the slot chain of the resource.
    /// `Ok` is the admitted entry, it must be exited exactly once.
    /// `Err` tells which rule class blocked the call, nothing needs to be exited then.
    pub fn build(self) -> std::result::Result<EntryStrongPtr, BlockError> {
        let resource =
            ResourceWrapper::new(self.resource_name, self.resource_type, self.traffic_type);
        let (call_ctx, auto_created) = match call_context::current() {
            Some(ctx) => (ctx, false),
            None => {
                let ctx = new_context(
                    "",
                    self.origin.as_deref().unwrap_or_default(),
                    true,
                );
                call_context::replace_current(Some(ctx.clone()));
                (ctx, true)
            }
        };
        let sc = match self.slot_chain {
            _ if !is_enabled() || call_ctx.is_null() => None,
            Some(sc) => Some(sc),
            None => slot_chain_of(&resource),
        };

        let mut ctx = EntryContext::new();
        {
            let call_ctx = call_ctx.lock();
            ctx.set_context_name(call_ctx.name().clone());
            ctx.set_origin(self.origin.unwrap_or_else(|| call_ctx.origin().clone()));
            ctx.set_last_node(call_ctx.last_node());
        }
        let res_name = resource.name().clone();
        ctx.set_resource(resource);
        let mut input = SentinelInput::new(self.batch_count, self.flag);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        if let Some(attachments) = self.attachments {
            input.set_attachments(attachments);
        }
        ctx.set_input(input);

        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(SentinelEntry::new(
            Arc::clone(&ctx),
            call_ctx.clone(),
            sc.clone(),
        )));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

        if let Some(sc) = &sc {
            if let TokenResult::Blocked(err) = sc.entry(Arc::clone(&ctx)) {
                // rolls back what the checks reserved, e.g. a circuit breaker trial call
                entry.read().unwrap().exit_blocked();
                if auto_created {
                    call_context::clear_current_if(&call_ctx);
                }
                let node = ctx.read().unwrap().stat_node();
                return Err(err.with_node(node));
            }
        }

        let cur_node = ctx.read().unwrap().cur_node();
        let id = entry.read().unwrap().id();
        call_ctx.lock().push(EntryFrame {
            id,
            resource: res_name,
            entry: Arc::downgrade(&entry),
            cur_node,
        });
        Ok(EntryStrongPtr::new(entry))
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_flag(mut self, flag: i32) -> Self {
        self.flag = flag;
        self
    }

    /// The caller origin of this entry, it overrides the origin of the context.
    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Walks `slot_chain` instead of the cached chain of the resource.
    pub fn with_slot_chain(mut self, slot_chain: Arc<SlotChain>) -> Self {
        self.slot_chain = Some(slot_chain);
        self
    }

    pub fn with_args(mut self, args: Option<ParamsList>) -> Self {
        self.args = args;
        self
    }

    pub fn with_attachments(mut self, attachments: Option<HashMap<String, ParamKey>>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Records a business error on the entry, the call is counted as failed on exit.
pub fn trace_error(entry: &EntryStrongPtr, err: Error) {
    entry.set_err(err);
}
