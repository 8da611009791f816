//! Call contexts of the current thread of control.
//!
//! A context is entered implicitly by the first entry built on a thread and released with its
//! outermost entry. Enter it explicitly with `enter_context()` to name it or to set the caller
//! origin, it then lives until `exit_context()`.

use crate::{
    base::{call_context, ContextError, ContextHandle, DEFAULT_CONTEXT_NAME, NULL_CONTEXT_NAME},
    logging, stat, utils,
};
use std::marker::PhantomData;

/// Enters the context `name` with the caller `origin` on the current thread.
/// If a context is already bound, that one is returned unchanged.
pub fn enter_context(name: &str, origin: &str) -> ContextHandle {
    if let Some(ctx) = call_context::current() {
        return ctx;
    }
    let ctx = new_context(name, origin, false);
    call_context::replace_current(Some(ctx.clone()));
    ctx
}

/// The context bound to the current thread.
pub fn current_context() -> Option<ContextHandle> {
    call_context::current()
}

/// Exits the context bound to the current thread.
/// Fails if entries of the context are still active, the context stays bound then.
pub fn exit_context() -> std::result::Result<(), ContextError> {
    let ctx = match call_context::current() {
        Some(ctx) => ctx,
        None => return Ok(()),
    };
    let active = ctx.depth();
    if active > 0 {
        let name = ctx.name();
        logging::warn!(
            "[Context exit] context {} still has {} active entries",
            name,
            active
        );
        return Err(ContextError::EntriesLeaked { name, active });
    }
    call_context::clear_current_if(&ctx);
    Ok(())
}

/// Builds a context without binding it.
/// It is a null context once the amount of context names reaches `max_context_amount`.
pub(crate) fn new_context(name: &str, origin: &str, auto_created: bool) -> ContextHandle {
    let name = if utils::is_blank(name) {
        DEFAULT_CONTEXT_NAME
    } else {
        name
    };
    let entrance_node = if name == NULL_CONTEXT_NAME {
        None
    } else {
        stat::get_or_create_entrance_node(name)
    };
    match entrance_node {
        Some(node) => {
            ContextHandle::with_node(name.into(), origin.into(), Some(node), auto_created)
        }
        None => {
            ContextHandle::with_node(NULL_CONTEXT_NAME.into(), origin.into(), None, auto_created)
        }
    }
}

/// The context of the current thread, to be attached on another thread or task.
pub fn capture_context() -> Option<ContextHandle> {
    call_context::current()
}

/// Binds `ctx` to the current thread until the guard is dropped,
/// then the previously bound context is restored.
pub fn attach_context(ctx: ContextHandle) -> ContextGuard {
    let prev = call_context::replace_current(Some(ctx));
    ContextGuard {
        prev,
        _not_send: PhantomData,
    }
}

/// Runs `f` with `ctx` bound to the current thread.
pub fn run_in_context<F, R>(ctx: &ContextHandle, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = attach_context(ctx.clone());
    f()
}

/// Restores the previous context of the thread on drop.
/// It stays on the thread it was created on.
#[must_use = "the context is detached when the guard is dropped"]
pub struct ContextGuard {
    prev: Option<ContextHandle>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        call_context::replace_current(self.prev.take());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enter_is_idempotent() {
        let ctx = enter_context("api_context_enter", "app_a");
        let again = enter_context("api_context_other", "app_b");
        assert!(ctx.ptr_eq(&again));
        assert_eq!(ctx.name(), "api_context_enter");
        assert_eq!(ctx.origin(), "app_a");
        assert!(!ctx.is_null());
        exit_context().unwrap();
        assert!(current_context().is_none());
        // exiting without a context is a no-op
        exit_context().unwrap();
    }

    #[test]
    fn blank_name_uses_default() {
        let ctx = new_context(" ", "", false);
        assert_eq!(ctx.name(), DEFAULT_CONTEXT_NAME);
    }

    #[test]
    fn attach_restores_previous() {
        let outer = enter_context("api_context_outer", "");
        let other = new_context("api_context_attached", "", false);
        {
            let _guard = attach_context(other.clone());
            assert!(current_context().unwrap().ptr_eq(&other));
        }
        assert!(current_context().unwrap().ptr_eq(&outer));
        let name = run_in_context(&other, || current_context().unwrap().name());
        assert_eq!(name, "api_context_attached");
        assert!(current_context().unwrap().ptr_eq(&outer));
        exit_context().unwrap();
    }
}
