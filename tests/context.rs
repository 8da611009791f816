use sentinel_pipeline::{
    attach_context,
    base::{ContextError, EntryFreeError, NULL_CONTEXT_NAME},
    capture_context, current_context, enter_context, exit_context, run_in_context, EntryBuilder,
};

#[test]
fn nested_entries_form_a_tree() {
    let ctx = enter_context("ctx_tree", "app_tree");
    let outer = EntryBuilder::new("ctx_tree_outer".into()).build().unwrap();
    let inner = EntryBuilder::new("ctx_tree_inner".into()).build().unwrap();
    assert_eq!(inner.parent_id(), Some(outer.id()));
    assert!(inner.call_context().ptr_eq(&ctx));
    assert_eq!(ctx.depth(), 2);
    assert_eq!(ctx.current_resource(), Some("ctx_tree_inner".into()));
    assert_eq!(inner.context().read().unwrap().origin(), "app_tree");

    let entrance = ctx.entrance_node().unwrap();
    let outer_node = entrance
        .children()
        .into_iter()
        .find(|n| n.resource().name() == "ctx_tree_outer")
        .unwrap();
    assert!(outer_node
        .children()
        .iter()
        .any(|n| n.resource().name() == "ctx_tree_inner"));

    inner.exit().unwrap();
    outer.exit().unwrap();
    assert_eq!(ctx.depth(), 0);
    exit_context().unwrap();
    assert!(current_context().is_none());
}

#[test]
fn implicit_context_is_released_with_outermost_entry() {
    assert!(current_context().is_none());
    let outer = EntryBuilder::new("ctx_implicit_outer".into()).build().unwrap();
    let ctx = current_context().unwrap();
    let inner = EntryBuilder::new("ctx_implicit_inner".into()).build().unwrap();
    assert!(inner.call_context().ptr_eq(&ctx));
    inner.exit().unwrap();
    assert!(current_context().is_some());
    outer.exit().unwrap();
    assert!(current_context().is_none());
}

#[test]
fn out_of_order_exit() {
    let ctx = enter_context("ctx_out_of_order", "");
    let outer = EntryBuilder::new("ctx_ooo_outer".into()).build().unwrap();
    let inner = EntryBuilder::new("ctx_ooo_inner".into()).build().unwrap();
    match outer.exit() {
        Err(EntryFreeError::Mismatch {
            context,
            exited,
            current,
        }) => {
            assert_eq!(context, "ctx_out_of_order");
            assert_eq!(exited, "ctx_ooo_outer");
            assert_eq!(current, Some("ctx_ooo_inner".into()));
        }
        other => panic!("unexpected exit result {:?}", other),
    }
    // the whole stack is unwound
    assert!(inner.is_exited());
    assert_eq!(ctx.depth(), 0);
    assert_eq!(
        outer.exit(),
        Err(EntryFreeError::AlreadyExited {
            resource: "ctx_ooo_outer".into()
        })
    );
    exit_context().unwrap();
}

#[test]
fn null_context_keeps_stack_discipline() {
    let ctx = enter_context(NULL_CONTEXT_NAME, "");
    assert!(ctx.is_null());
    let outer = EntryBuilder::new("ctx_null_outer".into()).build().unwrap();
    let inner = EntryBuilder::new("ctx_null_inner".into()).build().unwrap();
    assert_eq!(ctx.depth(), 2);
    inner.exit().unwrap();
    assert_eq!(ctx.depth(), 1);
    outer.exit().unwrap();
    assert_eq!(ctx.depth(), 0);

    let outer = EntryBuilder::new("ctx_null_outer".into()).build().unwrap();
    let inner = EntryBuilder::new("ctx_null_inner".into()).build().unwrap();
    assert!(matches!(outer.exit(), Err(EntryFreeError::Mismatch { .. })));
    assert!(inner.is_exited());
    assert_eq!(ctx.depth(), 0);
    exit_context().unwrap();
    assert!(current_context().is_none());
}

#[test]
fn leaked_entries_keep_context() {
    let ctx = enter_context("ctx_leaked", "");
    let entry = EntryBuilder::new("ctx_leaked_res".into()).build().unwrap();
    assert_eq!(
        exit_context(),
        Err(ContextError::EntriesLeaked {
            name: "ctx_leaked".into(),
            active: 1,
        })
    );
    assert!(current_context().unwrap().ptr_eq(&ctx));
    entry.exit().unwrap();
    exit_context().unwrap();
}

#[test]
fn run_on_other_thread() {
    let outer = EntryBuilder::new("ctx_thread_outer".into()).build().unwrap();
    let ctx = capture_context().unwrap();
    let outer_id = outer.id();
    std::thread::spawn(move || {
        assert!(current_context().is_none());
        let parent = run_in_context(&ctx, || {
            let inner = EntryBuilder::new("ctx_thread_inner".into()).build().unwrap();
            let parent = inner.parent_id();
            inner.exit().unwrap();
            parent
        });
        assert_eq!(parent, Some(outer_id));
        assert!(current_context().is_none());
    })
    .join()
    .unwrap();
    outer.exit().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attach_in_tasks() {
    let ctx = enter_context("ctx_tokio", "app_tokio");
    let outer = EntryBuilder::new("ctx_tokio_outer".into()).build().unwrap();
    let outer_id = outer.id();

    let captured = capture_context().unwrap();
    let blocking = tokio::task::spawn_blocking(move || {
        let _guard = attach_context(captured);
        let inner = EntryBuilder::new("ctx_tokio_blocking".into())
            .build()
            .unwrap();
        let parent = inner.parent_id();
        inner.exit().unwrap();
        parent
    })
    .await
    .unwrap();
    assert_eq!(blocking, Some(outer_id));

    let captured = capture_context().unwrap();
    let spawned = tokio::spawn(async move {
        // the guard never lives across an await point
        run_in_context(&captured, || {
            let inner = EntryBuilder::new("ctx_tokio_task".into()).build().unwrap();
            let origin = inner.context().read().unwrap().origin().clone();
            inner.exit().unwrap();
            origin
        })
    })
    .await
    .unwrap();
    assert_eq!(spawned, "app_tokio");

    assert_eq!(ctx.depth(), 1);
    outer.exit().unwrap();
    exit_context().unwrap();
}
