//! Step interpreter behavior: sequencing, branching, parallel merge, and
//! failure propagation.

use serde_json::json;
use std::sync::Arc;
use wirecore::{CodeWorkflow, Step, StepCtx, TriggerKind};
use wireruntime::{FlowRuntime, NodeRegistry, StepExecutor};

fn ctx(value: serde_json::Value) -> StepCtx {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn tasks_run_in_sequence_each_seeing_the_previous_output() {
    let steps = vec![
        Step::task("first", |mut ctx: StepCtx| async move {
            ctx.insert("a".to_string(), json!(1));
            Ok(ctx)
        }),
        Step::task("second", |mut ctx: StepCtx| async move {
            let a = ctx.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
            ctx.insert("b".to_string(), json!(a + 1));
            Ok(ctx)
        }),
    ];

    let result = StepExecutor::new().run(&steps, StepCtx::new()).await.unwrap();
    assert_eq!(result.get("a"), Some(&json!(1)));
    assert_eq!(result.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn false_condition_runs_else_branch_only() {
    let steps = vec![Step::condition(
        "gate",
        |ctx: &StepCtx| Ok(ctx.get("open").and_then(|v| v.as_bool()).unwrap_or(false)),
        vec![Step::task("then", |mut ctx: StepCtx| async move {
            ctx.insert("taken".to_string(), json!("then"));
            Ok(ctx)
        })],
        Some(vec![Step::task("else", |mut ctx: StepCtx| async move {
            ctx.insert("taken".to_string(), json!("else"));
            Ok(ctx)
        })]),
    )];

    let result = StepExecutor::new()
        .run(&steps, ctx(json!({"open": false})))
        .await
        .unwrap();
    assert_eq!(result.get("taken"), Some(&json!("else")));
}

#[tokio::test]
async fn condition_without_else_passes_context_through() {
    let steps = vec![Step::condition(
        "gate",
        |_: &StepCtx| Ok(false),
        vec![Step::task("then", |_| async move { Ok(StepCtx::new()) })],
        None,
    )];

    let initial = ctx(json!({"kept": true}));
    let result = StepExecutor::new().run(&steps, initial.clone()).await.unwrap();
    assert_eq!(result, initial);
}

#[tokio::test]
async fn parallel_merge_is_deterministic_in_declaration_order() {
    let steps = vec![Step::parallel(
        "fan",
        vec![
            Step::task("branch-a", |mut ctx: StepCtx| async move {
                // Finishes last, but loses the collision: declaration order
                // decides the merge, not completion order.
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                ctx.insert("winner".to_string(), json!("a"));
                ctx.insert("a".to_string(), json!(1));
                Ok(ctx)
            }),
            Step::task("branch-b", |mut ctx: StepCtx| async move {
                ctx.insert("winner".to_string(), json!("b"));
                ctx.insert("b".to_string(), json!(2));
                Ok(ctx)
            }),
        ],
    )];

    let result = StepExecutor::new().run(&steps, StepCtx::new()).await.unwrap();
    assert_eq!(result.get("winner"), Some(&json!("b")));
    assert_eq!(result.get("a"), Some(&json!(1)));
    assert_eq!(result.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn failure_aborts_the_sequence_and_carries_partial_context() {
    let steps = vec![
        Step::task("setup", |mut ctx: StepCtx| async move {
            ctx.insert("x".to_string(), json!(10));
            Ok(ctx)
        }),
        Step::task("boom", |_| async move { Err("exploded".to_string()) }),
        Step::task("never", |mut ctx: StepCtx| async move {
            ctx.insert("ran".to_string(), json!(true));
            Ok(ctx)
        }),
    ];

    let failure = StepExecutor::new()
        .run(&steps, StepCtx::new())
        .await
        .unwrap_err();
    assert_eq!(failure.step_id, "boom");
    assert!(failure.reason.contains("exploded"));
    assert_eq!(failure.context.get("x"), Some(&json!(10)));
    assert!(!failure.context.contains_key("ran"));
}

#[tokio::test]
async fn predicate_error_is_a_step_failure() {
    let steps = vec![Step::condition(
        "gate",
        |_: &StepCtx| Err("no such key".to_string()),
        vec![],
        None,
    )];

    let failure = StepExecutor::new()
        .run(&steps, StepCtx::new())
        .await
        .unwrap_err();
    assert_eq!(failure.step_id, "gate");
    assert!(failure.reason.contains("no such key"));
}

#[tokio::test]
async fn code_workflow_runs_through_the_runtime() {
    let runtime = FlowRuntime::new(Arc::new(NodeRegistry::new()));
    let workflow = CodeWorkflow::new("enrich", "Enrich order")
        .with_trigger(TriggerKind::HttpIn)
        .with_step(Step::task("tag", |mut ctx: StepCtx| async move {
            ctx.insert("tagged".to_string(), json!(true));
            Ok(ctx)
        }));

    let result = runtime
        .execute_code_workflow(&workflow, ctx(json!({"order": 1})))
        .await
        .unwrap();
    assert_eq!(result.get("order"), Some(&json!(1)));
    assert_eq!(result.get("tagged"), Some(&json!(true)));
}

#[tokio::test]
async fn parallel_failure_surfaces_the_failing_branch() {
    let steps = vec![Step::parallel(
        "fan",
        vec![
            Step::task("ok", |mut ctx: StepCtx| async move {
                ctx.insert("ok".to_string(), json!(true));
                Ok(ctx)
            }),
            Step::task("bad", |_| async move { Err("branch died".to_string()) }),
        ],
    )];

    let failure = StepExecutor::new()
        .run(&steps, StepCtx::new())
        .await
        .unwrap_err();
    assert_eq!(failure.step_id, "bad");
}
