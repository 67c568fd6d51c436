use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use wirecore::{Step, StepCtx, StepFailure};

/// Interpreter for the task/parallel/condition step model.
///
/// Steps run in sequence, each step's output context feeding the next. A
/// `parallel` step hands every branch the same context snapshot, waits for
/// all branches, then merges per key in branch declaration order — the
/// later-declared branch wins on collision, so the merge is deterministic
/// regardless of completion timing. The first failure aborts the remaining
/// sequence and carries the partial context out to the caller.
pub struct StepExecutor;

impl StepExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, steps: &[Step], ctx: StepCtx) -> Result<StepCtx, StepFailure> {
        run_sequence(steps, ctx).await
    }
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn run_sequence(steps: &[Step], ctx: StepCtx) -> BoxFuture<'_, Result<StepCtx, StepFailure>> {
    async move {
        let mut ctx = ctx;
        for step in steps {
            ctx = run_step(step, ctx).await?;
        }
        Ok(ctx)
    }
    .boxed()
}

async fn run_step(step: &Step, ctx: StepCtx) -> Result<StepCtx, StepFailure> {
    match step {
        Step::Task { id, run } => {
            tracing::debug!(step = %id, "running task step");
            run(ctx.clone())
                .await
                .map_err(|reason| StepFailure::new(id.clone(), reason, ctx))
        }
        Step::Condition {
            id,
            when,
            then_steps,
            else_steps,
        } => {
            let branch = when(&ctx).map_err(|reason| {
                StepFailure::new(id.clone(), format!("condition failed: {}", reason), ctx.clone())
            })?;
            tracing::debug!(step = %id, taken = branch, "condition step");
            if branch {
                run_sequence(then_steps, ctx).await
            } else if let Some(else_steps) = else_steps {
                run_sequence(else_steps, ctx).await
            } else {
                Ok(ctx)
            }
        }
        Step::Parallel { id, steps } => {
            tracing::debug!(step = %id, branches = steps.len(), "parallel step");
            let branches = steps
                .iter()
                .map(|branch| run_sequence(std::slice::from_ref(branch), ctx.clone()));
            let results = join_all(branches).await;

            // All branches have completed; merge in declaration order and
            // surface the first-declared failure if any branch aborted.
            let mut merged = ctx;
            for result in results {
                let branch_ctx = result?;
                for (key, value) in branch_ctx {
                    merged.insert(key, value);
                }
            }
            Ok(merged)
        }
    }
}
