use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The step model's sole state carrier: an open key→value mapping replaced
/// wholesale by each task (unlike a [`crate::WorkflowMessage`], which is
/// forwarded hop by hop).
pub type StepCtx = serde_json::Map<String, serde_json::Value>;

/// A task body: consumes the context, returns the replacement. May suspend.
pub type TaskFn = Arc<dyn Fn(StepCtx) -> BoxFuture<'static, Result<StepCtx, String>> + Send + Sync>;

/// A condition predicate, evaluated synchronously against the current context.
pub type PredicateFn = Arc<dyn Fn(&StepCtx) -> Result<bool, String> + Send + Sync>;

/// One unit of the task/parallel/condition program model.
#[derive(Clone)]
pub enum Step {
    Task {
        id: String,
        run: TaskFn,
    },
    Parallel {
        id: String,
        steps: Vec<Step>,
    },
    Condition {
        id: String,
        when: PredicateFn,
        then_steps: Vec<Step>,
        else_steps: Option<Vec<Step>>,
    },
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Task { id, .. } | Step::Parallel { id, .. } | Step::Condition { id, .. } => id,
        }
    }

    pub fn task<F, Fut>(id: impl Into<String>, run: F) -> Self
    where
        F: Fn(StepCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepCtx, String>> + Send + 'static,
    {
        Step::Task {
            id: id.into(),
            run: Arc::new(move |ctx| run(ctx).boxed()),
        }
    }

    pub fn parallel(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Step::Parallel {
            id: id.into(),
            steps,
        }
    }

    pub fn condition<P>(
        id: impl Into<String>,
        when: P,
        then_steps: Vec<Step>,
        else_steps: Option<Vec<Step>>,
    ) -> Self
    where
        P: Fn(&StepCtx) -> Result<bool, String> + Send + Sync + 'static,
    {
        Step::Condition {
            id: id.into(),
            when: Arc::new(when),
            then_steps,
            else_steps,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Task { id, .. } => f.debug_struct("Task").field("id", id).finish(),
            Step::Parallel { id, steps } => f
                .debug_struct("Parallel")
                .field("id", id)
                .field("steps", &steps.len())
                .finish(),
            Step::Condition {
                id,
                then_steps,
                else_steps,
                ..
            } => f
                .debug_struct("Condition")
                .field("id", id)
                .field("then", &then_steps.len())
                .field("else", &else_steps.as_ref().map(Vec::len))
                .finish(),
        }
    }
}

/// Trigger sources a code workflow can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    HttpIn,
    Webhook,
    Mqtt,
}

/// The alternative step-sequence program model. Steps carry closures, so code
/// workflows are built programmatically rather than deserialized.
#[derive(Debug, Clone)]
pub struct CodeWorkflow {
    pub id: String,
    pub name: String,
    pub triggers: HashSet<TriggerKind>,
    pub steps: Vec<Step>,
    pub auto_start: bool,
}

impl CodeWorkflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            triggers: HashSet::new(),
            steps: Vec::new(),
            auto_start: false,
        }
    }

    pub fn with_trigger(mut self, kind: TriggerKind) -> Self {
        self.triggers.insert(kind);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }
}
