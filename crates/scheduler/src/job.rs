//! Units of work queued on the scheduler.
//!
//! A job pairs a resumable body with optional hooks and an optional identity
//! token. The body is resumed one step at a time by the scheduler; each step
//! runs to its own completion and reports whether more steps remain, which
//! is what lets a long operation spread across several frames.

use crate::token::IdentityToken;

/// Outcome of resuming a job body by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The body has more steps to run; the scheduler yields to its caller
    /// and resumes the job on a later pass.
    Pending,

    /// The body ran to completion; the job is removed from the queue.
    Done,
}

/// A resumable job body. Each invocation performs one step and reports
/// whether more steps remain. Bodies are finite and are never resumed again
/// after reporting [`StepResult::Done`].
pub type JobBody = Box<dyn FnMut() -> StepResult + Send>;

/// One-shot hook attached to a job (dispose or first-duplicate).
pub type JobHook = Box<dyn FnOnce() + Send>;

/// A single schedulable unit of work.
///
/// Constructed from either a resumable body ([`Job::from_steps`]) or a
/// single atomic action ([`Job::from_action`]), then optionally decorated
/// with an identity token and hooks before being enqueued.
///
/// # Example
///
/// ```
/// use image_editor_scheduler::{Job, JobScheduler, StepResult};
///
/// let scheduler = JobScheduler::new();
///
/// // A three-step body: flatten one layer per frame.
/// let mut layers_left = 3;
/// scheduler.enqueue(Job::from_steps(move || {
///     layers_left -= 1;
///     if layers_left == 0 { StepResult::Done } else { StepResult::Pending }
/// }));
///
/// scheduler.drain();
/// assert_eq!(scheduler.stats().jobs_completed, 1);
/// ```
pub struct Job {
    pub(crate) body: JobBody,
    pub(crate) on_dispose: Option<JobHook>,
    pub(crate) on_first_duplicate: Option<JobHook>,
    pub(crate) token: Option<IdentityToken>,
    pub(crate) captured_identity: u32,
    pub(crate) started: bool,
}

impl Job {
    /// Create a job from a resumable body.
    pub fn from_steps(body: impl FnMut() -> StepResult + Send + 'static) -> Self {
        Self {
            body: Box::new(body),
            on_dispose: None,
            on_first_duplicate: None,
            token: None,
            captured_identity: 0,
            started: false,
        }
    }

    /// Create a job from a single atomic action, wrapped as a body that runs
    /// the action once and reports completion.
    pub fn from_action(action: impl FnOnce() + Send + 'static) -> Self {
        let mut action = Some(action);
        Self::from_steps(move || {
            if let Some(action) = action.take() {
                action();
            }
            StepResult::Done
        })
    }

    /// Attach an identity token, capturing its identity value now.
    ///
    /// For a unique token this also increments the token's pending count as
    /// a reservation: the job promises to either run or be accounted for
    /// when it is dequeued.
    pub fn with_token(mut self, token: &IdentityToken) -> Self {
        self.captured_identity = token.identity();
        if token.is_unique() {
            token.reserve();
        }
        self.token = Some(token.clone());
        self
    }

    /// Hook invoked exactly once if the job is removed by cancellation
    /// without running to completion (including when never started).
    pub fn with_dispose(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    /// Hook invoked at most once, for unique-identity jobs only, when this
    /// job is the first duplicate encountered after a previous member of
    /// the same identity already ran.
    pub fn with_first_duplicate(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_first_duplicate = Some(Box::new(hook));
        self
    }

    /// Resume the body by one step.
    pub(crate) fn resume(&mut self) -> StepResult {
        (self.body)()
    }

    /// True once the token's identity no longer matches the value captured
    /// at construction.
    pub(crate) fn is_stale(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| token.identity() != self.captured_identity)
    }
}
