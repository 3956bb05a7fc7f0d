//! Image Editor Scheduler Library
//!
//! Cooperative job scheduler with identity tokens and input snapshots.
//!
//! This crate lets the image editor spread long-running work (tile rebuilds,
//! filters, selection masks) across frames without blocking the main loop.
//! Jobs are resumed one step at a time in strict FIFO order; identity tokens
//! provide debouncing (of a burst of equivalent requests, only the last one
//! runs) and constant-time cancellation that is observed lazily at the head
//! of the queue. Input snapshots ride the same queue, so asynchronous work
//! can read the pointer state as it was when the work was requested rather
//! than wherever the pointer has drifted since.
//!
//! # Example
//!
//! ```
//! use image_editor_scheduler::{IdentityToken, Job, JobScheduler, StepResult};
//!
//! let scheduler = JobScheduler::new();
//!
//! // Debounced preview rebuild: of a burst, only the last request runs.
//! let preview = IdentityToken::new(true);
//! for _ in 0..3 {
//!     scheduler.enqueue(Job::from_action(|| { /* rebuild preview */ }).with_token(&preview));
//! }
//!
//! // A multi-step job that spreads across frames.
//! let mut rows_left = 240;
//! scheduler.enqueue(Job::from_steps(move || {
//!     rows_left -= 80;
//!     if rows_left == 0 { StepResult::Done } else { StepResult::Pending }
//! }));
//!
//! // Host loop, once per frame:
//! scheduler.begin_frame();
//! while scheduler.has_pending_jobs() && !scheduler.should_yield() {
//!     scheduler.advance();
//! }
//! ```

mod frame_budget;
mod job;
mod scheduler;
mod token;

// Re-export public API
pub use frame_budget::{
    FrameBudget, EVENT_PROCESSING_RESERVE, FRAME_BUDGET_120FPS, FRAME_BUDGET_60FPS,
};
pub use job::{Job, JobBody, JobHook, StepResult};
pub use scheduler::{JobScheduler, SchedulerConfig, SchedulerStats};
pub use token::{IdentityToken, IDENTITY_MODULUS};
