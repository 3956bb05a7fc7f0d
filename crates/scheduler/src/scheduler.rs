//! Cooperative FIFO job scheduler.
//!
//! Producers append jobs to the tail at any time; the host loop is the
//! single consumer. Once per frame the host resets the budget, then calls
//! [`JobScheduler::advance`] repeatedly until the queue empties or the
//! budget is spent. Each `advance` call administers cancelled and
//! deduplicated entries eagerly, performs at most one resumption step per
//! job it reaches, and returns control as soon as a step reports more work
//! pending.

use crate::frame_budget::{FrameBudget, EVENT_PROCESSING_RESERVE, FRAME_BUDGET_60FPS};
use crate::job::{Job, StepResult};
use input_model::InputState;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Job scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs run to completion
    pub jobs_completed: u64,

    /// Total jobs dropped by cancellation (lazy staleness detection or `clear`)
    pub jobs_cancelled: u64,

    /// Total jobs dropped by unique-identity deduplication
    pub jobs_deduplicated: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Number of jobs submitted but not yet accounted for.
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_cancelled - self.jobs_deduplicated
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Per-frame time budget.
    /// Default: one 60 FPS frame (16.67ms).
    pub frame_budget: Duration,

    /// Time reserved for event processing within each frame.
    /// Default: 5ms.
    pub reserved: Duration,

    /// Start with the unlimited-time override active.
    /// Default: false.
    pub unlimited_time: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: FRAME_BUDGET_60FPS,
            reserved: EVENT_PROCESSING_RESERVE,
            unlimited_time: false,
        }
    }
}

impl SchedulerConfig {
    /// Create a new scheduler configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-frame time budget.
    pub fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    /// Set the time reserved for event processing.
    pub fn with_reserved(mut self, reserved: Duration) -> Self {
        self.reserved = reserved;
        self
    }

    /// Set the unlimited-time override.
    pub fn with_unlimited_time(mut self, unlimited_time: bool) -> Self {
        self.unlimited_time = unlimited_time;
        self
    }
}

/// Captured input records waiting to be committed, shared with the commit
/// jobs injected into the main queue.
struct SnapshotChannel {
    pending: Mutex<VecDeque<InputState>>,
    committed: Mutex<InputState>,
}

/// Cooperative FIFO job scheduler with input-snapshot hand-off.
///
/// Thread-safe for producers: any thread may enqueue, take snapshots, or
/// cancel via identity tokens. Consumption is single-threaded cooperative:
/// only the host loop may call [`JobScheduler::advance`] (or the drivers
/// built on it), and job bodies must not re-enter it.
///
/// # Example
///
/// ```
/// use image_editor_scheduler::{Job, JobScheduler};
///
/// let scheduler = JobScheduler::new();
/// scheduler.enqueue(Job::from_action(|| { /* rebuild a tile */ }));
///
/// // Host loop, once per frame:
/// scheduler.begin_frame();
/// while scheduler.has_pending_jobs() && !scheduler.should_yield() {
///     scheduler.advance();
/// }
/// ```
pub struct JobScheduler {
    queue: Mutex<VecDeque<Job>>,
    snapshots: Arc<SnapshotChannel>,
    transient: Mutex<InputState>,
    budget: Mutex<FrameBudget>,
    stats: Mutex<SchedulerStats>,
}

impl JobScheduler {
    /// Create a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with the given configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let mut budget = FrameBudget::new(config.frame_budget).with_reserved(config.reserved);
        budget.set_unlimited(config.unlimited_time);
        Self {
            queue: Mutex::new(VecDeque::new()),
            snapshots: Arc::new(SnapshotChannel {
                pending: Mutex::new(VecDeque::new()),
                committed: Mutex::new(InputState::default()),
            }),
            transient: Mutex::new(InputState::default()),
            budget: Mutex::new(budget),
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    /// Append a job to the tail of the queue.
    pub fn enqueue(&self, job: Job) {
        self.queue.lock().unwrap().push_back(job);
        self.stats.lock().unwrap().jobs_submitted += 1;
    }

    /// Replace the transient input state. Called by the UI layer whenever
    /// input changes (typically once per frame via `InputState::rollover`).
    pub fn set_transient_input(&self, state: InputState) {
        *self.transient.lock().unwrap() = state;
    }

    /// The current transient input state.
    pub fn transient_input(&self) -> InputState {
        *self.transient.lock().unwrap()
    }

    /// The most recently committed input snapshot.
    pub fn committed_input(&self) -> InputState {
        *self.snapshots.committed.lock().unwrap()
    }

    /// Capture the transient input state and enqueue its commit.
    ///
    /// The captured record is committed by a zero-step job that obeys the
    /// same FIFO ordering as all other work: jobs enqueued before this call
    /// observe input as of their own execution time, while jobs enqueued
    /// after it observe exactly the state captured here, no matter how far
    /// the transient state has drifted by the time they run. Multiple
    /// outstanding snapshots commit strictly in the order taken.
    pub fn take_snapshot(&self) {
        let state = self.transient_input();
        self.snapshots.pending.lock().unwrap().push_back(state);
        trace!("input snapshot captured");

        let channel = Arc::clone(&self.snapshots);
        self.enqueue(Job::from_action(move || {
            let record = channel.pending.lock().unwrap().pop_front();
            if let Some(record) = record {
                *channel.committed.lock().unwrap() = record;
            }
        }));
    }

    /// Reset the frame budget. Called by the host once per frame.
    pub fn begin_frame(&self) {
        self.budget.lock().unwrap().reset();
    }

    /// True once the frame budget is spent (never while the unlimited-time
    /// override is active). Polled by the host between `advance` calls.
    pub fn should_yield(&self) -> bool {
        self.budget.lock().unwrap().should_yield()
    }

    /// Toggle the unlimited-time override on the frame budget.
    pub fn set_unlimited_time(&self, unlimited: bool) {
        self.budget.lock().unwrap().set_unlimited(unlimited);
    }

    /// Advance the queue.
    ///
    /// Pops cancelled and deduplicated entries eagerly, then performs
    /// exactly one resumption step on the job at the head. Returns when the
    /// queue becomes empty or a resumed step reports more work pending; the
    /// frame budget is not consulted here, that is the host's job.
    ///
    /// Only the host loop may call this; job bodies must not re-enter it.
    pub fn advance(&self) {
        loop {
            let popped = self.queue.lock().unwrap().pop_front();
            let Some(mut job) = popped else {
                return;
            };

            // Lazy cancellation: the token identity moved on since this job
            // was constructed.
            if job.is_stale() {
                if !job.started {
                    if let Some(token) = job.token.as_ref().filter(|t| t.is_unique()) {
                        token.release();
                    }
                }
                self.stats.lock().unwrap().jobs_cancelled += 1;
                debug!("dropping cancelled job (started: {})", job.started);
                if let Some(hook) = job.on_dispose.take() {
                    hook();
                }
                continue;
            }

            if job.started {
                if self.step(job) == StepResult::Pending {
                    return;
                }
                continue;
            }

            match job.token.clone().filter(|t| t.is_unique()) {
                None => {
                    job.started = true;
                    if self.step(job) == StepResult::Pending {
                        return;
                    }
                }
                Some(token) => {
                    if token.release() == 0 {
                        // Sole remaining reservation: the last-queued member
                        // of the burst runs.
                        token.set_has_run(true);
                        job.started = true;
                        if self.step(job) == StepResult::Pending {
                            return;
                        }
                    } else if token.has_run() {
                        // First duplicate seen since a member of this
                        // identity ran.
                        token.set_has_run(false);
                        self.stats.lock().unwrap().jobs_deduplicated += 1;
                        debug!("dropping first duplicate since last run");
                        if let Some(hook) = job.on_first_duplicate.take() {
                            hook();
                        }
                    } else {
                        self.stats.lock().unwrap().jobs_deduplicated += 1;
                        trace!("dropping duplicate, burst not yet settled");
                    }
                }
            }
        }
    }

    /// Run one frame: reset the budget, then advance until the queue is
    /// empty or the budget is spent. Returns the number of advance passes
    /// made.
    pub fn run_frame(&self) -> u32 {
        self.begin_frame();
        let mut passes = 0;
        while self.has_pending_jobs() && !self.should_yield() {
            self.advance();
            passes += 1;
        }
        passes
    }

    /// Drain the whole queue synchronously, ignoring the frame budget.
    /// For blocking/batch contexts.
    pub fn drain(&self) {
        while self.has_pending_jobs() {
            self.advance();
        }
    }

    /// Remove every queued job.
    ///
    /// Invokes the dispose hook of each removed job (none of them ran to
    /// completion) and undoes the reservations of not-yet-started unique
    /// jobs. Captured-but-uncommitted snapshots are discarded alongside
    /// their commit jobs.
    pub fn clear(&self) {
        let removed: Vec<Job> = self.queue.lock().unwrap().drain(..).collect();
        self.snapshots.pending.lock().unwrap().clear();
        if removed.is_empty() {
            return;
        }
        debug!("clearing {} queued jobs", removed.len());

        self.stats.lock().unwrap().jobs_cancelled += removed.len() as u64;
        for mut job in removed {
            if !job.started {
                if let Some(token) = job.token.as_ref().filter(|t| t.is_unique()) {
                    token.release();
                }
            }
            if let Some(hook) = job.on_dispose.take() {
                hook();
            }
        }
    }

    /// Current number of queued jobs.
    pub fn pending_jobs(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether any jobs are queued.
    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.lock().unwrap().is_empty()
    }

    /// Scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.lock().unwrap().clone();
        stats.queue_size = self.pending_jobs();
        stats
    }

    /// Resume `job` by one step with the queue lock released, so the body
    /// may itself enqueue follow-up work or take snapshots. On `Pending`
    /// the job is pushed back to the head, keeping its position ahead of
    /// later arrivals.
    fn step(&self, mut job: Job) -> StepResult {
        match job.resume() {
            StepResult::Pending => {
                self.queue.lock().unwrap().push_front(job);
                StepResult::Pending
            }
            StepResult::Done => {
                self.stats.lock().unwrap().jobs_completed += 1;
                StepResult::Done
            }
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::IdentityToken;
    use input_model::PointerState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_scheduler_basic() {
        let scheduler = JobScheduler::new();
        assert_eq!(scheduler.pending_jobs(), 0);
        assert!(!scheduler.has_pending_jobs());

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        scheduler.enqueue(Job::from_action(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(scheduler.has_pending_jobs());

        scheduler.advance();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_jobs(), 0);

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_submitted, 1);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let scheduler = JobScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            scheduler.enqueue(Job::from_action(move || {
                order.lock().unwrap().push(i);
            }));
        }

        scheduler.drain();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_multi_step_job_yields_between_steps() {
        let scheduler = JobScheduler::new();
        let steps = Arc::new(AtomicUsize::new(0));
        let steps_clone = steps.clone();

        scheduler.enqueue(Job::from_steps(move || {
            let done = steps_clone.fetch_add(1, Ordering::SeqCst) == 2;
            if done {
                StepResult::Done
            } else {
                StepResult::Pending
            }
        }));

        scheduler.advance();
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_jobs(), 1);

        scheduler.advance();
        assert_eq!(steps.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending_jobs(), 1);

        scheduler.advance();
        assert_eq!(steps.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_jobs(), 0);
    }

    #[test]
    fn test_started_job_keeps_head_position() {
        let scheduler = JobScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let mut steps_left = 2;
        scheduler.enqueue(Job::from_steps(move || {
            order_a.lock().unwrap().push("a");
            steps_left -= 1;
            if steps_left == 0 {
                StepResult::Done
            } else {
                StepResult::Pending
            }
        }));

        // First step of "a" runs, then "b" arrives behind it.
        scheduler.advance();
        let order_b = order.clone();
        scheduler.enqueue(Job::from_action(move || {
            order_b.lock().unwrap().push("b");
        }));

        scheduler.drain();
        assert_eq!(*order.lock().unwrap(), vec!["a", "a", "b"]);
    }

    #[test]
    fn test_stale_job_disposed_without_running() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(true);
        let disposed = Arc::new(AtomicUsize::new(0));
        let disposed_clone = disposed.clone();

        scheduler.enqueue(
            Job::from_action(|| panic!("cancelled job must not run"))
                .with_token(&token)
                .with_dispose(move || {
                    disposed_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );
        assert_eq!(token.pending(), 1);

        token.cancel();
        scheduler.advance();

        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(token.pending(), 0);
        assert_eq!(scheduler.stats().jobs_cancelled, 1);
    }

    #[test]
    fn test_burst_runs_only_last_member() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(true);
        let ran = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let ran = ran.clone();
            scheduler.enqueue(
                Job::from_action(move || {
                    ran.lock().unwrap().push(i);
                })
                .with_token(&token),
            );
        }
        assert_eq!(token.pending(), 4);

        scheduler.drain();
        assert_eq!(*ran.lock().unwrap(), vec![3]);
        assert_eq!(token.pending(), 0);
        assert!(token.has_run());

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.jobs_deduplicated, 3);
    }

    #[test]
    fn test_first_duplicate_hook_after_completed_run() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(true);

        scheduler.enqueue(Job::from_action(|| {}).with_token(&token));
        scheduler.drain();
        assert!(token.has_run());

        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let ran = Arc::new(Mutex::new(Vec::new()));

        let ran_v1 = ran.clone();
        scheduler.enqueue(
            Job::from_action(move || {
                ran_v1.lock().unwrap().push("v1");
            })
            .with_token(&token)
            .with_first_duplicate(move || {
                notified_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let ran_v2 = ran.clone();
        scheduler.enqueue(
            Job::from_action(move || {
                ran_v2.lock().unwrap().push("v2");
            })
            .with_token(&token),
        );

        scheduler.drain();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(*ran.lock().unwrap(), vec!["v2"]);
        assert!(token.has_run());
    }

    #[test]
    fn test_mid_run_cancellation_keeps_reservation_count() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(true);
        let steps = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(AtomicUsize::new(0));

        let steps_clone = steps.clone();
        let disposed_clone = disposed.clone();
        scheduler.enqueue(
            Job::from_steps(move || {
                steps_clone.fetch_add(1, Ordering::SeqCst);
                StepResult::Pending
            })
            .with_token(&token)
            .with_dispose(move || {
                disposed_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        // The reservation is redeemed when the job starts.
        scheduler.advance();
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert_eq!(token.pending(), 0);

        // Cancelling a started job does not touch the pending count again.
        token.cancel();
        scheduler.advance();
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(token.pending(), 0);
        assert_eq!(scheduler.pending_jobs(), 0);
    }

    #[test]
    fn test_non_unique_token_never_deduplicates() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(false);
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let ran = ran.clone();
            scheduler.enqueue(
                Job::from_action(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .with_token(&token),
            );
        }

        scheduler.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(!token.has_run());
        assert_eq!(scheduler.stats().jobs_deduplicated, 0);
    }

    #[test]
    fn test_snapshot_commit() {
        let scheduler = JobScheduler::new();

        let mut state = InputState::default();
        state.rollover(PointerState::at(4.0, 2.0).with_primary_down(true), true);
        scheduler.set_transient_input(state);
        scheduler.take_snapshot();

        // Drift after the snapshot must not affect the committed record.
        let mut drifted = state;
        drifted.rollover(PointerState::at(9.0, 9.0), false);
        scheduler.set_transient_input(drifted);

        assert_eq!(scheduler.committed_input(), InputState::default());
        scheduler.drain();
        assert_eq!(scheduler.committed_input(), state);
        assert_eq!(scheduler.transient_input(), drifted);
    }

    #[test]
    fn test_reentrant_enqueue_from_job_body() {
        let scheduler = Arc::new(JobScheduler::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let scheduler_clone = scheduler.clone();
        let ran_clone = ran.clone();
        scheduler.enqueue(Job::from_action(move || {
            let ran = ran_clone.clone();
            scheduler_clone.enqueue(Job::from_action(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        scheduler.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().jobs_completed, 2);
    }

    #[test]
    fn test_clear_disposes_and_releases_reservations() {
        let scheduler = JobScheduler::new();
        let token = IdentityToken::new(true);
        let disposed = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let disposed = disposed.clone();
            scheduler.enqueue(
                Job::from_action(|| panic!("cleared job must not run"))
                    .with_token(&token)
                    .with_dispose(move || {
                        disposed.fetch_add(1, Ordering::SeqCst);
                    }),
            );
        }
        scheduler.take_snapshot();
        assert_eq!(token.pending(), 2);

        scheduler.clear();
        assert_eq!(scheduler.pending_jobs(), 0);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
        assert_eq!(token.pending(), 0);
        assert_eq!(scheduler.stats().jobs_cancelled, 3);
    }

    #[test]
    fn test_run_frame_respects_zero_budget() {
        let scheduler = JobScheduler::with_config(
            SchedulerConfig::new()
                .with_frame_budget(Duration::ZERO)
                .with_reserved(Duration::ZERO),
        );
        scheduler.enqueue(Job::from_action(|| {}));

        // Budget already spent at frame start: no passes are made.
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(scheduler.pending_jobs(), 1);

        // With the unlimited override the same frame drains everything.
        scheduler.set_unlimited_time(true);
        assert!(scheduler.run_frame() > 0);
        assert_eq!(scheduler.pending_jobs(), 0);
    }

    #[test]
    fn test_config_builder() {
        let config = SchedulerConfig::new()
            .with_frame_budget(Duration::from_millis(8))
            .with_reserved(Duration::from_millis(1))
            .with_unlimited_time(true);
        assert_eq!(config.frame_budget, Duration::from_millis(8));
        assert_eq!(config.reserved, Duration::from_millis(1));
        assert!(config.unlimited_time);

        let scheduler = JobScheduler::with_config(config);
        assert!(!scheduler.should_yield());
    }

    #[test]
    fn test_default() {
        let scheduler = JobScheduler::default();
        assert_eq!(scheduler.pending_jobs(), 0);
        assert_eq!(scheduler.committed_input(), InputState::default());
    }
}
