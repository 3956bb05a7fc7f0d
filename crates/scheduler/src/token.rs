//! Identity tokens for job deduplication and cancellation.
//!
//! An identity token groups the jobs issued for one logical request (for
//! example "rebuild the brush preview", debounced across rapid edits). All
//! clones of a token share the same underlying state, so producers and the
//! scheduler observe each other's updates without a registry.
//!
//! Cancellation is a constant-time identity bump: jobs remember the identity
//! value they were constructed under, and the scheduler drops any job whose
//! captured value no longer matches when it next reaches the head of the
//! queue. The queue itself is never scanned.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Identity values live in `[0, IDENTITY_MODULUS)` and wrap on cancellation.
pub const IDENTITY_MODULUS: u32 = 0xFF_FFFF;

/// Shared identity handle for a group of related jobs.
///
/// A token created with `unique = true` additionally deduplicates bursts:
/// of several jobs queued back-to-back under the same identity, only the
/// last-queued one runs. The token counts outstanding reservations
/// ([`IdentityToken::pending`]) to recognize the last member of a burst.
///
/// # Example
///
/// ```
/// use image_editor_scheduler::{IdentityToken, Job, JobScheduler};
///
/// let scheduler = JobScheduler::new();
/// let preview = IdentityToken::new(true);
///
/// // Three rapid requests for the same preview rebuild...
/// for _ in 0..3 {
///     scheduler.enqueue(Job::from_action(|| { /* rebuild preview */ }).with_token(&preview));
/// }
///
/// // ...but only the last one actually runs.
/// scheduler.drain();
/// assert_eq!(scheduler.stats().jobs_completed, 1);
/// ```
#[derive(Clone)]
pub struct IdentityToken {
    state: Arc<TokenState>,
}

struct TokenState {
    unique: bool,
    identity: AtomicU32,
    pending: AtomicU32,
    has_run: AtomicBool,
}

impl IdentityToken {
    /// Create a new token with identity 0 and no outstanding reservations.
    pub fn new(unique: bool) -> Self {
        Self {
            state: Arc::new(TokenState {
                unique,
                identity: AtomicU32::new(0),
                pending: AtomicU32::new(0),
                has_run: AtomicBool::new(false),
            }),
        }
    }

    /// Invalidate every job currently queued under this token's identity.
    ///
    /// Constant time: bumps the identity value and returns. Stale jobs are
    /// detected and disposed lazily, when they next reach the head of the
    /// queue.
    pub fn cancel(&self) {
        let _ = self
            .state
            .identity
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(next_identity(v))
            });
    }

    /// Whether jobs sharing this token are deduplicated.
    pub fn is_unique(&self) -> bool {
        self.state.unique
    }

    /// The current valid identity value.
    pub fn identity(&self) -> u32 {
        self.state.identity.load(Ordering::Acquire)
    }

    /// Number of not-yet-started queued jobs holding the current identity.
    pub fn pending(&self) -> u32 {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Whether a member of this identity has begun execution and not yet
    /// been superseded by a reported duplicate.
    pub fn has_run(&self) -> bool {
        self.state.has_run.load(Ordering::Acquire)
    }

    /// Record a reservation for a newly constructed job.
    pub(crate) fn reserve(&self) {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Redeem or undo a reservation; returns the count left afterwards.
    pub(crate) fn release(&self) -> u32 {
        self.state.pending.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn set_has_run(&self, has_run: bool) {
        self.state.has_run.store(has_run, Ordering::Release);
    }
}

fn next_identity(identity: u32) -> u32 {
    (identity + 1) % IDENTITY_MODULUS
}
