//! Repeating timers for playback
//!
//! A [`Scheduler`] turns a period and a tick closure into an owned
//! [`RepeatingTask`]. Each engine owns its own handle; there is no global
//! timer state.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Shortest period a [`TokioScheduler`] will tick at
pub const MIN_PERIOD: Duration = Duration::from_nanos(1);

/// Tick callback: `Break` ends the repetition
pub type Tick = Box<dyn FnMut() -> ControlFlow<()>>;

pub trait Scheduler {
    /// Call `tick` every `period`, first one period from now
    fn schedule_repeating(&self, period: Duration, tick: Tick) -> Box<dyn RepeatingTask>;
}

/// Owned handle to a scheduled repetition; cancelled when dropped
pub trait RepeatingTask {
    /// Stop the repetition. No tick runs after this returns.
    fn cancel(&mut self);

    fn is_cancelled(&self) -> bool;
}

/* ===================== Tokio ===================== */

/// Runs ticks on the current thread's `tokio::task::LocalSet`.
///
/// Ticks run on the same thread as the calls that control playback, so
/// engine state needs no locking. Scheduling outside a `LocalSet` panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, mut tick: Tick) -> Box<dyn RepeatingTask> {
        // tokio intervals reject a zero period
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::task::spawn_local(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if cancelled.is_cancelled() {
                            break;
                        }
                        if tick().is_break() {
                            break;
                        }
                    }
                }
            }

            trace!(?period, "Repeating task finished");
        });

        Box::new(TokioRepeatingTask { token })
    }
}

struct TokioRepeatingTask {
    token: CancellationToken,
}

impl RepeatingTask for TokioRepeatingTask {
    fn cancel(&mut self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TokioRepeatingTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
