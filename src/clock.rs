//! Time source used by the polling loops.
//!
//! Production code runs on [`TokioClock`]. Tests drive [`ManualClock`],
//! which advances virtual time on every sleep without actually waiting.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Monotonic time, wall-clock time and suspension.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic instant used for deadlines.
    fn now(&self) -> Instant;

    /// Local wall-clock time used for generated filename timestamps.
    fn local_now(&self) -> NaiveDateTime;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer and the system local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn local_now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Callback run after each virtual sleep with the total elapsed time.
pub type SleepHook = Box<dyn FnMut(Duration) + Send>;

struct ManualState {
    elapsed: Duration,
    sleeps: usize,
    hook: Option<SleepHook>,
}

/// Virtual clock: `sleep` advances time instantly.
///
/// An optional hook runs after every sleep, which lets a test mutate the
/// filesystem "while" the code under test is waiting.
pub struct ManualClock {
    start: Instant,
    wall_start: NaiveDateTime,
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Create a clock whose wall time starts at `wall_start`.
    #[must_use]
    pub fn new(wall_start: NaiveDateTime) -> Self {
        Self {
            start: Instant::now(),
            wall_start,
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                sleeps: 0,
                hook: None,
            }),
        }
    }

    /// Install a hook called after each sleep. Replaces any previous hook.
    ///
    /// The hook must not call back into this clock.
    pub fn on_sleep(&self, hook: impl FnMut(Duration) + Send + 'static) {
        self.lock().hook = Some(Box::new(hook));
    }

    /// Advance virtual time without counting a sleep.
    pub fn advance(&self, duration: Duration) {
        self.lock().elapsed += duration;
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of sleeps performed so far.
    #[must_use]
    pub fn sleep_count(&self) -> usize {
        self.lock().sleeps
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualClock")
            .field("wall_start", &self.wall_start)
            .field("elapsed", &state.elapsed)
            .field("sleeps", &state.sleeps)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.lock().elapsed
    }

    fn local_now(&self) -> NaiveDateTime {
        let elapsed = self.lock().elapsed;
        let offset = chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());
        self.wall_start + offset
    }

    async fn sleep(&self, duration: Duration) {
        let (elapsed, hook) = {
            let mut state = self.lock();
            state.elapsed += duration;
            state.sleeps += 1;
            (state.elapsed, state.hook.take())
        };

        // Run outside the lock, then put the hook back unless it was replaced.
        if let Some(mut hook) = hook {
            hook(elapsed);
            let mut state = self.lock();
            if state.hook.is_none() {
                state.hook = Some(hook);
            }
        }

        tokio::task::yield_now().await;
    }
}
