use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

/// Window used when none is configured.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Source of elapsed time for a [`RateGate`].
///
/// The gate only needs a monotonic offset from some fixed origin.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn elapsed(&self) -> Duration;
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Clones share the same time source.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use payload_capture::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.elapsed(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

/// Admission control for capture attempts.
///
/// `RateGate` admits at most `budget` attempts per fixed window. The first
/// attempt that lands in a new window starts a fresh count. Once the budget
/// is spent every further attempt in that window is rejected; nothing ever
/// blocks or fails.
///
/// The window epoch and the admitted count share a single `AtomicU64`
/// (epoch in the high 32 bits, count in the low 32 bits) updated with
/// compare-and-swap, so concurrent callers can neither lose an update nor be
/// admitted past the budget.
///
/// A gate is meant to be constructed once and shared by handle (`Arc`) with
/// every factory that should draw from the same budget.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use payload_capture::{ManualClock, RateGate};
///
/// let clock = ManualClock::new();
/// let gate = RateGate::with_clock(2, Duration::from_secs(1), clock.clone());
///
/// assert!(gate.admit());
/// assert!(gate.admit());
/// assert!(!gate.admit()); // budget spent for this window
///
/// clock.advance(Duration::from_secs(1));
/// assert!(gate.admit()); // new window, new budget
/// ```
pub struct RateGate {
    budget: u32,
    window: Duration,
    clock: Box<dyn Clock>,
    // (epoch << 32) | admitted
    state: AtomicU64,
}

impl RateGate {
    /// Creates a gate admitting `budget` attempts per [`DEFAULT_WINDOW`].
    pub fn new(budget: u32) -> Self {
        Self::with_window(budget, DEFAULT_WINDOW)
    }

    /// Creates a gate admitting `budget` attempts per `window`.
    ///
    /// A zero `window` is treated as one nanosecond.
    pub fn with_window(budget: u32, window: Duration) -> Self {
        Self::with_clock(budget, window, SystemClock::new())
    }

    /// Creates a gate driven by the given clock.
    pub fn with_clock(budget: u32, window: Duration, clock: impl Clock + 'static) -> Self {
        let window = window.max(Duration::from_nanos(1));
        let epoch = epoch_of(clock.elapsed(), window);
        Self {
            budget,
            window,
            clock: Box::new(clock),
            state: AtomicU64::new(pack(epoch, 0)),
        }
    }

    /// Decides whether one capture attempt may proceed.
    ///
    /// Never blocks. Returns `false` once the window's budget is spent.
    pub fn admit(&self) -> bool {
        if self.budget == 0 {
            return false;
        }

        let epoch = epoch_of(self.clock.elapsed(), self.window);
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (seen_epoch, admitted) = unpack(current);
            // A caller that read the clock before another one moved the
            // state forward counts against the stored window.
            let next = if is_newer(epoch, seen_epoch) {
                pack(epoch, 1)
            } else if admitted < self.budget {
                pack(seen_epoch, admitted + 1)
            } else {
                trace!(budget = self.budget, "rate gate: budget exhausted");
                return false;
            };

            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the number of admissions allowed per window.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Returns the window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl fmt::Debug for RateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateGate")
            .field("budget", &self.budget)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

// Epochs only need to differ between neighbouring windows, so truncating to
// 32 bits is fine.
fn epoch_of(elapsed: Duration, window: Duration) -> u32 {
    (elapsed.as_nanos() / window.as_nanos()) as u32
}

// Epochs wrap, so compare by signed distance.
fn is_newer(epoch: u32, than: u32) -> bool {
    (epoch.wrapping_sub(than) as i32) > 0
}

fn pack(epoch: u32, admitted: u32) -> u64 {
    (u64::from(epoch) << 32) | u64::from(admitted)
}

fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}
