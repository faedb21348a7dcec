//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: testing if the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() after the reset timeout
//! Half-Open → Closed: consecutive_successes >= success_threshold
//! Half-Open → Open: any trial failure, retry timer restarts
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global); threshold derived from tier
//! - Fail fast in Open state: allow() is false with no side effects
//! - Transitions use consecutive counts, not failure rate, to bound
//!   worst-case detection latency; the rate is reporting-only
//! - Every transition fans out to registered observers

pub mod events;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// Runtime clock, so paused-clock tests drive the retry timer.
use tokio::time::Instant;

pub use events::{LoggingObserver, TransitionCause, TransitionEvent, TransitionObserver};
pub use state::{BreakerSnapshot, CircuitState};

/// Tunables for one breaker instance.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it.
    pub success_threshold: u32,
    /// How long an open circuit waits before allowing a probe call.
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Mutable breaker state, single-writer behind the mutex.
///
/// Invariant: `state == Open` ⇔ `next_eligible_retry.is_some()`.
struct Core {
    state: CircuitState,
    total_calls: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    consecutive_successes: u32,
    consecutive_failures: u32,
    next_eligible_retry: Option<Instant>,
    last_transition: Instant,
}

/// Circuit breaker guarding one dependency.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    core: Mutex<Core>,
    fallback_active: AtomicBool,
    observers: RwLock<Vec<Arc<dyn TransitionObserver>>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            core: Mutex::new(Core {
                state: CircuitState::Closed,
                total_calls: 0,
                successes: 0,
                failures: 0,
                timeouts: 0,
                consecutive_successes: 0,
                consecutive_failures: 0,
                next_eligible_retry: None,
                last_transition: Instant::now(),
            }),
            fallback_active: AtomicBool::new(false),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a transition observer. Observers are invoked synchronously
    /// after the state lock has been released.
    pub fn subscribe(&self, observer: Arc<dyn TransitionObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Decide whether a call may proceed.
    ///
    /// An open circuit past its reset timeout transitions to half-open
    /// here; before that, this returns false without side effects.
    pub fn allow(&self) -> bool {
        let event = {
            let mut core = self.lock_core();
            match core.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    let due = core
                        .next_eligible_retry
                        .map(|at| Instant::now() >= at)
                        .unwrap_or(false);
                    if !due {
                        return false;
                    }
                    self.transition(&mut core, CircuitState::HalfOpen, TransitionCause::RetryEligible)
                }
            }
        };
        self.notify(event);
        true
    }

    /// Record a successful call attempt.
    pub fn record_success(&self) {
        let event = {
            let mut core = self.lock_core();
            core.total_calls += 1;
            core.successes += 1;
            core.consecutive_failures = 0;
            core.consecutive_successes = core.consecutive_successes.saturating_add(1);

            if core.state == CircuitState::HalfOpen
                && core.consecutive_successes >= self.settings.success_threshold
            {
                Some(self.transition(&mut core, CircuitState::Closed, TransitionCause::SuccessThreshold))
            } else {
                None
            }
        };
        // A direct success ends any fallback episode.
        self.fallback_active.store(false, Ordering::Relaxed);
        if let Some(event) = event {
            self.notify(event);
        }
    }

    /// Record a failed call attempt.
    pub fn record_failure(&self, timed_out: bool) {
        let event = {
            let mut core = self.lock_core();
            core.total_calls += 1;
            core.failures += 1;
            if timed_out {
                core.timeouts += 1;
            }
            core.consecutive_successes = 0;
            core.consecutive_failures = core.consecutive_failures.saturating_add(1);

            match core.state {
                CircuitState::Closed
                    if core.consecutive_failures >= self.settings.failure_threshold =>
                {
                    Some(self.open(&mut core, TransitionCause::FailureThreshold))
                }
                CircuitState::HalfOpen => Some(self.open(&mut core, TransitionCause::TrialFailed)),
                _ => None,
            }
        };
        if let Some(event) = event {
            self.notify(event);
        }
    }

    /// Administrative: open the circuit immediately.
    pub fn force_open(&self) {
        let event = {
            let mut core = self.lock_core();
            if core.state == CircuitState::Open {
                None
            } else {
                Some(self.open(&mut core, TransitionCause::Forced))
            }
        };
        if let Some(event) = event {
            self.notify(event);
        }
    }

    /// Administrative: close the circuit immediately.
    pub fn force_close(&self) {
        let event = {
            let mut core = self.lock_core();
            if core.state == CircuitState::Closed {
                None
            } else {
                core.consecutive_failures = 0;
                core.consecutive_successes = 0;
                Some(self.transition(&mut core, CircuitState::Closed, TransitionCause::Forced))
            }
        };
        if let Some(event) = event {
            self.notify(event);
        }
    }

    /// Open the circuit because a readiness probe confirmed the
    /// dependency down. Idempotent like `force_open`, distinct cause.
    pub fn probe_open(&self) {
        let event = {
            let mut core = self.lock_core();
            if core.state == CircuitState::Open {
                None
            } else {
                Some(self.open(&mut core, TransitionCause::Probe))
            }
        };
        if let Some(event) = event {
            self.notify(event);
        }
    }

    /// Pull the retry time forward so the next `allow()` probes at once.
    ///
    /// Called when a readiness probe confirms the dependency recovered;
    /// the Open → Half-Open transition itself still happens in `allow()`
    /// to keep the state machine single-writer.
    pub fn shorten_retry(&self) {
        let mut core = self.lock_core();
        if core.state == CircuitState::Open {
            core.next_eligible_retry = Some(Instant::now());
            tracing::debug!(dependency = %self.name, "Breaker retry window shortened by probe");
        }
    }

    /// Halve the cumulative call counters.
    ///
    /// Run periodically so the reported failure rate tracks recent
    /// traffic rather than everything since startup. Consecutive
    /// counters are untouched; they drive transitions.
    pub fn decay_stats(&self) {
        let mut core = self.lock_core();
        core.total_calls /= 2;
        core.successes /= 2;
        core.failures /= 2;
        core.timeouts /= 2;
    }

    /// Mark or clear the fallback-in-use flag.
    pub fn set_fallback_active(&self, active: bool) {
        self.fallback_active.store(active, Ordering::Relaxed);
    }

    pub fn fallback_active(&self) -> bool {
        self.fallback_active.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> CircuitState {
        self.lock_core().state
    }

    /// Point-in-time stats for events and the admin API.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.lock_core();
        self.snapshot_locked(&core)
    }

    fn snapshot_locked(&self, core: &Core) -> BreakerSnapshot {
        let failure_rate = if core.total_calls == 0 {
            0.0
        } else {
            core.failures as f64 / core.total_calls as f64
        };
        BreakerSnapshot {
            dependency: self.name.clone(),
            state: core.state,
            total_calls: core.total_calls,
            successes: core.successes,
            failures: core.failures,
            timeouts: core.timeouts,
            consecutive_successes: core.consecutive_successes,
            consecutive_failures: core.consecutive_failures,
            failure_rate,
            fallback_active: self.fallback_active.load(Ordering::Relaxed),
            retry_eligible_in_ms: core
                .next_eligible_retry
                .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64),
        }
    }

    fn open(&self, core: &mut Core, cause: TransitionCause) -> TransitionEvent {
        core.next_eligible_retry = Some(Instant::now() + self.settings.reset_timeout);
        let from = core.state;
        core.state = CircuitState::Open;
        core.last_transition = Instant::now();
        TransitionEvent {
            dependency: self.name.clone(),
            from,
            to: CircuitState::Open,
            cause,
            stats: self.snapshot_locked(core),
        }
    }

    fn transition(
        &self,
        core: &mut Core,
        to: CircuitState,
        cause: TransitionCause,
    ) -> TransitionEvent {
        debug_assert_ne!(to, CircuitState::Open, "open transitions go through open()");
        core.next_eligible_retry = None;
        if to == CircuitState::HalfOpen {
            core.consecutive_successes = 0;
        }
        let from = core.state;
        core.state = to;
        core.last_transition = Instant::now();
        TransitionEvent {
            dependency: self.name.clone(),
            from,
            to,
            cause,
            stats: self.snapshot_locked(core),
        }
    }

    fn notify(&self, event: TransitionEvent) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        for observer in observers.iter() {
            observer.on_transition(&event);
        }
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }
}
