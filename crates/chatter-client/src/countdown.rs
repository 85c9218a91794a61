//! Client-side countdown driven by a server-supplied retry delay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const MIN_TICK: Duration = Duration::from_millis(1);

/// What the send control should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Limited { seconds_remaining: u64 },
}

impl CountdownState {
    pub fn is_limited(&self) -> bool {
        matches!(self, CountdownState::Limited { .. })
    }
}

/// A cancelable once-per-tick countdown.
///
/// At most one ticker task is live. Every exit path retires it: expiry,
/// [`Countdown::clear`], a restart through [`Countdown::start`], and drop.
/// Each ticker also carries a generation number and only publishes while it is
/// still current, so a ticker that is mid-tick when replaced cannot write a
/// stale value.
pub struct Countdown {
    state: Arc<watch::Sender<CountdownState>>,
    generation: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
    tick: Duration,
}

impl Countdown {
    pub fn new() -> Self {
        Self::with_tick(Duration::from_secs(1))
    }

    /// Count in steps of `tick`, which is raised to at least one millisecond.
    pub fn with_tick(tick: Duration) -> Self {
        let (state, _) = watch::channel(CountdownState::Idle);
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            ticker: None,
            tick: tick.max(MIN_TICK),
        }
    }

    pub fn state(&self) -> CountdownState {
        *self.state.borrow()
    }

    pub fn is_limited(&self) -> bool {
        self.state().is_limited()
    }

    /// Watch state changes, e.g. to re-render a send button.
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state.subscribe()
    }

    /// Restart from `ceil(retry_after)` ticks, replacing any running countdown.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, retry_after: Duration) {
        self.cancel();

        let ticks = retry_after.as_secs_f64() / self.tick.as_secs_f64();
        let remaining = ticks.ceil() as u64;
        if remaining == 0 {
            self.state.send_replace(CountdownState::Idle);
            return;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        self.state.send_replace(CountdownState::Limited {
            seconds_remaining: remaining,
        });

        let state = self.state.clone();
        let current = self.generation.clone();
        let tick = self.tick;

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick, tick);
            let mut remaining = remaining;

            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;

                let next = if remaining == 0 {
                    CountdownState::Idle
                } else {
                    CountdownState::Limited {
                        seconds_remaining: remaining,
                    }
                };
                let published = state.send_if_modified(|s| {
                    if current.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    *s = next;
                    true
                });
                if !published {
                    break;
                }
            }

            tracing::trace!("Countdown finished");
        }));
    }

    /// Stop counting and go back to idle, e.g. after an admitted send.
    pub fn clear(&mut self) {
        self.cancel();
        self.state.send_replace(CountdownState::Idle);
    }

    fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// "N seconds" under a minute, "Xm Ys" above.
pub fn format_retry_time(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{} seconds", seconds);
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}
