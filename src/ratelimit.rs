use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::Identifier;
use crate::error::HomopairError;
use crate::fetch::SequenceFetcher;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    next_ticket: u64,
    now_serving: u64,
    last_start: Option<Instant>,
}

pub struct RateLimiter<C: Clock = SystemClock> {
    window: Duration,
    clock: C,
    state: Mutex<LimiterState>,
    turn: Condvar,
}

impl RateLimiter<SystemClock> {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(window: Duration, clock: C) -> Self {
        Self {
            window,
            clock,
            state: Mutex::new(LimiterState::default()),
            turn: Condvar::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn in_flight(&self) -> usize {
        let state = self.lock();
        (state.next_ticket - state.now_serving) as usize
    }

    pub fn run<T>(&self, call: impl FnOnce() -> T) -> T {
        let ticket = {
            let mut state = self.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            ticket
        };

        let last_start = {
            let mut state = self.lock();
            while state.now_serving != ticket {
                state = self
                    .turn
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            state.last_start
        };
        let _turn = Turn { limiter: self };

        if let Some(last) = last_start {
            let ready_at = last + self.window;
            let now = self.clock.now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!(ticket, wait_ms = wait.as_millis() as u64, "rate limit wait");
                self.clock.sleep(wait);
            }
        }

        self.lock().last_start = Some(self.clock.now());
        call()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Turn<'a, C: Clock> {
    limiter: &'a RateLimiter<C>,
}

impl<C: Clock> Drop for Turn<'_, C> {
    fn drop(&mut self) {
        self.limiter.lock().now_serving += 1;
        self.limiter.turn.notify_all();
    }
}

pub struct RateLimited<F, C: Clock = SystemClock> {
    inner: F,
    limiter: Arc<RateLimiter<C>>,
}

impl<F: SequenceFetcher> RateLimited<F, SystemClock> {
    pub fn new(inner: F, window: Duration) -> Self {
        Self::with_limiter(inner, Arc::new(RateLimiter::new(window)))
    }
}

impl<F: SequenceFetcher, C: Clock> RateLimited<F, C> {
    pub fn with_limiter(inner: F, limiter: Arc<RateLimiter<C>>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }
}

impl<F: SequenceFetcher, C: Clock> SequenceFetcher for RateLimited<F, C> {
    fn source(&self) -> &'static str {
        self.inner.source()
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        self.limiter.run(|| self.inner.fetch(id))
    }
}
