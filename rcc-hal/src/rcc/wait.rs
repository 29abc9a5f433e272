//! Bounded polling of hardware status flags.

use super::error::{ClockFault, HardwareTimeout};

/// Budget for a single hardware wait.
///
/// [`start`](Self::start) is called once at the beginning of every wait, so one
/// value can be reused across the many waits of a profile application; each
/// wait gets the full budget.
pub trait Timeout {
    fn start(&mut self);

    fn expired(&mut self) -> bool;
}

impl<T: Timeout + ?Sized> Timeout for &mut T {
    fn start(&mut self) {
        (**self).start()
    }

    fn expired(&mut self) -> bool {
        (**self).expired()
    }
}

/// Waits forever. Matches the behaviour of the classic bring-up code that
/// spins on a ready flag with no bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTimeout;

impl Timeout for NoTimeout {
    fn start(&mut self) {}

    fn expired(&mut self) -> bool {
        false
    }
}

/// Gives up after a fixed number of status polls.
#[derive(Clone, Copy, Debug)]
pub struct PollLimit {
    limit: u32,
    remaining: u32,
}

impl PollLimit {
    pub const fn new(limit: u32) -> Self {
        Self { limit, remaining: limit }
    }
}

impl Timeout for PollLimit {
    fn start(&mut self) {
        self.remaining = self.limit;
    }

    fn expired(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}

/// Wall-clock budget measured with `embassy-time`.
#[cfg(feature = "time")]
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    timeout: embassy_time::Duration,
    start: embassy_time::Instant,
}

#[cfg(feature = "time")]
impl Deadline {
    pub fn new(timeout: embassy_time::Duration) -> Self {
        Self {
            timeout,
            start: embassy_time::Instant::now(),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(embassy_time::Duration::from_millis(ms))
    }
}

#[cfg(feature = "time")]
impl Timeout for Deadline {
    fn start(&mut self) {
        self.start = embassy_time::Instant::now();
    }

    fn expired(&mut self) -> bool {
        self.start.elapsed() > self.timeout
    }
}

/// Polls `done` until it returns `true` or the budget runs out.
pub(crate) fn poll_until<T, C>(timeout: &mut T, mut done: C, on_expiry: HardwareTimeout) -> Result<(), ClockFault>
where
    T: Timeout + ?Sized,
    C: FnMut() -> bool,
{
    timeout.start();
    loop {
        if done() {
            return Ok(());
        }
        if timeout.expired() {
            warn!("rcc: {}", on_expiry);
            return Err(ClockFault::Timeout(on_expiry));
        }
    }
}
