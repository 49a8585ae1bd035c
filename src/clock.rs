use std::time::Instant;

/// A source of the current time, in seconds.
///
/// The player itself only ever receives time values, so a clock is just a convenience for hosts
/// that drive the player with real time.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Seconds elapsed since the clock was created.
#[derive(Copy, Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}
impl SystemClock {
    #[inline]
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}
impl Default for SystemClock {
    #[inline]
    fn default() -> SystemClock {
        SystemClock::new()
    }
}
impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
impl<F: Fn() -> f64> Clock for F {
    #[inline]
    fn now(&self) -> f64 {
        self()
    }
}
