//! Artificial write latency.
//!
//! A [`WriteLag`] runs before every transport write. The default does
//! nothing; the others simulate a congested link when exercising a client
//! against a local server.

use std::time::Duration;

use rand::Rng;

/// Hook called before each transport write.
pub trait WriteLag {
    fn before_write(&mut self);
}

/// No delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLag;

impl WriteLag for NoLag {
    fn before_write(&mut self) {}
}

/// Sleep a fixed duration before each write.
#[derive(Debug, Clone, Copy)]
pub struct FixedLag(pub Duration);

impl WriteLag for FixedLag {
    fn before_write(&mut self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// Sleep a uniformly random duration below `max` before each write.
#[derive(Debug, Clone, Copy)]
pub struct RandomLag {
    max: Duration,
}

impl RandomLag {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Pick the next delay without sleeping.
    pub fn sample(&self) -> Duration {
        let max_micros = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        if max_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..max_micros))
    }
}

impl WriteLag for RandomLag {
    fn before_write(&mut self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::trace!(?delay, "injected write lag");
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn random_lag_stays_below_max() {
        let lag = RandomLag::new(Duration::from_millis(5));
        for _ in 0..100 {
            assert!(lag.sample() < Duration::from_millis(5));
        }
    }

    #[test]
    fn zero_random_lag_never_sleeps() {
        let lag = RandomLag::new(Duration::ZERO);
        assert_eq!(lag.sample(), Duration::ZERO);
    }

    #[test]
    fn fixed_lag_sleeps() {
        let mut lag = FixedLag(Duration::from_millis(2));
        let start = Instant::now();
        lag.before_write();
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
