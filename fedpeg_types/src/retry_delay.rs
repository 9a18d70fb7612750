use std::time::Duration;

use rand::Rng;

/// Backoff between failed attempts: doubles up to `max`,
/// every returned delay is randomly stretched or shrunk by up to `jitter`
#[derive(Clone, Debug)]
pub struct RetryDelay {
    first: Duration,
    next: Duration,
    max: Duration,
    jitter: f64,
}

impl RetryDelay {
    pub fn new(first: Duration, max: Duration) -> Self {
        let first = first.min(max);
        RetryDelay {
            first,
            next: first,
            max,
            jitter: 0.0,
        }
    }

    /// `jitter` is a fraction of the delay, clamped to `0.0..=0.9`
    pub fn with_jitter(self, jitter: f64) -> Self {
        RetryDelay {
            jitter: jitter.clamp(0.0, 0.9),
            ..self
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        if self.jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        delay.mul_f64(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.next = self.first;
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::new(Duration::from_secs(5), Duration::from_secs(300)).with_jitter(0.3)
    }
}
