//! Injectable wall-clock source.
//!
//! Hold expiration is entirely time-driven, so every component that reads
//! the clock takes it through this trait. Production uses `SystemClock`;
//! tests pin `now` with `ManualClock`.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod manual {
    use super::*;
    use std::sync::Mutex;

    /// Clock whose `now` only moves when a test tells it to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_manual_clock_advance() {
            let start = Utc::now();
            let clock = ManualClock::at(start);
            clock.advance(chrono::Duration::seconds(90));
            assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
        }
    }
}
