use std::{fmt, time};

use crate::v4l2::videodev::timeval;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// Capture timestamp consisting of a seconds and a microseconds component,
/// as filled in by the driver on dequeue.
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    /// Returns a timestamp representation
    ///
    /// # Arguments
    ///
    /// * `sec` - Seconds
    /// * `usec` - Microseconds
    pub fn new(sec: i64, usec: i64) -> Self {
        Timestamp { sec, usec }
    }

    /// The whole timestamp expressed in microseconds.
    ///
    /// Used to order frames dequeued within a single capture call; frames
    /// sharing the same microsecond compare equal.
    pub fn as_micros(&self) -> i64 {
        self.sec * 1_000_000 + self.usec
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let floating: f64 = self.sec as f64 + self.usec as f64 / 1_000_000.0;
        write!(f, "{} [s]", floating)
    }
}

impl From<timeval> for Timestamp {
    fn from(tv: timeval) -> Self {
        Timestamp {
            sec: tv.tv_sec as i64,
            usec: tv.tv_usec as i64,
        }
    }
}

impl From<Timestamp> for time::Duration {
    fn from(ts: Timestamp) -> Self {
        time::Duration::new(ts.sec as u64, (ts.usec * 1000) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_order_across_seconds() {
        let early = Timestamp::new(1, 999_999);
        let late = Timestamp::new(2, 1);
        assert!(late.as_micros() > early.as_micros());
        assert!(late > early);
    }
}
