use std::time::Duration;

/// Accumulates forward-pass durations for one session.
#[derive(Debug, Default, Clone)]
pub struct TimeCalc {
    duration: Vec<Duration>,
}

impl TimeCalc {
    pub fn push(&mut self, x: Duration) {
        self.duration.push(x);
    }

    pub fn n(&self) -> usize {
        self.duration.len()
    }

    pub fn total(&self) -> Duration {
        self.duration.iter().sum::<Duration>()
    }

    pub fn last(&self) -> Option<Duration> {
        self.duration.last().copied()
    }

    pub fn avg(&self) -> Option<Duration> {
        match self.n() {
            0 => None,
            n => Some(self.total() / n as u32),
        }
    }

    pub fn clear(&mut self) {
        self.duration.clear();
    }
}

/// Milliseconds with sub-millisecond resolution, the unit reports use.
pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
