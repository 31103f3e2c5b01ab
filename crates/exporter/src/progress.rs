use crate::metrics;
use cx_primitives::Height;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};


/// Receives the height of the latest delivered block from time to time.
pub trait ProgressObserver: Send {
    fn report(&mut self, height: Height);
}


#[derive(Clone, Debug)]
struct ProgressUnit {
    value: Height,
    time: Instant,
}


/// Sliding window over `(height, time)` samples for speed estimation.
pub struct Progress {
    window: Vec<ProgressUnit>,
    tail: usize,
    size: usize,
    granularity: Duration,
    has_news: bool,
}


impl Progress {
    pub fn new(window_size: NonZeroUsize, window_granularity: Duration) -> Self {
        assert!(!window_granularity.is_zero());
        Self {
            window: Vec::with_capacity(window_size.get() + 1),
            tail: 0,
            size: window_size.get() + 1,
            granularity: window_granularity,
            has_news: false,
        }
    }

    pub fn set_current_value(&mut self, value: Height) {
        self.set_current_value_at(value, Instant::now())
    }

    fn set_current_value_at(&mut self, value: Height, time: Instant) {
        if self.window.is_empty() {
            self.window.push(ProgressUnit { value, time });
            self.tail = 1;
            self.has_news = true;
            return;
        }

        let last = self.last();
        let value = value.max(last.value);

        if self.window.len() > 1 && time <= last.time + self.granularity {
            self.last_mut().value = value;
        } else {
            let unit = ProgressUnit { value, time };
            if self.tail < self.window.len() {
                self.window[self.tail] = unit;
            } else {
                self.window.push(unit);
            }
            self.tail = (self.tail + 1) % self.size;
        }

        self.has_news = true;
    }

    pub fn get_current_value(&self) -> Option<Height> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.last().value)
        }
    }

    pub fn has_news(&self) -> bool {
        self.has_news
    }

    pub fn speed(&mut self) -> f64 {
        self.has_news = false;

        if self.window.len() < 2 {
            return 0.0;
        }

        let beg = if self.window.len() < self.size {
            &self.window[0]
        } else {
            &self.window[self.tail]
        };

        let end = self.last();
        let duration = end.time.duration_since(beg.time).as_secs_f64();
        if duration == 0.0 {
            return 0.0;
        }
        let inc = end.value - beg.value;

        inc as f64 / duration
    }

    fn last(&self) -> &ProgressUnit {
        &self.window[(self.size + self.tail - 1) % self.size]
    }

    fn last_mut(&mut self) -> &mut ProgressUnit {
        let idx = (self.size + self.tail - 1) % self.size;
        &mut self.window[idx]
    }
}


/// Logs speed and the last delivered height and mirrors them to metrics.
pub struct ProgressLogger {
    progress: Progress
}


impl ProgressLogger {
    pub fn new() -> Self {
        let window_size = NonZeroUsize::new(10).unwrap();
        let granularity = Duration::from_secs(1);
        Self {
            progress: Progress::new(window_size, granularity)
        }
    }
}


impl Default for ProgressLogger {
    fn default() -> Self {
        Self::new()
    }
}


impl ProgressObserver for ProgressLogger {
    fn report(&mut self, height: Height) {
        self.progress.set_current_value(height);
        let speed = self.progress.speed();
        metrics::PROGRESS.set(speed);
        tracing::info!(
            "last block: {}, progress: {} blocks/sec",
            height,
            speed.round()
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_over_window() {
        let mut progress = Progress::new(NonZeroUsize::new(3).unwrap(), Duration::from_millis(100));
        let start = Instant::now();

        progress.set_current_value_at(0, start);
        assert_eq!(progress.speed(), 0.0);

        progress.set_current_value_at(100, start + Duration::from_secs(1));
        progress.set_current_value_at(300, start + Duration::from_secs(2));
        assert!(progress.has_news());
        assert_eq!(progress.speed(), 150.0);
        assert!(!progress.has_news());
        assert_eq!(progress.get_current_value(), Some(300));
    }

    #[test]
    fn old_samples_leave_the_window() {
        let mut progress = Progress::new(NonZeroUsize::new(2).unwrap(), Duration::from_millis(100));
        let start = Instant::now();

        progress.set_current_value_at(0, start);
        progress.set_current_value_at(1000, start + Duration::from_secs(1));
        progress.set_current_value_at(1010, start + Duration::from_secs(2));
        progress.set_current_value_at(1020, start + Duration::from_secs(3));

        assert_eq!(progress.speed(), 10.0);
    }

    #[test]
    fn value_never_decreases() {
        let mut progress = Progress::new(NonZeroUsize::new(2).unwrap(), Duration::from_millis(100));
        let start = Instant::now();
        progress.set_current_value_at(50, start);
        progress.set_current_value_at(10, start + Duration::from_secs(1));
        assert_eq!(progress.get_current_value(), Some(50));
    }
}
