//! Per-second ingest rate limiting

use std::time::{Duration, Instant};

/// Fixed-window events-per-second limiter
///
/// Datagrams beyond the budget are dropped by the caller without error.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_second: u32,
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        RateLimiter {
            max_per_second,
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Whether one more event fits into the current one-second window
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        if self.count < self.max_per_second {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Bounded event buffer that discards the oldest entry on overflow
#[derive(Debug)]
pub struct EventBuffer<T> {
    capacity: usize,
    items: std::collections::VecDeque<T>,
    overflows: u64,
}

impl<T> EventBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        EventBuffer {
            capacity,
            items: std::collections::VecDeque::with_capacity(capacity.min(1024)),
            overflows: 0,
        }
    }

    /// Push an event, dropping the oldest when full. Returns true on overflow.
    pub fn push(&mut self, item: T) -> bool {
        let overflowed = self.items.len() >= self.capacity;
        if overflowed {
            self.items.pop_front();
            self.overflows += 1;
        }
        self.items.push_back(item);
        overflowed
    }

    /// Drain up to `n` events in arrival order
    pub fn drain(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn buffer_drops_oldest_on_overflow() {
        let mut buffer = EventBuffer::new(3);
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.overflows(), 2);
        assert_eq!(buffer.drain(10), vec![2, 3, 4]);
    }

    #[test]
    fn limiter_resets_on_new_window() {
        let mut limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        assert!(limiter.allow_at(t0));
        assert!(limiter.allow_at(t0));
        assert!(!limiter.allow_at(t0));
        let t1 = t0 + Duration::from_millis(1100);
        assert!(limiter.allow_at(t1));
    }

    proptest! {
        /// More than `max` events inside one second accept exactly `max`
        #[test]
        fn limiter_accepts_exactly_max(max in 1u32..200, extra in 0u32..200) {
            let mut limiter = RateLimiter::new(max);
            let t0 = Instant::now();
            let mut accepted = 0u32;
            for _ in 0..(max + extra) {
                if limiter.allow_at(t0) {
                    accepted += 1;
                }
            }
            prop_assert_eq!(accepted, max);
        }

        /// The buffer never exceeds its capacity and keeps the newest items
        #[test]
        fn buffer_bounded(capacity in 1usize..64, pushes in 0usize..256) {
            let mut buffer = EventBuffer::new(capacity);
            for i in 0..pushes {
                buffer.push(i);
            }
            prop_assert!(buffer.len() <= capacity);
            let drained = buffer.drain(capacity);
            if pushes > 0 {
                prop_assert_eq!(*drained.last().unwrap(), pushes - 1);
            }
        }
    }
}
