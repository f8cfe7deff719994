// src/sync.rs

//! Counting barrier used for predecessor tracking and the caller barrier.
//!
//! A [`CountDownLatch`] starts at a fixed count and releases every waiter
//! once the count reaches zero. Extra `count_down` calls after zero are
//! ignored, so a latch can never be "re-armed".

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub struct CountDownLatch {
    remaining: Mutex<usize>,
    cv: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            cv: Condvar::new(),
        }
    }

    /// Current count. A snapshot; may be stale by the time it is used.
    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }

    /// Decrement the count, waking all waiters when it reaches zero.
    ///
    /// Returns the count after the decrement.
    pub fn count_down(&self) -> usize {
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.cv.notify_all();
            }
        }
        *remaining
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the latch opened, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.cv.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn zero_latch_is_open() {
        let latch = CountDownLatch::new(0);
        assert!(latch.wait_timeout(Duration::from_millis(1)));
        assert_eq!(latch.count_down(), 0);
    }

    #[test]
    fn wait_times_out_while_count_outstanding() {
        let latch = CountDownLatch::new(2);
        latch.count_down();
        assert!(!latch.wait_timeout(Duration::from_millis(20)));
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn releases_waiters_from_other_threads() {
        let latch = Arc::new(CountDownLatch::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    latch.count_down();
                })
            })
            .collect();

        assert!(latch.wait_timeout(Duration::from_secs(5)));
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(latch.count(), 0);
    }
}
