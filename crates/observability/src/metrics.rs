use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Process-wide count of handled requests.
///
/// One atomic integer; clones share the same count. Create it once where the
/// services are wired and hand it to each of them.
#[derive(Debug, Clone, Default)]
pub struct RequestCounter {
    count: Arc<AtomicU64>,
}

/// Point-in-time view of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestCounterSnapshot {
    pub total: u64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request; returns the new total.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RequestCounterSnapshot {
        RequestCounterSnapshot {
            total: self.current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_the_count() {
        let counter = RequestCounter::new();
        let other = counter.clone();
        assert_eq!(counter.increment(), 1);
        assert_eq!(other.increment(), 2);
        assert_eq!(counter.current(), 2);
        assert_eq!(counter.snapshot(), RequestCounterSnapshot { total: 2 });
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counter = RequestCounter::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        c.increment();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.current(), 8000);
    }
}
