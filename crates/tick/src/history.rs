use parking_lot::RwLock;
use std::collections::VecDeque;

/// Number of ticks-per-second samples kept.
pub const TPS_HISTORY_CAPACITY: usize = 640;

/// Rolling window of the most recent TPS samples, oldest first.
///
/// The simulation thread appends; any number of monitor threads may read
/// concurrently.
#[derive(Debug)]
pub struct TpsHistory {
    capacity: usize,
    samples: RwLock<VecDeque<u32>>,
}

impl Default for TpsHistory {
    fn default() -> Self {
        Self::with_capacity(TPS_HISTORY_CAPACITY)
    }
}

impl TpsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            samples: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a sample, evicting the oldest ones beyond capacity.
    pub fn push(&self, tps: u32) {
        let mut samples = self.samples.write();
        samples.push_back(tps);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<u32> {
        self.samples.read().back().copied()
    }

    /// Copy of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<u32> {
        self.samples.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let history = TpsHistory::new();
        for i in 0..1000u32 {
            history.push(i);
        }
        assert_eq!(history.len(), TPS_HISTORY_CAPACITY);
        let samples = history.snapshot();
        assert_eq!(samples.first(), Some(&360));
        assert_eq!(samples.last(), Some(&999));
        assert_eq!(history.latest(), Some(999));
    }

    #[test]
    fn small_window() {
        let history = TpsHistory::with_capacity(3);
        assert!(history.is_empty());
        for tps in [40, 39, 41, 38] {
            history.push(tps);
        }
        assert_eq!(history.snapshot(), vec![39, 41, 38]);
    }

    #[test]
    fn readable_while_appending() {
        let history = Arc::new(TpsHistory::new());
        let writer = {
            let history = history.clone();
            std::thread::spawn(move || {
                for i in 0..5000 {
                    history.push(i);
                }
            })
        };
        for _ in 0..100 {
            assert!(history.snapshot().len() <= TPS_HISTORY_CAPACITY);
        }
        writer.join().unwrap();
        assert_eq!(history.len(), TPS_HISTORY_CAPACITY);
    }
}
