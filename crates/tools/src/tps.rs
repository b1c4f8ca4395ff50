use serde::Serialize;
use std::fmt;

/// Aggregate over a TPS history window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TpsReport {
    pub samples: usize,
    pub latest: u32,
    pub min: u32,
    pub max: u32,
    pub mean: f64,
}

impl TpsReport {
    /// Samples are oldest first. An empty window yields an all-zero report.
    pub fn from_samples(samples: &[u32]) -> Self {
        let Some(&latest) = samples.last() else {
            return Self::default();
        };
        let sum: u64 = samples.iter().map(|&s| u64::from(s)).sum();
        Self {
            samples: samples.len(),
            latest,
            min: samples.iter().copied().min().unwrap_or(0),
            max: samples.iter().copied().max().unwrap_or(0),
            mean: sum as f64 / samples.len() as f64,
        }
    }

    /// Whether the mean fell below `target` ticks per second.
    pub fn is_behind(&self, target: u32) -> bool {
        self.samples > 0 && self.mean < f64::from(target)
    }
}

impl fmt::Display for TpsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tps latest={} min={} max={} mean={:.1} over {} samples",
            self.latest, self.min, self.max, self.mean, self.samples
        )
    }
}
