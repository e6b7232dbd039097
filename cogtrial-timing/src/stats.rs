use std::collections::VecDeque;
use std::time::Duration;

/// Rolling record of how late timers fired relative to their deadline.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_ns: f64,
    pub jitter_ns: f64,
    pub min_ns: f64,
    pub max_ns: f64,
}

impl LatencyStats {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, lateness: Duration) {
        if self.max_samples == 0 {
            return;
        }
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(lateness);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> LatencySummary {
        let times: Vec<f64> = self
            .samples
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return LatencySummary {
                samples: 0,
                mean_ns: 0.0,
                jitter_ns: 0.0,
                min_ns: 0.0,
                max_ns: 0.0,
            };
        }
        let n = times.len() as f64;
        let mean = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        LatencySummary {
            samples: times.len(),
            mean_ns: mean,
            jitter_ns: var.sqrt(),
            min_ns: min,
            max_ns: max,
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new(1000)
    }
}
