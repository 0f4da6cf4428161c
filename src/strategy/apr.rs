//! Harvest history and trailing APR.

use std::collections::VecDeque;

use crate::error::{Result, VaultError};
use crate::model::amount::SECONDS_PER_YEAR;

/// How many harvest samples the ring buffer keeps.
pub const HARVEST_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSample {
    pub timestamp: u64,
    /// Net profit reported at this harvest.
    pub profit: u128,
    /// Strategy balance immediately before the harvest.
    pub balance_before: u128,
    /// Seconds since the previous harvest (0 for the first ever).
    pub elapsed_secs: u64,
}

#[derive(Debug, Default)]
pub struct HarvestLog {
    samples: VecDeque<HarvestSample>,
}

impl HarvestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: HarvestSample) {
        if self.samples.len() == HARVEST_LOG_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&HarvestSample> {
        self.samples.back()
    }

    /// Annualized return of a single sample, as a fraction (0.05 = 5%).
    fn sample_apr(sample: &HarvestSample) -> f64 {
        if sample.balance_before == 0 || sample.elapsed_secs == 0 {
            return 0.0;
        }
        let period_return = sample.profit as f64 / sample.balance_before as f64;
        period_return * (SECONDS_PER_YEAR as f64 / sample.elapsed_secs as f64)
    }

    /// Arithmetic mean of the annualized returns of the last `n`
    /// harvests. Fails when the log holds fewer than `n` samples.
    pub fn average_apr(&self, n: usize) -> Result<f64> {
        if n == 0 || self.samples.len() < n {
            return Err(VaultError::InsufficientHistory {
                have: self.samples.len(),
                requested: n,
            });
        }
        let sum: f64 = self
            .samples
            .iter()
            .rev()
            .take(n)
            .map(Self::sample_apr)
            .sum();
        Ok(sum / n as f64)
    }
}
