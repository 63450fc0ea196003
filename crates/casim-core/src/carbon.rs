//! Fixed-step grid carbon intensity series.
//!
//! A [`CarbonSeries`] holds the average carbon intensity (kgCO₂eq/kWh) per
//! base slot. Native traces carry one sample per hour; the simulator runs on
//! a finer tick, so [`CarbonSeries::repeat`] replicates each hourly sample
//! while preserving the hourly integral. Windowing returns an independent
//! view re-indexed from 0 that shares the underlying storage.

use std::sync::Arc;

/// Immutable carbon intensity series with cheap windowed views.
#[derive(Debug, Clone)]
pub struct CarbonSeries {
    name: String,
    start_index: usize,
    samples: Arc<[f64]>,
    offset: usize,
    len: usize,
}

impl CarbonSeries {
    pub fn new(name: impl Into<String>, start_index: usize, values: Vec<f64>) -> Self {
        let len = values.len();
        CarbonSeries {
            name: name.into(),
            start_index,
            samples: values.into(),
            offset: 0,
            len,
        }
    }

    /// Trace name, used for labeling result files.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row offset into the source trace this series was cut from.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample at slot `i`. Panics if `i` is out of bounds.
    pub fn at(&self, i: usize) -> f64 {
        self.as_slice()[i]
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.as_slice().get(i).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples[self.offset..self.offset + self.len]
    }

    /// Window `[a, b)` re-indexed from 0. The end is clamped to the available
    /// data; callers that need the full span check `len()` afterwards.
    pub fn window(&self, a: usize, b: usize) -> CarbonSeries {
        let a = a.min(self.len);
        let b = b.clamp(a, self.len);
        CarbonSeries {
            name: self.name.clone(),
            start_index: self.start_index,
            samples: Arc::clone(&self.samples),
            offset: self.offset + a,
            len: b - a,
        }
    }

    /// Upsample by an integer factor: each slot is replicated `factor` times
    /// and divided by `factor`, so the integral over the original slot is
    /// unchanged.
    pub fn repeat(&self, factor: usize) -> CarbonSeries {
        assert!(factor > 0, "repeat factor must be positive");
        let mut values = Vec::with_capacity(self.len * factor);
        for &v in self.as_slice() {
            let scaled = v / factor as f64;
            values.extend(std::iter::repeat(scaled).take(factor));
        }
        CarbonSeries {
            name: self.name.clone(),
            start_index: self.start_index,
            samples: values.into(),
            offset: 0,
            len: self.len * factor,
        }
    }

    /// Subsample at a fixed stride, keeping the first slot of each stride.
    pub fn stride(&self, step: usize) -> CarbonSeries {
        assert!(step > 0, "stride must be positive");
        let values: Vec<f64> = self.as_slice().iter().copied().step_by(step).collect();
        let len = values.len();
        CarbonSeries {
            name: self.name.clone(),
            start_index: self.start_index,
            samples: values.into(),
            offset: 0,
            len,
        }
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return f64::NAN;
        }
        self.as_slice().iter().sum::<f64>() / self.len as f64
    }

    /// Sample standard deviation (ddof = 1).
    pub fn std(&self) -> f64 {
        if self.len < 2 {
            return f64::NAN;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.as_slice().iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (self.len - 1) as f64).sqrt()
    }

    /// Quantile with linear interpolation between order statistics.
    pub fn quantile(&self, q: f64) -> f64 {
        if self.len == 0 {
            return f64::NAN;
        }
        let mut sorted: Vec<f64> = self.as_slice().to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("carbon values are comparable"));
        let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        if lo == hi {
            sorted[lo]
        } else {
            let frac = pos - lo as f64;
            sorted[lo] * (1.0 - frac) + sorted[hi] * frac
        }
    }
}
