//! Rolling history: 7-day humidity mean and temperature slopes

use chrono::{DateTime, Duration, Utc};
use hi_core::EntityId;
use std::collections::{BTreeMap, VecDeque};

/// Window of the house humidity mean
pub const MEAN_WINDOW_DAYS: i64 = 7;

/// Minimum spacing between samples of the house humidity mean
pub const MEAN_SAMPLE_GAP_MINUTES: i64 = 5;

/// Window of the temperature slope fit
pub const SLOPE_WINDOW_MINUTES: i64 = 60;

/// Offset of the seed point placed before a series' first sample
pub const SLOPE_SEED_OFFSET_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    at: DateTime<Utc>,
    value: f64,
}

/// Time-bounded series of house humidity averages
#[derive(Debug, Clone, Default)]
pub struct HumidityHistory {
    samples: VecDeque<Sample>,
}

impl HumidityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample unless the last one is younger than the sample gap
    ///
    /// Returns whether the sample was kept.
    pub fn record(&mut self, value: f64, at: DateTime<Utc>) -> bool {
        if self
            .samples
            .back()
            .is_some_and(|last| at - last.at < Duration::minutes(MEAN_SAMPLE_GAP_MINUTES))
        {
            return false;
        }
        self.samples.push_back(Sample { at, value });
        let cutoff = at - Duration::days(MEAN_WINDOW_DAYS);
        while self.samples.front().is_some_and(|s| s.at < cutoff) {
            self.samples.pop_front();
        }
        true
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.value).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Least-squares temperature slope per source entity, in °C per hour
#[derive(Debug, Clone, Default)]
pub struct SlopeTracker {
    series: BTreeMap<EntityId, VecDeque<Sample>>,
}

impl SlopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample; the first sample of a series also seeds a flat baseline
    /// so the slope starts at 0.0 rather than unknown
    pub fn record(&mut self, entity_id: &EntityId, value: f64, at: DateTime<Utc>) {
        let series = self.series.entry(entity_id.clone()).or_default();
        if series.is_empty() {
            series.push_back(Sample {
                at: at - Duration::minutes(SLOPE_SEED_OFFSET_MINUTES),
                value,
            });
        }
        series.push_back(Sample { at, value });
        let cutoff = at - Duration::minutes(SLOPE_WINDOW_MINUTES);
        while series.front().is_some_and(|s| s.at < cutoff) {
            series.pop_front();
        }
    }

    /// Slope rounded to two decimals; `None` with fewer than two samples
    pub fn slope(&self, entity_id: &EntityId) -> Option<f64> {
        let series = self.series.get(entity_id)?;
        if series.len() < 2 {
            return None;
        }
        let first = series.front()?.at;
        let n = series.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
        for sample in series {
            let x = (sample.at - first).num_milliseconds() as f64 / 1000.0;
            sum_x += x;
            sum_y += sample.value;
            sum_xy += x * sample.value;
            sum_x2 += x * x;
        }
        let denom = n * sum_x2 - sum_x * sum_x;
        if denom <= 0.0 {
            return Some(0.0);
        }
        let per_second = (n * sum_xy - sum_x * sum_y) / denom;
        Some((per_second * 3600.0 * 100.0).round() / 100.0)
    }

    pub fn sample_count(&self, entity_id: &EntityId) -> usize {
        self.series.get(entity_id).map(VecDeque::len).unwrap_or(0)
    }

    /// All current slopes keyed by source entity
    pub fn slopes(&self) -> BTreeMap<EntityId, f64> {
        self.series
            .keys()
            .filter_map(|id| self.slope(id).map(|s| (id.clone(), s)))
            .collect()
    }
}

/// Rolling state owned by the engine and fed once per cycle
#[derive(Debug, Clone, Default)]
pub struct TelemetryHistory {
    pub humidity: HumidityHistory,
    pub slopes: SlopeTracker,
}

impl TelemetryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}
