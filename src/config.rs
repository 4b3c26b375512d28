use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::error::{DataError, RidecastResult};

/// Configuration for the hourly feature pipeline.
///
/// The defaults reproduce the production forecasting setup: demand lags of
/// one, two and three days, an 80/20 chronological split and a 5x5 service
/// grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    lag_hours: SmallVec<[u32; 3]>,
    train_fraction: f64,
    grid_resolution: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lag_hours: smallvec![24, 48, 72],
            train_fraction: 0.8,
            grid_resolution: 5,
        }
    }
}

impl PipelineConfig {
    /// Validates and normalizes the pipeline parameters.
    ///
    /// Lag offsets are sorted and deduplicated so the generated lag columns
    /// have a deterministic order regardless of input order.
    pub fn new(
        lag_hours: impl IntoIterator<Item = u32>,
        train_fraction: f64,
        grid_resolution: u32,
    ) -> RidecastResult<Self> {
        let mut lag_hours: SmallVec<[u32; 3]> = lag_hours.into_iter().collect();
        lag_hours.sort_unstable();
        lag_hours.dedup();

        if lag_hours.is_empty() {
            return Err(DataError::InvalidConfig(
                "at least one lag offset is required".to_string(),
            )
            .into());
        }
        if lag_hours.first().is_some_and(|first| *first == 0) {
            return Err(DataError::InvalidConfig("lag offsets must be positive".to_string()).into());
        }
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(DataError::InvalidConfig(format!(
                "train fraction must lie strictly between 0 and 1, got {train_fraction}"
            ))
            .into());
        }
        if grid_resolution == 0 {
            return Err(
                DataError::InvalidConfig("grid resolution must be at least 1".to_string()).into(),
            );
        }

        Ok(Self {
            lag_hours,
            train_fraction,
            grid_resolution,
        })
    }

    pub fn lag_hours(&self) -> &[u32] {
        &self.lag_hours
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    pub fn grid_resolution(&self) -> u32 {
        self.grid_resolution
    }

    /// Longest configured lag. Rows closer than this to the series start have
    /// undefined lag values and are dropped by the lag featurizer.
    pub fn max_lag(&self) -> u32 {
        self.lag_hours.last().copied().unwrap_or(0)
    }
}
