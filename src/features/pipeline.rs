use tracing::info;

use crate::{
    config::PipelineConfig,
    data::{Table, reservations::Reservations, weather::WeatherTable},
    error::RidecastResult,
    features::{
        calendar::{CalendarFeaturizer, WeatherVocabulary},
        gaps::fill_hourly_gaps,
        hourly::HourlyDemand,
        lags::append_demand_lags,
        matrix::FeatureMatrix,
    },
};

/// End-to-end feature engineering for one service area's trip history.
///
/// The pipeline owns the configuration and, once fitted, the weather
/// description vocabulary, so repeated runs emit an identical feature schema
/// even when later weather exports carry a different description set.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    vocabulary: Option<WeatherVocabulary>,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            vocabulary: None,
        }
    }

    /// Pins the description vocabulary instead of fitting it from the first
    /// weather table seen. Used to score new data against a trained model.
    pub fn with_vocabulary(mut self, vocabulary: WeatherVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> Option<&WeatherVocabulary> {
        self.vocabulary.as_ref()
    }

    /// Builds per-bucket features from the observed hours only.
    ///
    /// Hours without a single reservation do not appear as rows, so this
    /// matrix suits models that relate demand to the calendar and weather of
    /// the same hour.
    #[tracing::instrument(skip_all)]
    pub fn hourly_features(
        &mut self,
        trips: &Reservations,
        weather: &WeatherTable,
    ) -> RidecastResult<FeatureMatrix> {
        let buckets = HourlyDemand::aggregate(trips)?;
        let buckets = buckets.join_weather(weather)?;
        let buckets = self.featurize(&buckets, weather)?;

        let matrix = FeatureMatrix::try_from(&buckets)?;
        info!(
            rows = matrix.height(),
            features = matrix.feature_names().len(),
            "Built hourly feature matrix"
        );
        Ok(matrix)
    }

    /// Builds a gap-free, lag-augmented series for autoregressive models.
    ///
    /// Every hour between the first and last observed bucket becomes a row,
    /// and each row carries the demand observed `lag` hours earlier for every
    /// configured lag. The leading rows without a full lag history are
    /// dropped.
    #[tracing::instrument(skip_all)]
    pub fn time_series_features(
        &mut self,
        trips: &Reservations,
        weather: &WeatherTable,
    ) -> RidecastResult<FeatureMatrix> {
        let buckets = HourlyDemand::aggregate(trips)?;
        let buckets = buckets.join_weather(weather)?;
        let buckets = fill_hourly_gaps(&buckets)?;
        let buckets = self.featurize(&buckets, weather)?;
        let buckets = append_demand_lags(&buckets, self.config.lag_hours())?;

        let matrix = FeatureMatrix::try_from(&buckets)?;
        info!(
            rows = matrix.height(),
            features = matrix.feature_names().len(),
            "Built time series feature matrix"
        );
        Ok(matrix)
    }

    fn featurize(
        &mut self,
        buckets: &HourlyDemand,
        weather: &WeatherTable,
    ) -> RidecastResult<HourlyDemand> {
        let vocabulary = match &self.vocabulary {
            Some(fitted) => fitted.clone(),
            None => {
                let fitted = WeatherVocabulary::from_weather(weather)?;
                self.vocabulary = Some(fitted.clone());
                fitted
            }
        };

        CalendarFeaturizer::new(vocabulary).transform(buckets)
    }
}

#[cfg(test)]
mod tests {
    use polars::{
        df,
        prelude::{DataType, IntoLazy, TimeUnit, col},
    };

    use crate::{
        data::reservations::ReservationCol,
        data::weather::WeatherCol,
        features::{calendar::day_column, lags::lag_column},
    };

    use super::*;

    const HOUR_US: i64 = 3_600_000_000;
    // 2024-03-04 00:00:00, a Monday, in microseconds and epoch days.
    const MAR_4_US: i64 = 1_709_510_400_000_000;
    const MAR_4: i32 = 19_786;

    fn trips(start_hours: &[i64]) -> Reservations {
        let n = start_hours.len();
        let starts: Vec<i64> = start_hours.iter().map(|h| MAR_4_US + h * HOUR_US).collect();
        let ends: Vec<i64> = starts.iter().map(|s| s + 900_000_000).collect();
        let ids: Vec<i64> = (1..=n as i64).collect();

        let df = df![
            ReservationCol::Id.as_str() => &ids,
            ReservationCol::ReservationStartTime.as_str() => &starts,
            ReservationCol::ReservationEndTime.as_str() => &ends,
            ReservationCol::LocationId.as_str() => &vec![7i64; n],
            ReservationCol::NetPrice.as_str() => &vec![10.0f64; n],
            ReservationCol::DistanceMeters.as_str() => &vec![2_000.0f64; n],
            ReservationCol::MinutesDriven.as_str() => &vec![12.0f64; n],
            ReservationCol::StartLatitude.as_str() => &vec![52.50f64; n],
            ReservationCol::StartLongitude.as_str() => &vec![13.40f64; n],
            ReservationCol::EndLatitude.as_str() => &vec![52.51f64; n],
            ReservationCol::EndLongitude.as_str() => &vec![13.41f64; n]
        ]
        .expect("failed to create trip frame");

        let df = df
            .lazy()
            .with_columns([
                col(ReservationCol::ReservationStartTime)
                    .cast(DataType::Datetime(TimeUnit::Microseconds, None)),
                col(ReservationCol::ReservationEndTime)
                    .cast(DataType::Datetime(TimeUnit::Microseconds, None)),
            ])
            .collect()
            .expect("failed to cast timestamp columns");

        Reservations::new(df).expect("valid trip frame")
    }

    fn weather(days: &[i32], descriptions: &[&str]) -> WeatherTable {
        let n = days.len();
        let df = df![
            WeatherCol::Date.as_str() => days,
            WeatherCol::Description.as_str() => descriptions,
            WeatherCol::MaxTemp.as_str() => &vec![11.0f64; n],
            WeatherCol::HeatIndex.as_str() => &vec![9.5f64; n],
            WeatherCol::WindGustSpeed.as_str() => &vec![31.0f64; n],
            WeatherCol::Precipitation.as_str() => &vec![0.4f64; n]
        ]
        .expect("failed to create weather frame");

        let df = df
            .lazy()
            .with_columns([col(WeatherCol::Date).cast(DataType::Date)])
            .collect()
            .expect("failed to cast date column");

        WeatherTable::new(df).expect("valid weather frame")
    }

    #[test]
    fn test_hourly_features_cover_observed_buckets_only() {
        let trips = trips(&[8, 8, 9, 30]);
        let weather = weather(&[MAR_4, MAR_4 + 1], &["Clear", "Rain"]);

        let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
        let matrix = pipeline
            .hourly_features(&trips, &weather)
            .expect("pipeline succeeds");

        // Three distinct start hours, no rows for the gaps in between.
        assert_eq!(matrix.height(), 3);

        // 3 trip means + 4 weather measurements + 2 cyclical + 7 day
        // indicators + 2 description indicators.
        let names = matrix.feature_names();
        assert_eq!(names.len(), 18);
        assert!(names.contains(&"xhr"));
        assert!(names.contains(&day_column(0).as_str()));
        assert!(names.contains(&"description_clear"));
        assert!(!names.iter().any(|n| n.starts_with("demand_lag_")));
    }

    #[test]
    fn test_time_series_features_fill_gaps_and_trim_lag_warmup() {
        let trips = trips(&[0, 5, 23]);
        let weather = weather(&[MAR_4], &["Clear"]);

        let config = PipelineConfig::new([1u32, 2, 3], 0.8, 5).expect("valid config");
        let mut pipeline = FeaturePipeline::new(config);
        let matrix = pipeline
            .time_series_features(&trips, &weather)
            .expect("pipeline succeeds");

        // 24 hourly rows after gap filling, minus the 3-hour lag warmup.
        assert_eq!(matrix.height(), 21);

        let names = matrix.feature_names();
        assert!(names.contains(&lag_column(1).as_str()));
        assert!(names.contains(&lag_column(3).as_str()));
    }

    #[test]
    fn test_vocabulary_is_fitted_once_and_reused() {
        let trips = trips(&[8, 9]);
        let first = weather(&[MAR_4], &["Rain"]);
        let second = weather(&[MAR_4], &["Snow"]);

        let mut pipeline = FeaturePipeline::new(PipelineConfig::default());
        assert!(pipeline.vocabulary().is_none());

        let fitted = pipeline
            .hourly_features(&trips, &first)
            .expect("first run succeeds");
        let values: Vec<&str> = pipeline.vocabulary().expect("fitted").values().collect();
        assert_eq!(values, vec!["Rain"]);

        // The second run keeps the fitted schema; "Snow" encodes as zeros.
        let reused = pipeline
            .hourly_features(&trips, &second)
            .expect("second run succeeds");
        assert_eq!(fitted.feature_names(), reused.feature_names());
        assert!(!reused.feature_names().contains(&"description_snow"));
    }

    #[test]
    fn test_preset_vocabulary_pins_the_schema() {
        let trips = trips(&[8]);
        let weather = weather(&[MAR_4], &["Clear"]);

        let vocabulary = WeatherVocabulary::new(["Clear", "Rain", "Snow"]);
        let mut pipeline =
            FeaturePipeline::new(PipelineConfig::default()).with_vocabulary(vocabulary);

        let matrix = pipeline
            .hourly_features(&trips, &weather)
            .expect("pipeline succeeds");

        let names = matrix.feature_names();
        assert!(names.contains(&"description_clear"));
        assert!(names.contains(&"description_rain"));
        assert!(names.contains(&"description_snow"));
    }
}
