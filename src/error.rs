use chrono::NaiveDate;
use thiserror::Error;

pub type RidecastResult<T> = Result<T, RidecastError>;

#[derive(Debug, Error)]
pub enum RidecastError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Errors related to table loading, schemas, and shape validation.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Empty table: {0}")]
    EmptyTable(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),

    #[error("Failed to read CSV '{path}': {msg}")]
    CsvRead { path: String, msg: String },

    #[error("Failed timestamp conversion: {0}")]
    TimestampConversion(String),

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),
}

/// Errors related to feature pipeline stages.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Missing weather row for date '{date}'")]
    MissingWeatherRow { date: NaiveDate },

    #[error("Ambiguous weather: {count} rows for date '{date}'")]
    AmbiguousWeatherRow { date: NaiveDate, count: u32 },

    #[error("Feature stage '{stage}' failed: {msg}")]
    Stage { stage: &'static str, msg: String },
}

/// Errors related to service-area gridding.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("No coordinates to derive a bounding box from")]
    EmptyCoordinates,

    #[error("Grid resolution must be at least 1, got {0}")]
    InvalidResolution(u32),

    #[error("Coordinate ({longitude}, {latitude}) lies outside the service area")]
    OutOfBounds { longitude: f64, latitude: f64 },

    #[error("Grid assignment failed: {0}")]
    Assignment(String),
}

/// Wraps a polars failure with the pipeline stage it occurred in.
pub(crate) fn stage_error(stage: &'static str, e: polars::error::PolarsError) -> RidecastError {
    FeatureError::Stage {
        stage,
        msg: e.to_string(),
    }
    .into()
}
