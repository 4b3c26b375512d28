use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use polars::{
    frame::DataFrame,
    prelude::{LazyCsvReader, LazyFileListReader, PlPath, SchemaRef},
};

use crate::error::{DataError, RidecastResult};

pub mod reservations;
pub mod weather;

// ================================================================================================
// Traits
// ================================================================================================

/// Common interface for typed table wrappers.
pub trait Table {
    /// Access the underlying DataFrame (immutable).
    fn as_df(&self) -> &DataFrame;

    fn height(&self) -> usize {
        self.as_df().height()
    }

    fn is_empty(&self) -> bool {
        self.as_df().is_empty()
    }
}

pub trait ToSchema {
    /// Returns the canonical schema for this table type.
    fn to_schema() -> SchemaRef;
}

/// CSV ingestion for tables with a canonical schema.
pub trait FromCsv: ToSchema + Sized {
    /// Wraps an already-loaded frame, enforcing the table's invariants.
    fn from_df(df: DataFrame) -> RidecastResult<Self>;

    /// Reads a CSV file against the canonical schema, parsing date and
    /// timestamp columns along the way.
    fn from_csv(path: impl AsRef<Path>) -> RidecastResult<Self> {
        let path = path.as_ref();
        let uri = path.to_str().ok_or_else(|| DataError::CsvRead {
            path: path.display().to_string(),
            msg: "path contains invalid UTF-8 characters".to_string(),
        })?;

        let df = LazyCsvReader::new(PlPath::new(uri))
            .with_has_header(true)
            .with_schema(Some(Self::to_schema()))
            .with_try_parse_dates(true)
            .finish()
            .map_err(|e| DataError::CsvRead {
                path: uri.to_string(),
                msg: e.to_string(),
            })?
            .collect()
            .map_err(|e| DataError::CsvRead {
                path: uri.to_string(),
                msg: e.to_string(),
            })?;

        Self::from_df(df)
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

pub(crate) fn ensure_columns<'a>(
    df: &DataFrame,
    columns: impl IntoIterator<Item = &'a str>,
) -> RidecastResult<()> {
    let schema = df.schema();
    for name in columns {
        if schema.get(name).is_none() {
            return Err(DataError::MissingColumn(name.to_string()).into());
        }
    }
    Ok(())
}

/// Converts a polars Date payload (days since the Unix epoch) to a calendar date.
pub(crate) fn date_from_days(days: i32) -> RidecastResult<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
        .ok_or_else(|| {
            DataError::TimestampConversion(format!("date out of range: {days} days since epoch"))
                .into()
        })
}

/// Converts a polars Datetime payload (microseconds since the Unix epoch) to a
/// naive timestamp.
pub(crate) fn datetime_from_micros(us: i64) -> RidecastResult<NaiveDateTime> {
    chrono::DateTime::from_timestamp_micros(us)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            DataError::TimestampConversion(format!("timestamp out of range: {us} us")).into()
        })
}
