use std::sync::Arc;

use polars::{
    frame::DataFrame,
    prelude::{
        ChunkUnique, DataType, Field, IntoLazy, PlSmallStr, Schema, SchemaRef,
        SortMultipleOptions, col, len, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    data::{FromCsv, Table, ToSchema, date_from_days, ensure_columns},
    error::{DataError, FeatureError, RidecastResult},
};

/// Columns of the daily weather export, one row per calendar date.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum WeatherCol {
    /// Calendar date the measurements belong to.
    #[strum(serialize = "Date")]
    Date,
    /// Human-readable weather summary (e.g. `Clear`, `Mostly Cloudy`).
    Description,
    /// Daily maximum temperature.
    MaxTemp,
    /// Daily heat index.
    HeatIndex,
    /// Daily maximum wind gust speed.
    WindGustSpeed,
    /// Daily precipitation.
    Precipitation,
}

impl From<WeatherCol> for PlSmallStr {
    fn from(value: WeatherCol) -> Self {
        value.as_str().into()
    }
}

impl WeatherCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Daily weather measurements keyed by calendar date.
///
/// Construction rejects duplicate dates, so a lookup by date is unambiguous
/// for every downstream join.
#[derive(Debug, Clone)]
pub struct WeatherTable {
    df: DataFrame,
}

impl Table for WeatherTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for WeatherTable {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = WeatherCol::iter()
            .map(|col| {
                let dtype = match col {
                    WeatherCol::Date => DataType::Date,

                    WeatherCol::Description => DataType::String,

                    WeatherCol::MaxTemp
                    | WeatherCol::HeatIndex
                    | WeatherCol::WindGustSpeed
                    | WeatherCol::Precipitation => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl FromCsv for WeatherTable {
    fn from_df(df: DataFrame) -> RidecastResult<Self> {
        Self::new(df)
    }
}

impl Default for WeatherTable {
    fn default() -> Self {
        let df = DataFrame::empty_with_schema(&Self::to_schema());
        Self { df }
    }
}

impl WeatherTable {
    pub fn new(df: DataFrame) -> RidecastResult<Self> {
        ensure_columns(&df, WeatherCol::iter().map(|c| c.as_str()))?;

        let sorted = df
            .sort(
                [WeatherCol::Date.as_str()],
                SortMultipleOptions::default(),
            )
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        Self::ensure_unique_dates(&sorted)?;

        Ok(Self { df: sorted })
    }

    /// Sorted, deduplicated weather descriptions present in the table.
    ///
    /// This is the category set the one-hot encoding is fit from.
    pub fn descriptions(&self) -> RidecastResult<Vec<String>> {
        let unique = self
            .df
            .column(WeatherCol::Description.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .str()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .unique()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        let mut values: Vec<String> = unique.into_iter().flatten().map(str::to_string).collect();
        values.sort();
        Ok(values)
    }

    fn ensure_unique_dates(df: &DataFrame) -> RidecastResult<()> {
        let duplicates = df
            .clone()
            .lazy()
            .group_by([col(WeatherCol::Date)])
            .agg([len().cast(DataType::UInt32).alias("rows")])
            .filter(col("rows").gt(lit(1u32)))
            .sort(
                [WeatherCol::Date.as_str()],
                SortMultipleOptions::default(),
            )
            .collect()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        if duplicates.is_empty() {
            return Ok(());
        }

        let days = duplicates
            .column(WeatherCol::Date.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .date()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .physical()
            .get(0)
            .ok_or_else(|| DataError::DataFrame("duplicate date vanished".to_string()))?;

        let count = duplicates
            .column("rows")
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .u32()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .get(0)
            .ok_or_else(|| DataError::DataFrame("duplicate count vanished".to_string()))?;

        Err(FeatureError::AmbiguousWeatherRow {
            date: date_from_days(days)?,
            count,
        }
        .into())
    }
}
