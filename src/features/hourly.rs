use std::sync::Arc;

use polars::{
    frame::DataFrame,
    prelude::{
        ChunkAgg, DataType, Expr, Field, IntoLazy, JoinArgs, JoinType, PlSmallStr, Schema,
        SchemaRef, SortMultipleOptions, TimeUnit, col, len, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::info;

use crate::{
    data::{
        Table, ToSchema, date_from_days, ensure_columns,
        reservations::{ReservationCol, Reservations},
        weather::{WeatherCol, WeatherTable},
    },
    error::{DataError, FeatureError, RidecastResult, stage_error},
};

/// Marker column attached to the weather side of the join; a null after a
/// left join means the bucket date had no weather row.
const WEATHER_PRESENT: &str = "__weather_present";

/// Columns of an hourly demand bucket as produced by the aggregation.
///
/// Joins and featurizers append further columns; these are the canonical core.
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
pub enum HourlyCol {
    /// Bucket timestamp, floored to the hour. The series key.
    Hour,
    /// Number of reservations started within the hour.
    Demand,
    /// Mean net price of the hour's trips.
    AveragePrice,
    /// Mean trip distance of the hour's trips.
    AverageDistance,
    /// Mean driving time of the hour's trips.
    AverageTravelTime,
    /// Hour of day, 0 through 23.
    HourOfDay,
    /// Day of week, 0 (Monday) through 6 (Sunday).
    DayOfWeek,
}

impl From<HourlyCol> for PlSmallStr {
    fn from(value: HourlyCol) -> Self {
        value.as_str().into()
    }
}

impl HourlyCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The hourly demand series, sorted by bucket timestamp.
///
/// Starts as the plain aggregation output and accumulates weather and feature
/// columns as pipeline stages run over it.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyDemand {
    df: DataFrame,
}

impl Table for HourlyDemand {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for HourlyDemand {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = HourlyCol::iter()
            .map(|col| {
                let dtype = match col {
                    HourlyCol::Hour => DataType::Datetime(TimeUnit::Microseconds, None),

                    HourlyCol::Demand => DataType::UInt32,

                    HourlyCol::AveragePrice
                    | HourlyCol::AverageDistance
                    | HourlyCol::AverageTravelTime => DataType::Float64,

                    HourlyCol::HourOfDay | HourlyCol::DayOfWeek => DataType::Int32,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl Default for HourlyDemand {
    fn default() -> Self {
        let df = DataFrame::empty_with_schema(&Self::to_schema());
        Self { df }
    }
}

impl HourlyDemand {
    pub fn new(df: DataFrame) -> RidecastResult<Self> {
        ensure_columns(&df, [HourlyCol::Hour.as_str(), HourlyCol::Demand.as_str()])?;

        let sorted = df
            .sort([HourlyCol::Hour.as_str()], SortMultipleOptions::default())
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        Ok(Self { df: sorted })
    }

    /// Wraps a frame that is already sorted by bucket timestamp.
    pub(crate) fn from_sorted(df: DataFrame) -> Self {
        Self { df }
    }

    /// Buckets the reservations by their start hour.
    ///
    /// Each bucket counts the hour's trips as `demand` and averages their
    /// price, distance and travel time. Hours without any trip produce no
    /// bucket; a bucket whose numeric field is entirely null keeps a null
    /// mean. Calendar columns are derived from the bucket timestamp.
    pub fn aggregate(trips: &Reservations) -> RidecastResult<Self> {
        let df = trips
            .as_df()
            .clone()
            .lazy()
            .group_by([col(ReservationCol::ReservationStartTime)
                .dt()
                .truncate(lit("1h"))
                .alias(HourlyCol::Hour)])
            .agg(agg_exprs())
            .sort([HourlyCol::Hour.as_str()], SortMultipleOptions::default())
            .with_columns(calendar_base_exprs())
            .collect()
            .map_err(|e| stage_error("hourly aggregation", e))?;

        info!(
            trips = trips.height(),
            buckets = df.height(),
            "Aggregated reservations into hourly buckets"
        );

        Ok(Self { df })
    }

    /// Attaches the daily weather to every bucket via a date-keyed left join.
    ///
    /// Every bucket date must be covered by the weather table; the first
    /// uncovered date is reported as an error. Weather columns already present
    /// are dropped first, so joining twice equals joining once.
    pub fn join_weather(&self, weather: &WeatherTable) -> RidecastResult<Self> {
        let weather_value_cols = WeatherCol::iter()
            .filter(|c| *c != WeatherCol::Date)
            .map(|c| c.as_str());
        let base = self.df.drop_many(weather_value_cols);

        let weather_lf = weather
            .as_df()
            .clone()
            .lazy()
            .with_columns([lit(true).alias(WEATHER_PRESENT)]);

        let joined = base
            .lazy()
            .with_columns([col(HourlyCol::Hour)
                .cast(DataType::Date)
                .alias(WeatherCol::Date)])
            .join(
                weather_lf,
                [col(WeatherCol::Date)],
                [col(WeatherCol::Date)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([HourlyCol::Hour.as_str()], SortMultipleOptions::default())
            .collect()
            .map_err(|e| stage_error("weather join", e))?;

        Self::ensure_weather_coverage(&joined)?;

        let df = joined.drop_many([WeatherCol::Date.as_str(), WEATHER_PRESENT]);

        info!(
            buckets = df.height(),
            "Joined daily weather onto hourly buckets"
        );

        Ok(Self { df })
    }

    /// Smallest and largest bucket timestamp in microseconds.
    pub(crate) fn hour_bounds(&self) -> RidecastResult<(i64, i64)> {
        let hours = self
            .df
            .column(HourlyCol::Hour.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .datetime()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .physical();

        match (hours.min(), hours.max()) {
            (Some(min), Some(max)) => Ok((min, max)),
            _ => Err(DataError::EmptyTable("no hourly buckets to span".to_string()).into()),
        }
    }

    fn ensure_weather_coverage(joined: &DataFrame) -> RidecastResult<()> {
        let missing = joined
            .clone()
            .lazy()
            .filter(col(WEATHER_PRESENT).is_null())
            .select([col(WeatherCol::Date)])
            .collect()
            .map_err(|e| stage_error("weather coverage check", e))?;

        if missing.is_empty() {
            return Ok(());
        }

        let days = missing
            .column(WeatherCol::Date.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .date()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .physical()
            .min()
            .ok_or_else(|| DataError::DataFrame("missing date vanished".to_string()))?;

        Err(FeatureError::MissingWeatherRow {
            date: date_from_days(days)?,
        }
        .into())
    }
}

fn agg_exprs() -> Vec<Expr> {
    vec![
        len().alias(HourlyCol::Demand).cast(DataType::UInt32),
        col(ReservationCol::NetPrice)
            .mean()
            .alias(HourlyCol::AveragePrice)
            .cast(DataType::Float64),
        col(ReservationCol::DistanceMeters)
            .mean()
            .alias(HourlyCol::AverageDistance)
            .cast(DataType::Float64),
        col(ReservationCol::MinutesDriven)
            .mean()
            .alias(HourlyCol::AverageTravelTime)
            .cast(DataType::Float64),
    ]
}

/// Calendar columns derived from the bucket timestamp.
///
/// polars numbers weekdays ISO-style (Monday = 1); the pipeline uses
/// Monday = 0.
pub(crate) fn calendar_base_exprs() -> Vec<Expr> {
    vec![
        col(HourlyCol::Hour)
            .dt()
            .hour()
            .alias(HourlyCol::HourOfDay)
            .cast(DataType::Int32),
        (col(HourlyCol::Hour).dt().weekday().cast(DataType::Int32) - lit(1i32))
            .alias(HourlyCol::DayOfWeek)
            .cast(DataType::Int32),
    ]
}
