use std::sync::Arc;

use polars::{
    frame::DataFrame,
    prelude::{
        DataType, Field, IntoLazy, PlSmallStr, Schema, SchemaRef, SortMultipleOptions, TimeUnit,
        col, lit,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::info;

use crate::{
    data::{FromCsv, Table, ToSchema, ensure_columns},
    error::{DataError, RidecastResult},
};

/// Columns of the raw reservation export, one row per completed trip.
///
/// Variant order mirrors the column order of the export so the canonical
/// schema can be applied to the CSV as-is.
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
pub enum ReservationCol {
    // === Identifiers ===
    /// Trip identifier, unique per reservation.
    #[strum(serialize = "Id")]
    Id,

    // === Timestamps ===
    /// Wall-clock time the reservation started.
    ReservationStartTime,
    /// Wall-clock time the reservation ended.
    ReservationEndTime,

    // === Booking ===
    /// Service area the trip was booked in.
    LocationId,

    // === Trip metrics ===
    /// Net revenue of the trip.
    NetPrice,
    /// Distance driven in meters.
    DistanceMeters,
    /// Driving time in minutes.
    MinutesDriven,

    // === Coordinates ===
    /// Latitude where the trip started.
    StartLatitude,
    /// Longitude where the trip started.
    StartLongitude,
    /// Latitude where the trip ended.
    EndLatitude,
    /// Longitude where the trip ended.
    EndLongitude,
}

impl From<ReservationCol> for PlSmallStr {
    fn from(value: ReservationCol) -> Self {
        value.as_str().into()
    }
}

impl ReservationCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Raw trip reservations, sorted by start time.
///
/// The wrapper guarantees the canonical columns are present and the rows are
/// in chronological start order; every downstream stage relies on both.
#[derive(Debug, Clone)]
pub struct Reservations {
    df: DataFrame,
}

impl Table for Reservations {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ToSchema for Reservations {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = ReservationCol::iter()
            .map(|col| {
                let dtype = match col {
                    ReservationCol::Id | ReservationCol::LocationId => DataType::Int64,

                    ReservationCol::ReservationStartTime | ReservationCol::ReservationEndTime => {
                        DataType::Datetime(TimeUnit::Microseconds, None)
                    }

                    ReservationCol::NetPrice
                    | ReservationCol::DistanceMeters
                    | ReservationCol::MinutesDriven
                    | ReservationCol::StartLatitude
                    | ReservationCol::StartLongitude
                    | ReservationCol::EndLatitude
                    | ReservationCol::EndLongitude => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl FromCsv for Reservations {
    fn from_df(df: DataFrame) -> RidecastResult<Self> {
        Self::new(df)
    }
}

impl Default for Reservations {
    fn default() -> Self {
        let df = DataFrame::empty_with_schema(&Self::to_schema());
        Self { df }
    }
}

impl Reservations {
    pub fn new(df: DataFrame) -> RidecastResult<Self> {
        ensure_columns(&df, ReservationCol::iter().map(|c| c.as_str()))?;

        let sorted = df
            .sort(
                [ReservationCol::ReservationStartTime.as_str()],
                SortMultipleOptions::default(),
            )
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        Ok(Self { df: sorted })
    }

    /// Restricts the table to trips booked in one service area.
    pub fn for_location(&self, location_id: i64) -> RidecastResult<Self> {
        let df = self
            .df
            .clone()
            .lazy()
            .filter(col(ReservationCol::LocationId).eq(lit(location_id)))
            .collect()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        info!(
            location_id,
            trips = df.height(),
            "Filtered reservations to service area"
        );

        Ok(Self { df })
    }
}
