use polars::{frame::DataFrame, prelude::ChunkAgg};
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        Table,
        reservations::{ReservationCol, Reservations},
    },
    error::{DataError, GridError, RidecastResult},
    grid::geo::haversine_km,
};

/// Axis-aligned extent of a service area, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// Smallest box containing every start and end coordinate of the trips.
    pub fn from_trips(trips: &Reservations) -> RidecastResult<Self> {
        let df = trips.as_df();

        let lon = merge_bounds(
            column_bounds(df, ReservationCol::StartLongitude)?,
            column_bounds(df, ReservationCol::EndLongitude)?,
        );
        let lat = merge_bounds(
            column_bounds(df, ReservationCol::StartLatitude)?,
            column_bounds(df, ReservationCol::EndLatitude)?,
        );

        match (lon, lat) {
            (Some((min_longitude, max_longitude)), Some((min_latitude, max_latitude))) => {
                Ok(Self {
                    min_longitude,
                    max_longitude,
                    min_latitude,
                    max_latitude,
                })
            }
            _ => Err(GridError::EmptyCoordinates.into()),
        }
    }

    /// Whether the coordinate lies inside the box. All edges are inclusive.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        longitude >= self.min_longitude
            && longitude <= self.max_longitude
            && latitude >= self.min_latitude
            && latitude <= self.max_latitude
    }

    /// Ground extent in kilometers: east-west measured along the southern
    /// edge, north-south along the western edge.
    pub fn span_km(&self) -> (f64, f64) {
        let east_west = haversine_km(
            self.min_longitude,
            self.min_latitude,
            self.max_longitude,
            self.min_latitude,
        );
        let north_south = haversine_km(
            self.min_longitude,
            self.min_latitude,
            self.min_longitude,
            self.max_latitude,
        );
        (east_west, north_south)
    }
}

fn column_bounds(df: &DataFrame, column: ReservationCol) -> RidecastResult<Option<(f64, f64)>> {
    let values = df
        .column(column.as_str())
        .map_err(|e| DataError::DataFrame(e.to_string()))?
        .f64()
        .map_err(|e| DataError::DataFrame(e.to_string()))?;

    Ok(values.min().zip(values.max()))
}

fn merge_bounds(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((a_min, a_max)), Some((b_min, b_max))) => {
            Some((a_min.min(b_min), a_max.max(b_max)))
        }
        (bounds, None) | (None, bounds) => bounds,
    }
}

#[cfg(test)]
mod tests {
    use polars::{
        df,
        prelude::{DataType, IntoLazy, TimeUnit, col},
    };

    use crate::error::RidecastError;

    use super::*;

    // 2024-03-04 06:00:00 in microseconds.
    const BASE_US: i64 = 1_709_532_000_000_000;

    fn trips(coords: &[(f64, f64, f64, f64)]) -> Reservations {
        let n = coords.len();
        let ids: Vec<i64> = (1..=n as i64).collect();
        let starts: Vec<i64> = (0..n as i64).map(|i| BASE_US + i * 60_000_000).collect();
        let ends: Vec<i64> = starts.iter().map(|s| s + 900_000_000).collect();

        let df = df![
            ReservationCol::Id.as_str() => &ids,
            ReservationCol::ReservationStartTime.as_str() => &starts,
            ReservationCol::ReservationEndTime.as_str() => &ends,
            ReservationCol::LocationId.as_str() => &vec![7i64; n],
            ReservationCol::NetPrice.as_str() => &vec![10.0f64; n],
            ReservationCol::DistanceMeters.as_str() => &vec![2_000.0f64; n],
            ReservationCol::MinutesDriven.as_str() => &vec![12.0f64; n],
            ReservationCol::StartLatitude.as_str() => &coords.iter().map(|c| c.1).collect::<Vec<_>>(),
            ReservationCol::StartLongitude.as_str() => &coords.iter().map(|c| c.0).collect::<Vec<_>>(),
            ReservationCol::EndLatitude.as_str() => &coords.iter().map(|c| c.3).collect::<Vec<_>>(),
            ReservationCol::EndLongitude.as_str() => &coords.iter().map(|c| c.2).collect::<Vec<_>>()
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

    #[test]
    fn test_from_trips_spans_start_and_end_coordinates() {
        // (start_lon, start_lat, end_lon, end_lat)
        let trips = trips(&[
            (13.35, 52.50, 13.44, 52.53),
            (13.42, 52.49, 13.37, 52.51),
        ]);

        let bbox = BoundingBox::from_trips(&trips).expect("bbox fits");
        assert_eq!(bbox.min_longitude, 13.35);
        assert_eq!(bbox.max_longitude, 13.44);
        assert_eq!(bbox.min_latitude, 52.49);
        assert_eq!(bbox.max_latitude, 52.53);
    }

    #[test]
    fn test_from_trips_rejects_empty_table() {
        let err = BoundingBox::from_trips(&Reservations::default())
            .expect_err("empty table has no extent");
        assert!(matches!(
            err,
            RidecastError::Grid(GridError::EmptyCoordinates)
        ));
    }

    #[test]
    fn test_contains_is_edge_inclusive() {
        let bbox = BoundingBox {
            min_longitude: 0.0,
            max_longitude: 10.0,
            min_latitude: 0.0,
            max_latitude: 10.0,
        };

        assert!(bbox.contains(0.0, 0.0));
        assert!(bbox.contains(10.0, 10.0));
        assert!(bbox.contains(5.0, 10.0));
        assert!(!bbox.contains(10.000001, 5.0));
        assert!(!bbox.contains(5.0, -0.000001));
    }

    #[test]
    fn test_span_km_of_a_degree_box_at_the_equator() {
        let bbox = BoundingBox {
            min_longitude: 0.0,
            max_longitude: 1.0,
            min_latitude: 0.0,
            max_latitude: 1.0,
        };

        let (east_west, north_south) = bbox.span_km();
        assert!((east_west - 111.19).abs() < 0.5, "got {east_west} km");
        assert!((north_south - 111.19).abs() < 0.5, "got {north_south} km");
    }
}
