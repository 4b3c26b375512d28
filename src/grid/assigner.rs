use std::fmt;

use itertools::izip;
use ndarray::Array1;
use polars::{
    frame::DataFrame,
    prelude::{Column, PlSmallStr},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::info;

use crate::{
    data::{
        Table,
        reservations::{ReservationCol, Reservations},
    },
    error::{DataError, GridError, RidecastResult},
    grid::bbox::BoundingBox,
};

/// One-based grid cell identifier, counted latitude-first from the south-west
/// corner: `id = lon_bin * resolution + lat_bin + 1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(u32);

impl CellId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cell columns appended to the trip table.
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
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum GridCol {
    /// Cell the trip started in.
    OriginClusterId,
    /// Cell the trip ended in.
    DestinationClusterId,
}

impl From<GridCol> for PlSmallStr {
    fn from(value: GridCol) -> Self {
        value.as_str().into()
    }
}

impl GridCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Uniform lon/lat grid over a service area.
///
/// Each axis is divided into `resolution` equal bins by `resolution + 1`
/// edges. An interior edge belongs to the bin below it, the outer edges to
/// their adjacent bins, so every point of the box maps to exactly one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGrid {
    bbox: BoundingBox,
    resolution: u32,
    lon_edges: Vec<f64>,
    lat_edges: Vec<f64>,
}

impl ServiceGrid {
    pub fn new(bbox: BoundingBox, resolution: u32) -> RidecastResult<Self> {
        if resolution == 0 {
            return Err(GridError::InvalidResolution(resolution).into());
        }

        let edges = resolution as usize + 1;
        let lon_edges =
            Array1::linspace(bbox.min_longitude, bbox.max_longitude, edges).to_vec();
        let lat_edges =
            Array1::linspace(bbox.min_latitude, bbox.max_latitude, edges).to_vec();

        Ok(Self {
            bbox,
            resolution,
            lon_edges,
            lat_edges,
        })
    }

    /// Fits a grid to the coordinate extent of the given trips.
    pub fn fit(trips: &Reservations, resolution: u32) -> RidecastResult<Self> {
        let bbox = BoundingBox::from_trips(trips)?;
        let grid = Self::new(bbox, resolution)?;

        let (east_west_km, north_south_km) = bbox.span_km();
        info!(
            resolution,
            cells = grid.cell_count(),
            east_west_km,
            north_south_km,
            "Fitted service grid"
        );

        Ok(grid)
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn cell_count(&self) -> u32 {
        self.resolution * self.resolution
    }

    /// All cell identifiers, ascending.
    pub fn cells(&self) -> impl Iterator<Item = CellId> {
        (1..=self.cell_count()).map(CellId)
    }

    /// Maps a coordinate to its cell, or `None` outside the bounding box.
    pub fn locate(&self, longitude: f64, latitude: f64) -> Option<CellId> {
        if !self.bbox.contains(longitude, latitude) {
            return None;
        }

        let lon_bin = bin_index(&self.lon_edges, longitude);
        let lat_bin = bin_index(&self.lat_edges, latitude);
        Some(CellId(lon_bin * self.resolution + lat_bin + 1))
    }

    /// Appends origin and destination cell columns to the trip table.
    ///
    /// The grid must have been fitted on at least the extent of these trips;
    /// a null coordinate or one outside the box fails the whole assignment.
    pub fn assign(&self, trips: &Reservations) -> RidecastResult<DataFrame> {
        let origin = self.locate_trip_ends(
            trips.as_df(),
            ReservationCol::StartLongitude,
            ReservationCol::StartLatitude,
        )?;
        let destination = self.locate_trip_ends(
            trips.as_df(),
            ReservationCol::EndLongitude,
            ReservationCol::EndLatitude,
        )?;

        let mut df = trips.as_df().clone();
        df.with_column(Column::new(GridCol::OriginClusterId.name(), origin))
            .map_err(|e| DataError::DataFrame(e.to_string()))?;
        df.with_column(Column::new(GridCol::DestinationClusterId.name(), destination))
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        info!(trips = df.height(), "Assigned trips to grid cells");
        Ok(df)
    }

    fn locate_trip_ends(
        &self,
        df: &DataFrame,
        lon_col: ReservationCol,
        lat_col: ReservationCol,
    ) -> RidecastResult<Vec<u32>> {
        let lons = df
            .column(lon_col.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .f64()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;
        let lats = df
            .column(lat_col.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .f64()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        let mut ids = Vec::with_capacity(df.height());
        for (row, (longitude, latitude)) in izip!(lons, lats).enumerate() {
            let (longitude, latitude) = longitude.zip(latitude).ok_or_else(|| {
                GridError::Assignment(format!("row {row} has a null {lon_col} or {lat_col}"))
            })?;

            let cell = self
                .locate(longitude, latitude)
                .ok_or(GridError::OutOfBounds {
                    longitude,
                    latitude,
                })?;
            ids.push(cell.get());
        }

        Ok(ids)
    }
}

/// Bin of `value` given the sorted edge positions of one axis.
///
/// Interior edges count as the upper bound of the bin below them.
fn bin_index(edges: &[f64], value: f64) -> u32 {
    let interior = &edges[1..edges.len() - 1];
    interior.partition_point(|&edge| edge < value) as u32
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

    fn unit_grid() -> ServiceGrid {
        let bbox = BoundingBox {
            min_longitude: 0.0,
            max_longitude: 10.0,
            min_latitude: 0.0,
            max_latitude: 10.0,
        };
        ServiceGrid::new(bbox, 5).expect("valid grid")
    }

    fn trips(coords: &[(Option<f64>, Option<f64>, Option<f64>, Option<f64>)]) -> Reservations {
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
    fn test_zero_resolution_is_rejected() {
        let bbox = BoundingBox {
            min_longitude: 0.0,
            max_longitude: 1.0,
            min_latitude: 0.0,
            max_latitude: 1.0,
        };

        let err = ServiceGrid::new(bbox, 0).expect_err("zero cells make no grid");
        assert!(matches!(
            err,
            RidecastError::Grid(GridError::InvalidResolution(0))
        ));
    }

    #[test]
    fn test_locate_numbers_cells_from_the_south_west() {
        let grid = unit_grid();

        assert_eq!(grid.locate(2.0, 2.0).map(|c| c.get()), Some(1));
        assert_eq!(grid.locate(3.0, 3.0).map(|c| c.get()), Some(7));
        assert_eq!(grid.locate(0.0, 0.0).map(|c| c.get()), Some(1));
        assert_eq!(grid.locate(10.0, 10.0).map(|c| c.get()), Some(25));
    }

    #[test]
    fn test_interior_edges_belong_to_the_lower_bin() {
        let grid = unit_grid();

        // 2.0 is the upper edge of the first bin.
        assert_eq!(grid.locate(2.0, 0.0).map(|c| c.get()), Some(1));
        assert_eq!(grid.locate(2.0000001, 0.0).map(|c| c.get()), Some(6));
    }

    #[test]
    fn test_locate_outside_the_box_is_none() {
        let grid = unit_grid();

        assert_eq!(grid.locate(10.1, 5.0), None);
        assert_eq!(grid.locate(5.0, -0.1), None);
    }

    #[test]
    fn test_every_cell_id_is_reachable() {
        let grid = unit_grid();
        let expected: Vec<u32> = grid.cells().map(|c| c.get()).collect();

        let mut observed = Vec::new();
        for lon_bin in 0..5 {
            for lat_bin in 0..5 {
                let lon = lon_bin as f64 * 2.0 + 1.0;
                let lat = lat_bin as f64 * 2.0 + 1.0;
                observed.push(grid.locate(lon, lat).expect("inside the box").get());
            }
        }
        observed.sort_unstable();

        assert_eq!(observed, expected);
    }

    #[test]
    fn test_assign_appends_cell_columns() {
        let grid = unit_grid();
        let trips = trips(&[
            (Some(2.0), Some(2.0), Some(3.0), Some(3.0)),
            (Some(10.0), Some(10.0), Some(0.0), Some(0.0)),
        ]);

        let df = grid.assign(&trips).expect("assignment succeeds");
        assert_eq!(df.height(), 2);

        let origin = df
            .column(GridCol::OriginClusterId.as_str())
            .expect("origin column")
            .u32()
            .expect("cell ids are u32");
        let destination = df
            .column(GridCol::DestinationClusterId.as_str())
            .expect("destination column")
            .u32()
            .expect("cell ids are u32");

        assert_eq!(origin.get(0), Some(1));
        assert_eq!(destination.get(0), Some(7));
        assert_eq!(origin.get(1), Some(25));
        assert_eq!(destination.get(1), Some(1));
    }

    #[test]
    fn test_assign_rejects_null_coordinates() {
        let grid = unit_grid();
        let trips = trips(&[(Some(2.0), None, Some(3.0), Some(3.0))]);

        let err = grid.assign(&trips).expect_err("null coordinate must fail");
        assert!(matches!(
            err,
            RidecastError::Grid(GridError::Assignment(_))
        ));
    }

    #[test]
    fn test_assign_rejects_out_of_bounds_coordinates() {
        let grid = unit_grid();
        let trips = trips(&[(Some(2.0), Some(2.0), Some(11.0), Some(3.0))]);

        let err = grid.assign(&trips).expect_err("outside the box must fail");
        match err {
            RidecastError::Grid(GridError::OutOfBounds {
                longitude,
                latitude,
            }) => {
                assert_eq!(longitude, 11.0);
                assert_eq!(latitude, 3.0);
            }
            other => panic!("expected OutOfBounds, got {other}"),
        }
    }
}
