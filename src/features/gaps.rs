use polars::{
    df,
    prelude::{
        DataType, Expr, FillNullStrategy, IntoLazy, JoinArgs, JoinType, SortMultipleOptions,
        TimeUnit, col,
    },
};
use tracing::info;

use crate::{
    data::{Table, datetime_from_micros},
    error::{DataError, RidecastResult, stage_error},
    features::hourly::{HourlyCol, HourlyDemand, calendar_base_exprs},
};

pub(crate) const MICROS_PER_HOUR: i64 = 3_600_000_000;

/// Reindexes the bucket series onto the full hourly grid between its first
/// and last hour.
///
/// Hours without a bucket get a row: calendar columns are recomputed from the
/// grid timestamp, every other column carries the last observed value
/// forward. Treating a silent hour as "same as the last observed hour" is a
/// deliberate simplification, not statistical imputation. The first grid row
/// is an observed bucket by construction.
pub fn fill_hourly_gaps(buckets: &HourlyDemand) -> RidecastResult<HourlyDemand> {
    let (min, max) = buckets.hour_bounds()?;

    let mut grid_hours = Vec::with_capacity(((max - min) / MICROS_PER_HOUR + 1) as usize);
    let mut ts = min;
    while ts <= max {
        grid_hours.push(ts);
        ts += MICROS_PER_HOUR;
    }

    let grid = df![HourlyCol::Hour.as_str() => &grid_hours]
        .map_err(|e| DataError::DataFrame(e.to_string()))?
        .lazy()
        .with_columns([
            col(HourlyCol::Hour).cast(DataType::Datetime(TimeUnit::Microseconds, None)),
        ]);

    let fill_exprs: Vec<Expr> = buckets
        .as_df()
        .get_column_names_owned()
        .into_iter()
        .filter(|name| {
            name.as_str() != HourlyCol::Hour.as_str()
                && name.as_str() != HourlyCol::HourOfDay.as_str()
                && name.as_str() != HourlyCol::DayOfWeek.as_str()
        })
        .map(|name| col(name).fill_null_with_strategy(FillNullStrategy::Forward(None)))
        .collect();

    let observed = buckets.height();
    let df = grid
        .join(
            buckets.as_df().clone().lazy(),
            [col(HourlyCol::Hour)],
            [col(HourlyCol::Hour)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([HourlyCol::Hour.as_str()], SortMultipleOptions::default())
        .with_columns(calendar_base_exprs())
        .with_columns(fill_exprs)
        .collect()
        .map_err(|e| stage_error("gap filling", e))?;

    info!(
        start = %datetime_from_micros(min)?,
        end = %datetime_from_micros(max)?,
        observed,
        filled = df.height(),
        "Reindexed buckets onto the hourly grid"
    );

    Ok(HourlyDemand::from_sorted(df))
}
