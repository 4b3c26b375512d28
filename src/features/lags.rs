use polars::prelude::{DataType, Expr, IntoLazy, col, lit};
use tracing::{info, warn};

use crate::{
    data::Table,
    error::{RidecastResult, stage_error},
    features::hourly::{HourlyCol, HourlyDemand},
};

/// Column name of a demand lag feature.
pub fn lag_column(hours: u32) -> String {
    format!("demand_lag_{hours}")
}

/// Appends `demand_lag_*` columns and drops every row whose lag window is
/// incomplete.
///
/// On an hourly-dense series (see `fill_hourly_gaps`) lag L is the demand
/// exactly L hours earlier. The first max(L) rows have no complete window and
/// are dropped; a series shorter than max(L) ends up empty.
pub fn append_demand_lags(
    buckets: &HourlyDemand,
    lag_hours: &[u32],
) -> RidecastResult<HourlyDemand> {
    let lag_exprs: Vec<Expr> = lag_hours
        .iter()
        .map(|&lag| {
            col(HourlyCol::Demand)
                .shift(lit(lag as i64))
                .alias(lag_column(lag))
                .cast(DataType::UInt32)
        })
        .collect();
    let lag_cols: Vec<Expr> = lag_hours.iter().map(|&lag| col(lag_column(lag))).collect();

    let observed = buckets.height();
    let df = buckets
        .as_df()
        .clone()
        .lazy()
        .with_columns(lag_exprs)
        .drop_nulls(Some(lag_cols))
        .collect()
        .map_err(|e| stage_error("lag featurization", e))?;

    if df.is_empty() {
        warn!(
            buckets = observed,
            "Series shorter than the longest lag; no rows have a complete lag window"
        );
    } else {
        info!(
            buckets = observed,
            kept = df.height(),
            "Appended demand lag features"
        );
    }

    Ok(HourlyDemand::from_sorted(df))
}
