use anyhow::{Context, Result};
use ridecast::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let trips = Reservations::from_csv("tests/fixtures/reservations.csv")
        .context("loading reservations")?;
    let weather =
        WeatherTable::from_csv("tests/fixtures/weather.csv").context("loading weather")?;

    let mut pipeline = FeaturePipeline::new(PipelineConfig::default());

    let matrix = pipeline.hourly_features(&trips, &weather)?;
    println!(
        "hourly matrix: {} rows x {} features",
        matrix.height(),
        matrix.feature_names().len()
    );

    let kfold = RepeatedKFold::new(5, 3, 1)?;
    let scores = score_folds(&matrix, &kfold, |fold| {
        // Predict the train mean, report the test MAE.
        let prediction = fold.train_target().mean().unwrap_or(0.0);
        Ok(fold
            .test_target()
            .mapv(|demand| (demand - prediction).abs())
            .mean()
            .unwrap_or(f64::NAN))
    })?;
    if let Some(mae) = mean_score(&scores) {
        println!("baseline MAE over {} folds: {mae:.3}", scores.len());
    }

    let series = pipeline.time_series_features(&trips, &weather)?;
    let (train, test) = series.chronological_split(pipeline.config().train_fraction())?;
    println!(
        "time series matrix: {} train rows, {} test rows",
        train.height(),
        test.height()
    );

    let grid = ServiceGrid::fit(&trips, pipeline.config().grid_resolution())?;
    let assigned = grid.assign(&trips)?;
    let (east_west_km, north_south_km) = grid.bbox().span_km();
    println!(
        "grid: {} cells over {east_west_km:.1} km x {north_south_km:.1} km, {} trips assigned",
        grid.cell_count(),
        assigned.height()
    );

    Ok(())
}
