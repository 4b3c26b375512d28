use std::path::PathBuf;

use ridecast::prelude::*;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn load_reservations() -> Reservations {
    Reservations::from_csv(fixture_path("reservations.csv")).expect("reservations fixture loads")
}

pub fn load_weather() -> WeatherTable {
    WeatherTable::from_csv(fixture_path("weather.csv")).expect("weather fixture loads")
}
