// 1. Traits
pub use crate::data::{FromCsv, Table, ToSchema};

// 2. The Core Pipeline Types
pub use crate::config::PipelineConfig;
pub use crate::features::{
    calendar::{CalendarFeaturizer, WeatherVocabulary},
    hourly::HourlyDemand,
    matrix::FeatureMatrix,
    pipeline::FeaturePipeline,
};

// 3. Column Names
pub use crate::data::{reservations::ReservationCol, weather::WeatherCol};
pub use crate::features::{
    calendar::{CalendarCol, day_column},
    hourly::HourlyCol,
    lags::lag_column,
};
pub use crate::grid::assigner::GridCol;

// 4. Domain Tables & Grid
pub use crate::data::{reservations::Reservations, weather::WeatherTable};
pub use crate::grid::{
    assigner::{CellId, ServiceGrid},
    bbox::BoundingBox,
};

// 5. Errors
pub use crate::error::{DataError, FeatureError, GridError, RidecastError, RidecastResult};

// 6. Operations & Evaluation
pub use crate::features::{gaps::fill_hourly_gaps, lags::append_demand_lags};
pub use crate::grid::geo::haversine_km;
pub use crate::model::{
    FoldData, FoldPlan, FoldScore, RepeatedKFold, mean_score, score_folds,
};
