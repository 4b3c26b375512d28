pub mod calendar;
pub mod gaps;
pub mod hourly;
pub mod lags;
pub mod matrix;
pub mod pipeline;
