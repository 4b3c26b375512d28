use std::collections::HashSet;

use polars::{
    frame::DataFrame,
    prelude::{ChunkUnique, DataType, Expr, IntoLazy, PlSmallStr, col, lit},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{info, warn};

use crate::{
    data::{Table, ensure_columns, weather::WeatherCol, weather::WeatherTable},
    error::{DataError, RidecastResult, stage_error},
    features::hourly::{HourlyCol, HourlyDemand},
};

/// Engineered calendar columns.
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
pub enum CalendarCol {
    /// Sine component of the cyclical hour-of-day encoding.
    Xhr,
    /// Cosine component of the cyclical hour-of-day encoding.
    Yhr,
}

impl From<CalendarCol> for PlSmallStr {
    fn from(value: CalendarCol) -> Self {
        value.as_str().into()
    }
}

impl CalendarCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Column name of a day-of-week indicator (0 = Monday).
pub fn day_column(day: i32) -> String {
    format!("day_{day}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VocabularyEntry {
    value: String,
    column: String,
}

/// The fixed weather description category set the one-hot encoding is fit on.
///
/// Fitting once and reusing the vocabulary keeps the feature schema identical
/// between runs; a description outside the vocabulary encodes as zeros in
/// every indicator column instead of growing the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherVocabulary {
    entries: Vec<VocabularyEntry>,
}

impl WeatherVocabulary {
    /// Builds a vocabulary from an explicit category set.
    ///
    /// Values are sorted and deduplicated; indicator column names that slugify
    /// identically get a numeric suffix.
    pub fn new(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();

        let mut taken: HashSet<String> = HashSet::new();
        let entries = values
            .into_iter()
            .map(|value| {
                let base = format!("description_{}", slugify(&value));
                let mut column = base.clone();
                let mut suffix = 2usize;
                while !taken.insert(column.clone()) {
                    column = format!("{base}_{suffix}");
                    suffix += 1;
                }
                VocabularyEntry { value, column }
            })
            .collect();

        Self { entries }
    }

    /// Fits the vocabulary from every description present in the weather table.
    pub fn from_weather(weather: &WeatherTable) -> RidecastResult<Self> {
        let vocabulary = Self::new(weather.descriptions()?);
        info!(
            categories = vocabulary.len(),
            "Fitted weather description vocabulary"
        );
        Ok(vocabulary)
    }

    pub fn from_json(s: &str) -> RidecastResult<Self> {
        Ok(serde_json::from_str(s).map_err(DataError::Json)?)
    }

    pub fn to_json(&self) -> RidecastResult<String> {
        Ok(serde_json::to_string(self).map_err(DataError::Json)?)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.column.as_str())
    }

    pub fn column_for(&self, value: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.column.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Encodes calendar and weather categories into model-ready columns.
///
/// The raw `hour_of_day` is replaced by a sine/cosine pair so hour 23 sits
/// next to hour 0, `day_of_week` becomes seven fixed indicators, and the
/// weather description is one-hot encoded against the fitted vocabulary.
#[derive(Debug, Clone)]
pub struct CalendarFeaturizer {
    vocabulary: WeatherVocabulary,
}

impl CalendarFeaturizer {
    pub fn new(vocabulary: WeatherVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &WeatherVocabulary {
        &self.vocabulary
    }

    pub fn transform(&self, buckets: &HourlyDemand) -> RidecastResult<HourlyDemand> {
        ensure_columns(
            buckets.as_df(),
            [
                HourlyCol::HourOfDay.as_str(),
                HourlyCol::DayOfWeek.as_str(),
                WeatherCol::Description.as_str(),
            ],
        )?;
        self.warn_unknown_descriptions(buckets.as_df())?;

        let mut exprs = cyclical_hour_exprs();
        exprs.extend(day_of_week_exprs());
        exprs.extend(self.description_exprs());

        let df = buckets
            .as_df()
            .clone()
            .lazy()
            .with_columns(exprs)
            .collect()
            .map_err(|e| stage_error("calendar featurization", e))?
            .drop_many([
                HourlyCol::HourOfDay.as_str(),
                HourlyCol::DayOfWeek.as_str(),
                WeatherCol::Description.as_str(),
            ]);

        info!(
            columns = df.width(),
            "Encoded calendar and weather categories"
        );

        Ok(HourlyDemand::from_sorted(df))
    }

    fn description_exprs(&self) -> Vec<Expr> {
        self.vocabulary
            .entries
            .iter()
            .map(|entry| {
                // Null or unseen descriptions yield zeros in every indicator.
                col(WeatherCol::Description)
                    .eq(lit(entry.value.clone()))
                    .fill_null(lit(false))
                    .cast(DataType::UInt32)
                    .alias(entry.column.as_str())
            })
            .collect()
    }

    fn warn_unknown_descriptions(&self, df: &DataFrame) -> RidecastResult<()> {
        let unique = df
            .column(WeatherCol::Description.as_str())
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .str()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .unique()
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        for value in unique.into_iter().flatten() {
            if self.vocabulary.column_for(value).is_none() {
                warn!(
                    description = %value,
                    "Weather description missing from fitted vocabulary; indicators stay zero"
                );
            }
        }

        Ok(())
    }
}

fn cyclical_hour_exprs() -> Vec<Expr> {
    let angle =
        col(HourlyCol::HourOfDay).cast(DataType::Float64) * lit(std::f64::consts::TAU / 24.0);
    vec![
        angle
            .clone()
            .sin()
            .alias(CalendarCol::Xhr)
            .cast(DataType::Float64),
        angle.cos().alias(CalendarCol::Yhr).cast(DataType::Float64),
    ]
}

fn day_of_week_exprs() -> Vec<Expr> {
    (0..7i32)
        .map(|day| {
            col(HourlyCol::DayOfWeek)
                .eq(lit(day))
                .fill_null(lit(false))
                .cast(DataType::UInt32)
                .alias(day_column(day))
        })
        .collect()
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_was_sep = true;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}
