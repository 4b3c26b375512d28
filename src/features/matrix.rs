use ndarray::{Array1, Array2};
use polars::{
    frame::DataFrame,
    prelude::{DataType, PlSmallStr},
};
use tracing::info;

use crate::{
    data::{Table, ensure_columns},
    error::{DataError, RidecastError, RidecastResult},
    features::hourly::{HourlyCol, HourlyDemand},
};

/// Model-ready feature table: `demand` first, engineered features after.
///
/// Rows keep the chronological order of the underlying bucket series; the
/// bucket timestamp itself is not a feature and is dropped on conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    df: DataFrame,
}

impl Table for FeatureMatrix {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl TryFrom<&HourlyDemand> for FeatureMatrix {
    type Error = RidecastError;

    fn try_from(buckets: &HourlyDemand) -> RidecastResult<Self> {
        let df = buckets.as_df();
        ensure_columns(df, [HourlyCol::Demand.as_str()])?;

        let mut ordered: Vec<PlSmallStr> = vec![HourlyCol::Demand.name()];
        for name in df.get_column_names_owned() {
            if name.as_str() == HourlyCol::Demand.as_str()
                || name.as_str() == HourlyCol::Hour.as_str()
            {
                continue;
            }
            ordered.push(name);
        }

        let df = df
            .select(ordered)
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        for (name, dtype) in df.schema().iter() {
            if !is_numeric(dtype) {
                return Err(DataError::DataFrame(format!(
                    "non-numeric column '{name}' ({dtype}) cannot enter the feature matrix"
                ))
                .into());
            }
        }

        Ok(Self { df })
    }
}

impl FeatureMatrix {
    /// Feature column names, in matrix column order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .iter()
            .skip(1)
            .map(|s| s.as_str())
            .collect()
    }

    /// The demand column as a float vector.
    pub fn target(&self) -> RidecastResult<Array1<f64>> {
        Ok(Array1::from(
            self.column_as_f64(HourlyCol::Demand.as_str())?,
        ))
    }

    /// Exports features and target as dense float arrays.
    ///
    /// Remaining nulls become NaN so missing values stay visible to the
    /// caller instead of silently turning into zeros.
    pub fn design_matrix(&self) -> RidecastResult<(Array2<f64>, Array1<f64>)> {
        let height = self.df.height();
        let names: Vec<String> = self
            .feature_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            columns.push(self.column_as_f64(name)?);
        }

        let features = Array2::from_shape_fn((height, columns.len()), |(row, col)| {
            columns[col][row]
        });
        let target = self.target()?;

        Ok((features, target))
    }

    /// Splits the matrix into a leading train part and a trailing test part,
    /// preserving the chronological row order.
    pub fn chronological_split(&self, train_fraction: f64) -> RidecastResult<(Self, Self)> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(DataError::InvalidSplit(format!(
                "train fraction must lie strictly between 0 and 1, got {train_fraction}"
            ))
            .into());
        }

        let height = self.df.height();
        let n_train = (height as f64 * train_fraction).floor() as usize;
        if n_train == 0 || n_train == height {
            return Err(DataError::InvalidSplit(format!(
                "{height} rows cannot be split with train fraction {train_fraction}"
            ))
            .into());
        }

        let train = Self {
            df: self.df.slice(0, n_train),
        };
        let test = Self {
            df: self.df.slice(n_train as i64, height - n_train),
        };

        info!(
            train = train.height(),
            test = test.height(),
            "Split feature matrix chronologically"
        );

        Ok((train, test))
    }

    fn column_as_f64(&self, name: &str) -> RidecastResult<Vec<f64>> {
        let column = self
            .df
            .column(name)
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .cast(&DataType::Float64)
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        let values = column
            .f64()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();

        Ok(values)
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
    )
}
