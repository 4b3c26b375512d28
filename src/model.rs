use ndarray::{Array1, Array2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    data::Table,
    error::{DataError, RidecastResult},
    features::matrix::FeatureMatrix,
};

/// Repeated k-fold cross validation over a feature matrix.
///
/// Every repeat reshuffles the row indices with the next draw of the same
/// seeded generator, so a given configuration always produces the same folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedKFold {
    n_splits: u32,
    n_repeats: u32,
    seed: u64,
}

impl Default for RepeatedKFold {
    fn default() -> Self {
        Self {
            n_splits: 10,
            n_repeats: 3,
            seed: 1,
        }
    }
}

impl RepeatedKFold {
    pub fn new(n_splits: u32, n_repeats: u32, seed: u64) -> RidecastResult<Self> {
        if n_splits < 2 {
            return Err(DataError::InvalidSplit(format!(
                "cross validation needs at least 2 splits, got {n_splits}"
            ))
            .into());
        }
        if n_repeats == 0 {
            return Err(DataError::InvalidSplit(
                "cross validation needs at least 1 repeat".to_string(),
            )
            .into());
        }

        Ok(Self {
            n_splits,
            n_repeats,
            seed,
        })
    }

    pub fn n_splits(&self) -> u32 {
        self.n_splits
    }

    pub fn n_repeats(&self) -> u32 {
        self.n_repeats
    }

    /// Plans every train/test split for a matrix of `n_rows` rows.
    ///
    /// When `n_rows` is not divisible by the split count, the first
    /// `n_rows % n_splits` folds of each repeat take one extra row.
    pub fn folds(&self, n_rows: usize) -> RidecastResult<Vec<FoldPlan>> {
        let n_splits = self.n_splits as usize;
        if n_rows < n_splits {
            return Err(DataError::InvalidSplit(format!(
                "{n_rows} rows cannot fill {n_splits} folds"
            ))
            .into());
        }

        let base = n_rows / n_splits;
        let remainder = n_rows % n_splits;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut plans = Vec::with_capacity(n_splits * self.n_repeats as usize);

        for repeat in 0..self.n_repeats {
            let mut indices: Vec<usize> = (0..n_rows).collect();
            indices.shuffle(&mut rng);

            let mut offset = 0;
            for fold in 0..self.n_splits {
                let size = base + usize::from((fold as usize) < remainder);
                let test = indices[offset..offset + size].to_vec();
                let train: Vec<usize> = indices[..offset]
                    .iter()
                    .chain(indices[offset + size..].iter())
                    .copied()
                    .collect();
                offset += size;

                plans.push(FoldPlan {
                    repeat,
                    fold,
                    train,
                    test,
                });
            }
        }

        Ok(plans)
    }
}

/// Row indices of one train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPlan {
    pub repeat: u32,
    pub fold: u32,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// One fold's view of the exported design matrix.
#[derive(Debug)]
pub struct FoldData<'a> {
    features: &'a Array2<f64>,
    target: &'a Array1<f64>,
    plan: &'a FoldPlan,
}

impl FoldData<'_> {
    pub fn plan(&self) -> &FoldPlan {
        self.plan
    }

    pub fn train_features(&self) -> Array2<f64> {
        self.features.select(Axis(0), &self.plan.train)
    }

    pub fn train_target(&self) -> Array1<f64> {
        self.target.select(Axis(0), &self.plan.train)
    }

    pub fn test_features(&self) -> Array2<f64> {
        self.features.select(Axis(0), &self.plan.test)
    }

    pub fn test_target(&self) -> Array1<f64> {
        self.target.select(Axis(0), &self.plan.test)
    }
}

/// Score of one fold, labelled by its position in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub repeat: u32,
    pub fold: u32,
    pub score: f64,
}

/// Runs the scorer on every fold of the schedule, in parallel.
///
/// The design matrix is exported once and shared across folds; the scorer
/// typically fits a model on the train view and evaluates it on the test
/// view.
pub fn score_folds<F>(
    matrix: &FeatureMatrix,
    kfold: &RepeatedKFold,
    scorer: F,
) -> RidecastResult<Vec<FoldScore>>
where
    F: Fn(&FoldData) -> RidecastResult<f64> + Sync,
{
    let (features, target) = matrix.design_matrix()?;
    let plans = kfold.folds(matrix.height())?;

    let scores = plans
        .par_iter()
        .map(|plan| {
            let data = FoldData {
                features: &features,
                target: &target,
                plan,
            };
            let score = scorer(&data)?;
            Ok(FoldScore {
                repeat: plan.repeat,
                fold: plan.fold,
                score,
            })
        })
        .collect::<RidecastResult<Vec<_>>>()?;

    info!(folds = scores.len(), "Scored cross validation folds");
    Ok(scores)
}

/// Mean of the fold scores, or `None` for an empty schedule.
pub fn mean_score(scores: &[FoldScore]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64)
}
