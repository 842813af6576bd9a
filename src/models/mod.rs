//! The ten regression model families and their shared trainer contract.
//!
//! Every family implements [`Regressor`]: fit on a training design, predict
//! on held-out rows, and optionally report the predictors the fitted model
//! retained. Families backed directly by `aprender` estimators wrap them;
//! the rest are thin compositions over `aprender` primitives (its trees,
//! linear fitters, scaler, and Cholesky solver).

use std::fmt;

use aprender::primitives::{Matrix, Vector};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::datagen::SimulatedDataset;
use crate::error::Result;
use crate::tuning::{tuning_seed, TuningBudget};

pub mod cubist;
pub mod knn;
pub mod linear;
pub mod mars;
pub mod nn;
pub mod svm;
pub mod trees;

/// The model families under study.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    /// Ordinary least squares with the two engineered interaction columns.
    Linear,
    /// Elastic net on the same engineered design.
    Glmnet,
    /// Multivariate adaptive regression splines.
    Mars,
    /// Radial-basis kernel machine.
    Svm,
    /// k-nearest-neighbor averaging.
    Knn,
    /// Single-hidden-layer neural network.
    Nnet,
    /// Bootstrap-aggregated regression trees.
    BaggedTree,
    /// Random forest.
    RandomForest,
    /// Committee of rule-local linear models.
    Cubist,
    /// Gradient-boosted regression trees.
    BoostedTree,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 10] = [
        ModelFamily::Linear,
        ModelFamily::Glmnet,
        ModelFamily::Mars,
        ModelFamily::Svm,
        ModelFamily::Knn,
        ModelFamily::Nnet,
        ModelFamily::BaggedTree,
        ModelFamily::RandomForest,
        ModelFamily::Cubist,
        ModelFamily::BoostedTree,
    ];

    /// Stable name used in records, artifacts, and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Linear => "linear",
            ModelFamily::Glmnet => "glmnet",
            ModelFamily::Mars => "mars",
            ModelFamily::Svm => "svm",
            ModelFamily::Knn => "knn",
            ModelFamily::Nnet => "nnet",
            ModelFamily::BaggedTree => "bagged-tree",
            ModelFamily::RandomForest => "random-forest",
            ModelFamily::Cubist => "cubist",
            ModelFamily::BoostedTree => "boosted-tree",
        }
    }

    /// Inverse of [`ModelFamily::name`].
    pub fn from_name(name: &str) -> Option<ModelFamily> {
        ModelFamily::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Position in [`ModelFamily::ALL`]; feeds the tuning-seed derivation.
    pub fn index(self) -> usize {
        ModelFamily::ALL
            .iter()
            .position(|f| *f == self)
            .expect("family is a member of ALL")
    }

    /// Informative-predictor count for selection scoring: 22 for the two
    /// linear families (the engineered interactions count), 20 otherwise.
    pub fn n_informative(self) -> usize {
        match self {
            ModelFamily::Linear | ModelFamily::Glmnet => 22,
            _ => crate::datagen::N_INFORMATIVE,
        }
    }

    /// Whether the family reports a retained-predictor set.
    pub fn has_selection(self) -> bool {
        matches!(
            self,
            ModelFamily::Linear
                | ModelFamily::Glmnet
                | ModelFamily::Mars
                | ModelFamily::Cubist
                | ModelFamily::RandomForest
        )
    }

    /// Random search for the black-box families, grids for the rest.
    pub fn uses_random_search(self) -> bool {
        matches!(
            self,
            ModelFamily::Svm
                | ModelFamily::Nnet
                | ModelFamily::RandomForest
                | ModelFamily::BoostedTree
        )
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trainer contract shared by all families.
///
/// Mirrors `aprender::traits::Estimator`, with the optional selection
/// capability the study needs on top.
pub trait Regressor {
    /// Fits the model to a training design.
    ///
    /// # Errors
    ///
    /// Returns a `Fit` error on degenerate input or solver failure.
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()>;

    /// Predicts responses for each row of `x`.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32>;

    /// Predictor names the fitted model retained, for families with
    /// intrinsic feature selection. `None` means the capability is absent,
    /// which is distinct from an empty selection.
    fn selected(&self, _names: &[String]) -> Option<Vec<String>> {
        None
    }
}

/// Output of one cell's fit: held-out predictions and, where the family
/// supports it, the retained predictor names.
#[derive(Debug, Clone)]
pub struct CellOutcome {
    pub predictions: Vector<f32>,
    pub selected: Option<Vec<String>>,
}

/// Fits one family on the training realization and predicts the test set.
///
/// Tuning (where applicable) runs inside, seeded from (cell seed, family).
/// The two linear families receive the engineered interaction columns; all
/// other families see the raw design.
///
/// # Errors
///
/// A failure here fails this single cell only; callers log and continue.
pub fn fit_and_predict(
    family: ModelFamily,
    train: &SimulatedDataset,
    test: &SimulatedDataset,
    budget: &TuningBudget,
    cell_seed: u64,
) -> Result<CellOutcome> {
    let seed = tuning_seed(cell_seed, family);
    let engineered = matches!(family, ModelFamily::Linear | ModelFamily::Glmnet);

    let (train_x, names) = if engineered {
        linear::augment_with_interactions(&train.x, &train.names)
    } else {
        (train.x.clone(), train.names.clone())
    };
    let test_x = if engineered {
        linear::augment_with_interactions(&test.x, &test.names).0
    } else {
        test.x.clone()
    };

    let model: Box<dyn Regressor> = match family {
        ModelFamily::Linear => Box::new(linear::fit_linear(&train_x, &train.y)?),
        ModelFamily::Glmnet => Box::new(linear::tune_glmnet(&train_x, &train.y, budget, seed)?),
        ModelFamily::Mars => Box::new(mars::tune(&train_x, &train.y, budget, seed)?),
        ModelFamily::Svm => Box::new(svm::tune(&train_x, &train.y, budget, seed)?),
        ModelFamily::Knn => Box::new(knn::tune(&train_x, &train.y, budget, seed)?),
        ModelFamily::Nnet => Box::new(nn::tune(&train_x, &train.y, budget, seed)?),
        ModelFamily::BaggedTree => Box::new(trees::fit_bagged(&train_x, &train.y, seed)?),
        ModelFamily::RandomForest => {
            Box::new(trees::tune_random_forest(&train_x, &train.y, budget, seed)?)
        }
        ModelFamily::Cubist => Box::new(cubist::tune(&train_x, &train.y, budget, seed)?),
        ModelFamily::BoostedTree => {
            Box::new(trees::tune_boosted(&train_x, &train.y, budget, seed)?)
        }
    };

    let predictions = model.predict(&test_x);
    let selected = model.selected(&names);
    debug_assert_eq!(selected.is_some(), family.has_selection());

    Ok(CellOutcome {
        predictions,
        selected,
    })
}
