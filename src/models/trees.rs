//! Tree-ensemble families: random forest, bagging, and gradient boosting.
//!
//! All three delegate their base learners to `aprender::tree`. The random
//! forest is the library estimator as-is; bagging and boosting are the two
//! classic ensembling loops run over `DecisionTreeRegressor`.

use aprender::primitives::{Matrix, Vector};
use aprender::tree::{DecisionTreeRegressor, RandomForestRegressor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ModelFamily, Regressor};
use crate::error::{Result, RuidoError};
use crate::tuning::{cross_val_rmse, log_uniform, select_best, take_rows, take_values, TuningBudget};

/// Bags used by the untuned bagged-tree family.
const N_BAGS: usize = 25;

/// Random forest backed by `aprender::tree::RandomForestRegressor`.
pub struct RandomForestModel {
    n_estimators: usize,
    max_depth: usize,
    random_state: u64,
    inner: Option<RandomForestRegressor>,
}

impl RandomForestModel {
    pub fn new(n_estimators: usize, max_depth: usize, random_state: u64) -> Self {
        Self {
            n_estimators,
            max_depth,
            random_state,
            inner: None,
        }
    }
}

impl Regressor for RandomForestModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let mut forest = RandomForestRegressor::new(self.n_estimators)
            .with_max_depth(self.max_depth)
            .with_random_state(self.random_state);
        forest
            .fit(x, y)
            .map_err(|e| RuidoError::fit(ModelFamily::RandomForest.name(), e))?;
        self.inner = Some(forest);
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        match &self.inner {
            Some(forest) => forest.predict(x),
            None => Vector::from_vec(vec![0.0; x.shape().0]),
        }
    }

    fn selected(&self, names: &[String]) -> Option<Vec<String>> {
        let importances = self.inner.as_ref()?.feature_importances()?;
        Some(
            names
                .iter()
                .zip(importances)
                .filter(|(_, importance)| *importance > 0.0)
                .map(|(name, _)| name.clone())
                .collect(),
        )
    }
}

/// Bootstrap aggregation of unrestricted regression trees.
pub struct BaggedTreesModel {
    n_bags: usize,
    seed: u64,
    trees: Vec<DecisionTreeRegressor>,
}

impl BaggedTreesModel {
    pub fn new(n_bags: usize, seed: u64) -> Self {
        Self {
            n_bags,
            seed,
            trees: Vec::new(),
        }
    }
}

impl Regressor for BaggedTreesModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let n_rows = x.shape().0;
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees = Vec::with_capacity(self.n_bags);

        for _ in 0..self.n_bags {
            let indices: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let bag_x = take_rows(x, &indices);
            let bag_y = take_values(y, &indices);

            let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(5);
            tree.fit(&bag_x, &bag_y)
                .map_err(|e| RuidoError::fit(ModelFamily::BaggedTree.name(), e))?;
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let n_rows = x.shape().0;
        let mut sums = vec![0.0f32; n_rows];
        for tree in &self.trees {
            for (sum, &p) in sums.iter_mut().zip(tree.predict(x).as_slice()) {
                *sum += p;
            }
        }
        let n_trees = self.trees.len().max(1) as f32;
        Vector::from_vec(sums.into_iter().map(|s| s / n_trees).collect())
    }
}

/// Stagewise gradient boosting with squared-error residual fitting.
pub struct GradientBoostingModel {
    n_trees: usize,
    max_depth: usize,
    learning_rate: f32,
    init: f32,
    trees: Vec<DecisionTreeRegressor>,
}

impl GradientBoostingModel {
    pub fn new(n_trees: usize, max_depth: usize, learning_rate: f32) -> Self {
        Self {
            n_trees,
            max_depth,
            learning_rate,
            init: 0.0,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoostingModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let truth = y.as_slice();
        let n_rows = truth.len();
        if n_rows == 0 {
            return Err(RuidoError::fit(
                ModelFamily::BoostedTree.name(),
                "cannot fit with zero samples",
            ));
        }

        self.init = truth.iter().sum::<f32>() / n_rows as f32;
        self.trees = Vec::with_capacity(self.n_trees);
        let mut current: Vec<f32> = vec![self.init; n_rows];

        for _ in 0..self.n_trees {
            let residuals = Vector::from_vec(
                truth
                    .iter()
                    .zip(&current)
                    .map(|(&t, &c)| t - c)
                    .collect(),
            );

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(5);
            tree.fit(x, &residuals)
                .map_err(|e| RuidoError::fit(ModelFamily::BoostedTree.name(), e))?;

            for (c, &p) in current.iter_mut().zip(tree.predict(x).as_slice()) {
                *c += self.learning_rate * p;
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let n_rows = x.shape().0;
        let mut preds = vec![self.init; n_rows];
        for tree in &self.trees {
            for (pred, &p) in preds.iter_mut().zip(tree.predict(x).as_slice()) {
                *pred += self.learning_rate * p;
            }
        }
        Vector::from_vec(preds)
    }
}

/// Fits the untuned 25-bag ensemble.
pub fn fit_bagged(x: &Matrix<f32>, y: &Vector<f32>, seed: u64) -> Result<BaggedTreesModel> {
    let mut model = BaggedTreesModel::new(N_BAGS, seed);
    model.fit(x, y)?;
    Ok(model)
}

/// Random search over (n_estimators, max_depth), 10-fold CV.
pub fn tune_random_forest(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<RandomForestModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates: Vec<(usize, usize)> = (0..budget.random_candidates)
        .map(|_| (rng.gen_range(50..=250), rng.gen_range(4..=20)))
        .collect();

    let folds = budget.folds_for(x.shape().0);
    let ((n_estimators, max_depth), cv) =
        select_best(ModelFamily::RandomForest, candidates, |&(n, d)| {
            cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
                let mut model = RandomForestModel::new(n, d, seed);
                model.fit(train_x, train_y)?;
                Ok(model.predict(val_x))
            })
        })?;
    tracing::debug!(n_estimators, max_depth, cv, "random forest tuned");

    let mut model = RandomForestModel::new(n_estimators, max_depth, seed);
    model.fit(x, y)?;
    Ok(model)
}

/// Random search over (n_trees, depth, learning rate), 10-fold CV.
pub fn tune_boosted(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    budget: &TuningBudget,
    seed: u64,
) -> Result<GradientBoostingModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates: Vec<(usize, usize, f32)> = (0..budget.random_candidates)
        .map(|_| {
            (
                rng.gen_range(50..=250),
                rng.gen_range(1..=4),
                log_uniform(&mut rng, 0.01, 0.3) as f32,
            )
        })
        .collect();

    let folds = budget.folds_for(x.shape().0);
    let ((n_trees, depth, lr), cv) =
        select_best(ModelFamily::BoostedTree, candidates, |&(n, d, lr)| {
            cross_val_rmse(x, y, folds, seed, |train_x, train_y, val_x| {
                let mut model = GradientBoostingModel::new(n, d, lr);
                model.fit(train_x, train_y)?;
                Ok(model.predict(val_x))
            })
        })?;
    tracing::debug!(n_trees, depth, lr, cv, "boosted trees tuned");

    let mut model = GradientBoostingModel::new(n_trees, depth, lr);
    model.fit(x, y)?;
    Ok(model)
}
