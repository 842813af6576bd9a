//! Ruido - simulation study of noise-predictor robustness
//!
//! This library quantifies how the predictive performance and
//! variable-selection behavior of ten regression model families degrade as
//! irrelevant ("noise") predictors are appended to a nonlinear regression
//! problem, across two training sizes and 100 repeated seeds.
//!
//! Model fitting is delegated to `aprender`; this crate is the experimental
//! design: data generation, cross-validated tuning, a parallel sweep runner,
//! and artifact aggregation.

pub mod aggregate;
pub mod artifact;
pub mod cli;
pub mod datagen;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod models;
pub mod runner;
pub mod tuning;
