//! forecast-classifiers: feature selection, classification and evaluation for
//! the health-forecast experiments.
//!
//! Datasets are binary-labelled genomic or genomic-epidemiological tables.
//! A [`pipeline::Pipeline`] chains imputation, scaling, optional resampling,
//! one feature-selection method (ANOVA, ReliefF or Lasso) and one classifier
//! (linear SVM, random forest or KNN). [`model_selection`] tunes the
//! classifier with a stratified grid search and [`results`] / [`report`]
//! persist what comes out of it.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod feature_selection;
pub mod metrics;
pub mod model_selection;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod results;
pub mod sampling;
