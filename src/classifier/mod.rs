mod knn;

pub use knn::KnnClassifier;

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{embedding::FeatureVector, labels::Label};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidences: BTreeMap<Label, f32>,
}

impl ClassificationResult {
    pub fn confidence(&self, label: Label) -> f32 {
        self.confidences.get(&label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("classifier has no examples yet")]
    Empty,
    #[error("feature vector has {actual} dimensions, classifier expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub trait Classifier: Send {
    fn add_example(&mut self, vector: FeatureVector, label: Label) -> Result<(), ClassifierError>;

    fn predict_class(&self, vector: &FeatureVector) -> Result<ClassificationResult, ClassifierError>;

    fn example_counts(&self) -> BTreeMap<Label, usize>;

    fn total_examples(&self) -> usize {
        self.example_counts().values().sum()
    }
}
