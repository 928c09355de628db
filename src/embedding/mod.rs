//! Frame embeddings: turning a camera frame into a fixed-length vector the
//! classifier can compare.

mod thumbnail;

pub use thumbnail::ThumbnailEmbedder;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Unit-length copy. A zero vector stays zero.
    pub fn l2_normalized(&self) -> Self {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return self.clone();
        }
        Self(self.0.iter().map(|v| v / norm).collect())
    }

    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        let denom = self.norm() * other.norm();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        let dot: f32 = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum();
        dot / denom
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

pub trait EmbeddingModel: Send + Sync {
    fn infer(&self, frame: &Frame) -> Result<FeatureVector>;

    fn dimension(&self) -> usize;
}
