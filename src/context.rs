use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    capture::FrameSource,
    classifier::{ClassificationResult, Classifier},
    embedding::EmbeddingModel,
    labels::Label,
};

/// Everything training and detection share: the camera, the embedding model
/// and the single classifier instance that owns the example set.
///
/// Built once by initialization; training and detection never run at the
/// same time, so the classifier lock is uncontended in practice.
pub struct DetectorContext {
    source: Arc<dyn FrameSource>,
    embedder: Arc<dyn EmbeddingModel>,
    classifier: Mutex<Box<dyn Classifier>>,
}

impl DetectorContext {
    pub fn new(
        source: Arc<dyn FrameSource>,
        embedder: Arc<dyn EmbeddingModel>,
        classifier: impl Classifier + 'static,
    ) -> Self {
        Self {
            source,
            embedder,
            classifier: Mutex::new(Box::new(classifier)),
        }
    }

    pub fn source(&self) -> &Arc<dyn FrameSource> {
        &self.source
    }

    /// Captures the current frame and stores its embedding under `label`.
    /// Blocking; run it on a blocking worker.
    pub fn learn_current_frame(&self, label: Label) -> Result<()> {
        let frame = self.source.current_frame().context("no frame to train on")?;
        let vector = self.embedder.infer(&frame).context("embedding failed")?;
        self.classifier().add_example(vector, label)?;
        Ok(())
    }

    /// Captures the current frame and classifies it. Blocking.
    pub fn classify_current_frame(&self) -> Result<ClassificationResult> {
        let frame = self.source.current_frame().context("no frame to classify")?;
        let vector = self.embedder.infer(&frame).context("embedding failed")?;
        let result = self.classifier().predict_class(&vector)?;
        Ok(result)
    }

    pub fn example_counts(&self) -> BTreeMap<Label, usize> {
        self.classifier().example_counts()
    }

    fn classifier(&self) -> MutexGuard<'_, Box<dyn Classifier>> {
        self.classifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
