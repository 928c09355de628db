use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    capture::{FfmpegCamera, FrameSource, MediaAccessError, ReplaySource},
    classifier::KnnClassifier,
    context::DetectorContext,
    embedding::{EmbeddingModel, ThumbnailEmbedder},
    settings::{CameraBackend, CameraSettings, Settings},
};

/// Opens the camera, loads the embedding model and creates an empty classifier.
pub async fn bootstrap(settings: Settings) -> Result<DetectorContext> {
    let camera_settings = settings.camera.clone();
    let source = tokio::task::spawn_blocking(move || open_source(&camera_settings))
        .await
        .context("camera worker join failed")??;
    log::info!("Camera ready: {}", source.describe());

    let embedding_settings = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || ThumbnailEmbedder::load(&embedding_settings))
        .await
        .context("model loader join failed")?
        .context("failed to load embedding model")?;
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(embedder);
    log::info!("Embedding model ready ({} dims)", embedder.dimension());

    Ok(DetectorContext::new(
        source,
        embedder,
        KnnClassifier::new(settings.detection.k),
    ))
}

pub fn open_source(settings: &CameraSettings) -> Result<Arc<dyn FrameSource>, MediaAccessError> {
    match settings.backend {
        CameraBackend::Ffmpeg => Ok(Arc::new(FfmpegCamera::acquire(settings)?)),
        CameraBackend::Replay => {
            let dir = settings.replay_dir.as_ref().ok_or_else(|| {
                MediaAccessError::DeviceUnavailable("camera.replayDir is not set".into())
            })?;
            Ok(Arc::new(ReplaySource::open(dir)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Label;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn replay_backend_boots_a_working_context() {
        let dir = tempfile::tempdir().unwrap();
        for (idx, shade) in [30u8, 220].into_iter().enumerate() {
            RgbImage::from_pixel(32, 24, Rgb([shade, shade, shade]))
                .save(dir.path().join(format!("{idx}.png")))
                .unwrap();
        }

        let mut settings = Settings::default();
        settings.camera.backend = CameraBackend::Replay;
        settings.camera.replay_dir = Some(dir.path().to_path_buf());

        let ctx = bootstrap(settings).await.unwrap();
        assert!(ctx.example_counts().is_empty());
        ctx.learn_current_frame(Label::NotTouching).unwrap();
        let result = ctx.classify_current_frame().unwrap();
        assert_eq!(result.label, Label::NotTouching);
    }

    #[tokio::test]
    async fn replay_backend_without_directory_fails() {
        let mut settings = Settings::default();
        settings.camera.backend = CameraBackend::Replay;

        let err = bootstrap(settings).await.err().unwrap();
        let media = err.downcast_ref::<MediaAccessError>().unwrap();
        assert!(matches!(media, MediaAccessError::DeviceUnavailable(_)));
    }
}
