use anyhow::{bail, Result};
use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use image_hasher::{HashAlg, HasherConfig};

use crate::{capture::Frame, settings::EmbeddingSettings};

use super::{EmbeddingModel, FeatureVector};

const COLOR_WEIGHT: f32 = 0.5;
const HASH_WEIGHT: f32 = 0.5;
const HASH_SIZE: u32 = 8;

/// Built-in embedding: grayscale layout, coarse colour and a perceptual hash.
///
/// Cheap enough to run on every detection cycle on a CPU. A hand near the
/// face shifts all three parts at once, which is what nearest-neighbour
/// matching needs.
pub struct ThumbnailEmbedder {
    thumbnail_size: u32,
    color_size: u32,
    dimension: usize,
}

impl ThumbnailEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        if settings.thumbnail_size == 0 || settings.color_size == 0 {
            bail!("embedding sizes must be non-zero");
        }

        let mut embedder = Self {
            thumbnail_size: settings.thumbnail_size,
            color_size: settings.color_size,
            dimension: 0,
        };

        // Warm-up pass fixes the output dimension, hash bits included.
        let blank = RgbImage::new(settings.thumbnail_size, settings.thumbnail_size);
        embedder.dimension = embedder.embed(&blank).dim();

        log::info!(
            "Thumbnail embedder ready ({}px gray, {}px colour, {} dims)",
            embedder.thumbnail_size,
            embedder.color_size,
            embedder.dimension
        );
        Ok(embedder)
    }

    fn embed(&self, image: &RgbImage) -> FeatureVector {
        let mut values = Vec::with_capacity(self.dimension);

        let gray = imageops::grayscale(image);
        let gray = imageops::resize(&gray, self.thumbnail_size, self.thumbnail_size, FilterType::Triangle);
        let mut gray: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        center(&mut gray);
        push_weighted(&mut values, gray, 1.0);

        let color = imageops::resize(image, self.color_size, self.color_size, FilterType::Triangle);
        let color: Vec<f32> = color
            .pixels()
            .flat_map(|p| p.0.map(|channel| channel as f32 / 255.0))
            .collect();
        push_weighted(&mut values, color, COLOR_WEIGHT);

        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(HASH_SIZE, HASH_SIZE)
            .to_hasher();
        let hash = hasher.hash_image(&DynamicImage::ImageRgb8(image.clone()));
        let bits: Vec<f32> = hash
            .as_bytes()
            .iter()
            .flat_map(|byte| (0..8).map(move |bit| if byte >> bit & 1 == 1 { 1.0 } else { -1.0 }))
            .collect();
        push_weighted(&mut values, bits, HASH_WEIGHT);

        FeatureVector::new(values).l2_normalized()
    }
}

impl EmbeddingModel for ThumbnailEmbedder {
    fn infer(&self, frame: &Frame) -> Result<FeatureVector> {
        let image = frame.image();
        if image.width() == 0 || image.height() == 0 {
            bail!("cannot embed an empty frame");
        }
        Ok(self.embed(image))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn center(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter_mut().for_each(|v| *v -= mean);
}

/// Appends `part` scaled to length `weight`, so each part's influence is fixed
/// regardless of how many values it holds.
fn push_weighted(out: &mut Vec<f32>, part: Vec<f32>, weight: f32) {
    let norm = part.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        out.extend(std::iter::repeat(0.0).take(part.len()));
    } else {
        out.extend(part.into_iter().map(|v| v / norm * weight));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn embedder() -> ThumbnailEmbedder {
        ThumbnailEmbedder::load(&EmbeddingSettings::default()).unwrap()
    }

    fn split_frame(left: [u8; 3], right: [u8; 3], split: u32) -> Frame {
        let image = RgbImage::from_fn(64, 48, |x, _| if x < split { Rgb(left) } else { Rgb(right) });
        Frame::new(image, 1)
    }

    #[test]
    fn output_matches_declared_dimension_and_is_normalized() {
        let model = embedder();
        let vector = model.infer(&split_frame([10, 20, 30], [200, 180, 160], 32)).unwrap();
        assert_eq!(vector.dim(), model.dimension());
        assert!((vector.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn identical_frames_embed_identically() {
        let model = embedder();
        let a = model.infer(&split_frame([0, 0, 0], [255, 255, 255], 20)).unwrap();
        let b = model.infer(&split_frame([0, 0, 0], [255, 255, 255], 20)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn similar_scenes_are_closer_than_different_ones() {
        let model = embedder();
        let base = model.infer(&split_frame([20, 20, 20], [230, 230, 230], 20)).unwrap();
        let near = model.infer(&split_frame([22, 22, 22], [228, 228, 228], 21)).unwrap();
        let far = model.infer(&split_frame([230, 40, 40], [20, 20, 200], 50)).unwrap();
        assert!(base.cosine_similarity(&near) > base.cosine_similarity(&far));
    }

    #[test]
    fn zero_sizes_fail_to_load() {
        let settings = EmbeddingSettings {
            thumbnail_size: 0,
            ..EmbeddingSettings::default()
        };
        assert!(ThumbnailEmbedder::load(&settings).is_err());
    }
}
