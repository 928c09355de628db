use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use std::{sync::Arc, time::Instant};

#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    seq: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self {
            image: Arc::new(image),
            seq,
            captured_at: Instant::now(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn to_jpeg_data_url(&self, quality: u8) -> Result<String> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(self.image.as_ref())
            .context("failed to encode preview frame")?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes)))
    }
}
