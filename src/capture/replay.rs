use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use super::{CaptureError, Frame, FrameSource, MediaAccessError};

/// Offline source that cycles through the images in a directory.
///
/// Every call to [`FrameSource::current_frame`] advances to the next image,
/// which mimics a moving subject when training without a camera.
pub struct ReplaySource {
    dir: PathBuf,
    frames: Vec<Frame>,
    cursor: AtomicU64,
}

impl ReplaySource {
    pub fn open(dir: &Path) -> Result<Self, MediaAccessError> {
        let entries = fs::read_dir(dir).map_err(|err| {
            MediaAccessError::DeviceUnavailable(format!("{}: {err}", dir.display()))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let frames: Vec<Frame> = paths
            .iter()
            .filter_map(|path| match image::open(path) {
                Ok(img) => Some(img.to_rgb8()),
                Err(err) => {
                    log::debug!("Skipping {}: {err}", path.display());
                    None
                }
            })
            .enumerate()
            .map(|(idx, img)| Frame::new(img, idx as u64 + 1))
            .collect();

        if frames.is_empty() {
            return Err(MediaAccessError::DeviceUnavailable(format!(
                "no decodable images in {}",
                dir.display()
            )));
        }

        log::info!("Replaying {} frames from {}", frames.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            frames,
            cursor: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn current_frame(&self) -> Result<Frame, CaptureError> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % self.frames.len();
        self.frames.get(idx).cloned().ok_or(CaptureError::NotReady)
    }

    fn describe(&self) -> String {
        format!("replay of {} ({} frames)", self.dir.display(), self.frames.len())
    }
}
