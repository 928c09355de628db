use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingSettings {
    pub iterations: u32,
    pub sample_interval_ms: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            iterations: 50,
            sample_interval_ms: 100,
        }
    }
}

impl TrainingSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionSettings {
    /// A cycle counts as touched only when the touched confidence is strictly above this.
    pub threshold: f32,
    pub interval_ms: u64,
    /// Neighbours consulted per prediction.
    pub k: usize,
    pub cycle_timeout_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            interval_ms: 230,
            k: 3,
            cycle_timeout_ms: 5_000,
        }
    }
}

impl DetectionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertSettings {
    pub cooldown_ms: u64,
    pub title: String,
    pub body: String,
    /// Optional sound file; the built-in chime plays when unset.
    pub sound_path: Option<PathBuf>,
    pub volume: f32,
    /// When off, alerts are written to the log instead of the OS notification centre.
    pub desktop_notifications: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 3_000,
            title: "Hands off your face".into(),
            body: "Looks like you just touched your face.".into(),
            sound_path: None,
            volume: 1.0,
            desktop_notifications: true,
        }
    }
}

impl AlertSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CameraBackend {
    Ffmpeg,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub backend: CameraBackend,
    /// Platform device name; `None` picks the first camera.
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub acquire_timeout_ms: u64,
    pub replay_dir: Option<PathBuf>,
    pub ffmpeg_path: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Ffmpeg,
            device: None,
            width: 320,
            height: 240,
            fps: 15,
            acquire_timeout_ms: 10_000,
            replay_dir: None,
            ffmpeg_path: "ffmpeg".into(),
        }
    }
}

impl CameraSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    pub thumbnail_size: u32,
    pub color_size: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 16,
            color_size: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub training: TrainingSettings,
    pub detection: DetectionSettings,
    pub alert: AlertSettings,
    pub camera: CameraSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.training.iterations == 0 {
            bail!("training.iterations must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.detection.threshold) {
            bail!(
                "detection.threshold must be within [0, 1], got {}",
                self.detection.threshold
            );
        }
        if self.detection.k == 0 {
            bail!("detection.k must be greater than zero");
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            bail!("camera frame size must be non-zero");
        }
        if self.embedding.thumbnail_size == 0 || self.embedding.color_size == 0 {
            bail!("embedding sizes must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.alert.volume) {
            bail!("alert.volume must be within [0, 1], got {}", self.alert.volume);
        }
        Ok(())
    }

    /// Names of the changed settings that only take effect after a restart.
    /// Training and detection timing apply from the next run and volume
    /// applies at once, so neither is listed.
    pub fn restart_required_changes(&self, updated: &Settings) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let alert_without_volume = AlertSettings {
            volume: self.alert.volume,
            ..updated.alert.clone()
        };
        if self.alert != alert_without_volume {
            changed.push("alert");
        }
        if self.camera != updated.camera {
            changed.push("camera");
        }
        if self.embedding != updated.embedding {
            changed.push("embedding");
        }
        if self.detection.k != updated.detection.k {
            changed.push("detection.k");
        }
        changed
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) if settings.validate().is_ok() => settings,
                Ok(_) | Err(_) => {
                    log::warn!(
                        "Ignoring invalid settings at {}; using defaults",
                        path.display()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> Settings {
        self.read().clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
