#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Result;
use handsoff_lib::{
    alert::{AlertSink, CuePlayer, Notifier},
    app::{AppController, AppEvent, EventSink},
    capture::{CaptureError, Frame, FrameSource},
    classifier::{ClassificationResult, Classifier, ClassifierError, KnnClassifier},
    context::DetectorContext,
    embedding::{EmbeddingModel, FeatureVector},
    labels::Label,
    settings::Settings,
};
use image::{Rgb, RgbImage};

pub const SCENE_CLEAR: u8 = 10;
pub const SCENE_HAND: u8 = 240;

/// Camera whose picture is a flat colour the test can switch at any time.
pub struct SceneSource {
    shade: AtomicU8,
    seq: AtomicU64,
    ready: bool,
}

impl SceneSource {
    pub fn new(shade: u8) -> Arc<Self> {
        Arc::new(Self {
            shade: AtomicU8::new(shade),
            seq: AtomicU64::new(0),
            ready: true,
        })
    }

    pub fn without_frames() -> Arc<Self> {
        Arc::new(Self {
            shade: AtomicU8::new(0),
            seq: AtomicU64::new(0),
            ready: false,
        })
    }

    pub fn show(&self, shade: u8) {
        self.shade.store(shade, Ordering::SeqCst);
    }

    pub fn frames_served(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }
}

impl FrameSource for SceneSource {
    fn current_frame(&self) -> Result<Frame, CaptureError> {
        if !self.ready {
            return Err(CaptureError::NotReady);
        }
        let shade = self.shade.load(Ordering::SeqCst);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Frame::new(RgbImage::from_pixel(4, 4, Rgb([shade, 0, 0])), seq))
    }

    fn describe(&self) -> String {
        "scene".into()
    }
}

/// Deterministic embedding: the red channel of the first pixel against its complement.
pub struct ShadeEmbedder;

impl EmbeddingModel for ShadeEmbedder {
    fn infer(&self, frame: &Frame) -> Result<FeatureVector> {
        let shade = frame.image().get_pixel(0, 0).0[0] as f32 / 255.0;
        Ok(FeatureVector::new(vec![shade, 1.0 - shade]))
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Classifier that always answers with a fixed touched confidence.
pub struct FixedClassifier {
    pub touched_confidence: f32,
}

impl Classifier for FixedClassifier {
    fn add_example(&mut self, _vector: FeatureVector, _label: Label) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn predict_class(&self, _vector: &FeatureVector) -> Result<ClassificationResult, ClassifierError> {
        let mut confidences = BTreeMap::new();
        confidences.insert(Label::Touched, self.touched_confidence);
        confidences.insert(Label::NotTouching, 1.0 - self.touched_confidence);
        Ok(ClassificationResult {
            label: Label::Touched,
            confidences,
        })
    }

    fn example_counts(&self) -> BTreeMap<Label, usize> {
        BTreeMap::new()
    }
}

/// Classifier whose every prediction blocks for `delay`.
pub struct SlowClassifier {
    pub delay: Duration,
}

impl Classifier for SlowClassifier {
    fn add_example(&mut self, _vector: FeatureVector, _label: Label) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn predict_class(&self, _vector: &FeatureVector) -> Result<ClassificationResult, ClassifierError> {
        std::thread::sleep(self.delay);
        Err(ClassifierError::Empty)
    }

    fn example_counts(&self) -> BTreeMap<Label, usize> {
        BTreeMap::new()
    }
}

#[derive(Default)]
pub struct CountingCue {
    plays: AtomicUsize,
}

impl CountingCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl CuePlayer for CountingCue {
    fn play_cue(&self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push((title.into(), body.into()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingEvents {
    pub fn progress(&self) -> Vec<f64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                AppEvent::TrainingProgress(progress) => Some(progress.percent),
                _ => None,
            })
            .collect()
    }

    pub fn touched_changes(&self) -> Vec<bool> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                AppEvent::TouchedChanged(change) => Some(change.touched),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.training.iterations = 10;
    settings.training.sample_interval_ms = 1;
    settings.detection.interval_ms = 5;
    settings
}

pub struct Harness {
    pub controller: AppController,
    pub cue: Arc<CountingCue>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<RecordingEvents>,
}

impl Harness {
    pub fn new(settings: &Settings) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let cue = Arc::new(CountingCue::default());
        let events = Arc::new(RecordingEvents::default());
        let alerts = Arc::new(AlertSink::new(cue.clone(), notifier.clone(), &settings.alert));
        let controller = AppController::new(settings, alerts, events.clone());
        Self {
            controller,
            cue,
            notifier,
            events,
        }
    }

    /// Boots the controller around `source` with a real kNN classifier.
    pub async fn ready_with(settings: &Settings, source: Arc<SceneSource>) -> Self {
        let harness = Self::new(settings);
        let k = settings.detection.k;
        harness
            .controller
            .initialize(async move {
                Ok(DetectorContext::new(source, Arc::new(ShadeEmbedder), KnnClassifier::new(k)))
            })
            .await
            .unwrap();
        harness
    }
}

pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub async fn settle<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("operation did not finish in time")
}
