use image::RgbImage;
use std::{
    io::{BufRead, BufReader, ErrorKind, Read},
    process::{Child, ChildStdout, Command, Stdio},
    sync::{
        mpsc::{self, RecvTimeoutError, SyncSender},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use crate::settings::CameraSettings;

use super::{CaptureError, Frame, FrameSource, MediaAccessError};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Default)]
struct LatestFrame {
    frame: Option<Frame>,
    closed: bool,
}

/// Live camera read through an `ffmpeg` child process emitting raw RGB frames.
///
/// The device stays open for as long as this value lives.
pub struct FfmpegCamera {
    latest: Arc<Mutex<LatestFrame>>,
    child: Mutex<Child>,
    reader: Mutex<Option<JoinHandle<()>>>,
    description: String,
}

impl FfmpegCamera {
    /// Opens the camera and blocks until the first frame has been decoded.
    pub fn acquire(settings: &CameraSettings) -> Result<Self, MediaAccessError> {
        let args = ffmpeg_args(settings);
        log_info!("Opening camera: {} {}", settings.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => MediaAccessError::BackendMissing(settings.ffmpeg_path.clone()),
                ErrorKind::PermissionDenied => MediaAccessError::PermissionDenied(err.to_string()),
                _ => MediaAccessError::Io(err),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaAccessError::DeviceUnavailable("ffmpeg stdout unavailable".into()))?;
        let stderr_tail = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            thread::Builder::new()
                .name("camera-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        log_debug!("ffmpeg: {line}");
                        let mut guard = lock(&tail);
                        guard.push_str(&line);
                        guard.push('\n');
                        if guard.len() > STDERR_TAIL_BYTES {
                            let cut = guard.len() - STDERR_TAIL_BYTES;
                            let cut = (cut..guard.len())
                                .find(|idx| guard.is_char_boundary(*idx))
                                .unwrap_or(guard.len());
                            guard.drain(..cut);
                        }
                    }
                })?;
        }

        let latest = Arc::new(Mutex::new(LatestFrame::default()));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<()>(1);
        let reader = {
            let latest = Arc::clone(&latest);
            let (width, height) = (settings.width, settings.height);
            thread::Builder::new()
                .name("camera-reader".to_string())
                .spawn(move || read_frames(stdout, width, height, latest, ready_tx))?
        };

        let camera = Self {
            latest,
            child: Mutex::new(child),
            reader: Mutex::new(Some(reader)),
            description: format!(
                "ffmpeg camera {} ({}x{})",
                settings.device.as_deref().unwrap_or(default_device()),
                settings.width,
                settings.height
            ),
        };

        match ready_rx.recv_timeout(settings.acquire_timeout()) {
            Ok(()) => {
                log_info!("Camera streaming: {}", camera.description);
                Ok(camera)
            }
            Err(RecvTimeoutError::Timeout) => Err(MediaAccessError::NoFrames(settings.acquire_timeout())),
            Err(RecvTimeoutError::Disconnected) => {
                // Give the stderr thread a moment to flush the reason ffmpeg exited.
                let _ = lock(&camera.child).wait();
                thread::sleep(std::time::Duration::from_millis(50));
                let tail = lock(&stderr_tail).clone();
                Err(classify_failure(&tail))
            }
        }
    }
}

impl FrameSource for FfmpegCamera {
    fn current_frame(&self) -> Result<Frame, CaptureError> {
        let guard = lock(&self.latest);
        if guard.closed {
            return Err(CaptureError::StreamClosed);
        }
        guard.frame.clone().ok_or(CaptureError::NotReady)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for FfmpegCamera {
    fn drop(&mut self) {
        let mut child = lock(&self.child);
        if let Err(err) = child.kill() {
            if err.kind() != ErrorKind::InvalidInput {
                log_warn!("Failed to stop camera process: {err}");
            }
        }
        let _ = child.wait();
        drop(child);

        if let Some(handle) = lock(&self.reader).take() {
            if handle.join().is_err() {
                log_error!("Camera reader thread panicked");
            }
        }
    }
}

fn read_frames(
    mut stdout: ChildStdout,
    width: u32,
    height: u32,
    latest: Arc<Mutex<LatestFrame>>,
    ready_tx: SyncSender<()>,
) {
    let frame_len = width as usize * height as usize * 3;
    let mut ready_tx = Some(ready_tx);
    let mut seq: u64 = 0;

    loop {
        let mut buf = vec![0u8; frame_len];
        if let Err(err) = stdout.read_exact(&mut buf) {
            if err.kind() != ErrorKind::UnexpectedEof {
                log_error!("Camera stream read failed: {err}");
            }
            break;
        }

        let Some(image) = RgbImage::from_raw(width, height, buf) else {
            log_warn!("Discarding malformed camera frame");
            continue;
        };

        seq = seq.wrapping_add(1);
        lock(&latest).frame = Some(Frame::new(image, seq));

        if let Some(tx) = ready_tx.take() {
            let _ = tx.send(());
        }
    }

    lock(&latest).closed = true;
    log_info!("Camera stream ended after {seq} frames");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(target_os = "linux")]
fn default_device() -> &'static str {
    "/dev/video0"
}

#[cfg(target_os = "macos")]
fn default_device() -> &'static str {
    "0"
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn default_device() -> &'static str {
    "Integrated Camera"
}

fn input_args(settings: &CameraSettings) -> Vec<String> {
    let device = settings.device.as_deref().unwrap_or(default_device());
    let fps = settings.fps.max(1).to_string();

    if cfg!(target_os = "linux") {
        vec![
            "-f".into(),
            "v4l2".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            device.into(),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "-f".into(),
            "avfoundation".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            device.into(),
        ]
    } else {
        vec![
            "-f".into(),
            "dshow".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            format!("video={device}"),
        ]
    }
}

fn ffmpeg_args(settings: &CameraSettings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
    ];
    args.extend(input_args(settings));
    args.extend([
        "-vf".into(),
        format!("scale={}:{}", settings.width, settings.height),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-f".into(),
        "rawvideo".into(),
        "-".into(),
    ]);
    args
}

fn classify_failure(stderr: &str) -> MediaAccessError {
    let lowered = stderr.to_ascii_lowercase();
    let reason = stderr.trim().lines().last().unwrap_or("ffmpeg exited").to_string();

    if lowered.contains("permission denied") || lowered.contains("not authorized") {
        MediaAccessError::PermissionDenied(reason)
    } else {
        MediaAccessError::DeviceUnavailable(reason)
    }
}
