//! Camera frame sources.
//!
//! A source is acquired once at startup and then polled for its latest
//! frame by both training and detection. Acquisition is the only fallible
//! step a caller has to plan for; reading the current frame afterwards is
//! synchronous and cheap.

mod ffmpeg;
mod frame;
mod replay;

pub use ffmpeg::FfmpegCamera;
pub use frame::Frame;
pub use replay::ReplaySource;

use thiserror::Error;

/// Why a camera could not be opened.
#[derive(Debug, Error)]
pub enum MediaAccessError {
    #[error("capture backend `{0}` is not installed")]
    BackendMissing(String),
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no usable camera: {0}")]
    DeviceUnavailable(String),
    #[error("camera opened but produced no frame within {0:?}")]
    NoFrames(std::time::Duration),
    #[error("camera i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no frame has been decoded yet")]
    NotReady,
    #[error("frame stream closed")]
    StreamClosed,
}

pub trait FrameSource: Send + Sync {
    /// Latest frame produced by the device.
    fn current_frame(&self) -> Result<Frame, CaptureError>;

    fn describe(&self) -> String;
}
