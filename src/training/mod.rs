pub mod controller;

pub use controller::{progress_percent, TrainingController, TrainingSummary};
