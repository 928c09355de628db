pub mod controller;
pub mod decision;
pub mod loop_worker;

pub use controller::DetectionController;
pub use decision::decide;
pub use loop_worker::{detection_loop, CycleOutcome, DetectionObserver};
