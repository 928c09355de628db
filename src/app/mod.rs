pub mod bootstrap;
pub(crate) mod commands;
pub mod controller;
pub mod events;
pub mod state;

pub use controller::AppController;
pub use events::{AppEvent, EventSink};
pub use state::{AppError, AppPhase, AppStatus};
