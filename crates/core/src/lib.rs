pub mod calibration;
pub mod canvas;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logger;
pub mod platform;
pub mod protocol;
pub mod runner;
pub mod session;
pub mod settings;
pub mod sleep;
pub mod types;
pub mod verify;

pub use error::{BrushError, Result};
