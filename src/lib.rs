pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod launcher;
pub mod player;
pub mod ui;

pub use app::ViewerEngine;
pub use config::PlaybackConfig;
pub use error::LaunchError;
pub use launcher::{run, FastExit, PlaybackEngine};
