use std::ffi::OsString;

use crate::error::{LaunchError, LaunchResult};

/// Lowest accepted playback rate in frames per second
pub const MIN_FPS: f32 = 1.0;
/// Highest accepted playback rate in frames per second
pub const MAX_FPS: f32 = 1000.0;

/// Validated playback settings, built once from the command line and
/// handed to the playback engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// File name with a `%` where the frame number goes
    pub file_name_template: OsString,
    pub first_frame: i32,
    pub last_frame: i32,
    /// Number of loader threads, 0 selects the engine's default
    pub threads: u32,
    /// Playback rate; `None` lets the engine choose
    pub fps: Option<f32>,
    /// CTL transform names in command-line order
    pub transforms: Vec<String>,
}

impl PlaybackConfig {
    /// A single-frame configuration with every option at its default.
    pub fn new(file_name_template: impl Into<OsString>) -> Self {
        Self {
            file_name_template: file_name_template.into(),
            first_frame: 1,
            last_frame: 1,
            threads: 0,
            fps: None,
            transforms: Vec::new(),
        }
    }
}

pub fn validate_threads(threads: i64) -> LaunchResult<u32> {
    if threads < 0 {
        return Err(LaunchError::NegativeThreads);
    }
    u32::try_from(threads).map_err(|_| LaunchError::InvalidNumber {
        what: "number of threads",
        value: threads.to_string(),
    })
}

pub fn validate_fps(fps: f32) -> LaunchResult<f32> {
    // NaN fails the range check as well
    if (MIN_FPS..=MAX_FPS).contains(&fps) {
        Ok(fps)
    } else {
        Err(LaunchError::FrameRate)
    }
}

pub fn validate_frame_range(first: i32, last: i32) -> LaunchResult<(i32, i32)> {
    if first > last {
        Err(LaunchError::FrameOrder)
    } else {
        Ok((first, last))
    }
}
