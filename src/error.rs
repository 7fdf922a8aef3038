use thiserror::Error;

/// Everything that stops the launcher before or during playback.
///
/// Every variant ends the process with exit status 1. `Usage` and `Help`
/// are reported by printing the usage text instead of their message.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Malformed flags or a wrong number of positional arguments
    #[error("invalid command line")]
    Usage,

    /// `-h`, or no arguments at all
    #[error("help requested")]
    Help,

    #[error("Number of threads cannot be negative.")]
    NegativeThreads,

    #[error("Playback speed must be between 1 and 1000 frames per second.")]
    FrameRate,

    #[error("Frame number of first frame is greater than frame number of last frame.")]
    FrameOrder,

    #[error("Invalid {what} \"{value}\".")]
    InvalidNumber { what: &'static str, value: String },

    #[error("This program requires multi-threading support.")]
    NoThreadSupport,

    /// Error surfaced by the playback engine
    #[error("{0:#}")]
    Playback(anyhow::Error),
}

impl LaunchError {
    /// Whether this error is reported with the usage text.
    pub fn shows_usage(&self) -> bool {
        matches!(self, LaunchError::Usage | LaunchError::Help)
    }
}

pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn only_command_line_shape_errors_show_usage() {
        assert!(LaunchError::Usage.shows_usage());
        assert!(LaunchError::Help.shows_usage());
        assert!(!LaunchError::NegativeThreads.shows_usage());
        assert!(!LaunchError::FrameOrder.shows_usage());
        assert!(!LaunchError::Playback(anyhow!("boom")).shows_usage());
    }

    #[test]
    fn playback_errors_print_their_whole_chain() {
        let e = LaunchError::Playback(anyhow!("No such file").context("Cannot play back \"img.%.exr\""));
        assert_eq!(e.to_string(), "Cannot play back \"img.%.exr\": No such file");
    }
}
