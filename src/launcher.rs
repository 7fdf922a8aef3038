//! Validate, check preconditions, play, and turn the outcome into an exit
//! status.

use std::ffi::OsString;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

use crate::cli::{parse_args, usage};
use crate::config::PlaybackConfig;
use crate::error::LaunchError;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// The playback library the launcher hands a validated configuration to.
pub trait PlaybackEngine {
    /// Play the sequence and return once playback has ended.
    ///
    /// `fast_exit` may be used by the engine to end the process from its
    /// window-close path.
    fn play(&mut self, config: &PlaybackConfig, fast_exit: FastExit) -> anyhow::Result<()>;
}

/// Capability to end the process immediately with the exit status
/// recorded so far.
///
/// Terminating this way skips the windowing toolkit's teardown, which is
/// not safe while loader threads are still running. It is only meant for
/// the window being closed from its title bar; the in-app quit key
/// returns from playback normally.
#[derive(Debug, Clone, Default)]
pub struct FastExit {
    status: Arc<AtomicU8>,
}

impl FastExit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u8) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn status(&self) -> u8 {
        self.status.load(Ordering::SeqCst)
    }

    /// End the process now, without running destructors.
    pub fn terminate(&self) -> ! {
        let status = self.status();
        info!(status, "window closed, exiting immediately");
        std::process::exit(i32::from(status))
    }
}

/// Check that the runtime can actually run a second thread.
pub fn supports_threads() -> bool {
    thread::Builder::new()
        .name("thread-check".into())
        .spawn(|| ())
        .map(|handle| handle.join().is_ok())
        .unwrap_or(false)
}

/// Run the whole program for an argument vector (program name first) and
/// return the process exit status.
pub fn run<I, T, E>(args: I, engine: &mut E) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    E: PlaybackEngine,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let program = program_name(&args);

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            report(&program, &e);
            return EXIT_FAILURE;
        }
    };

    if !supports_threads() {
        report(&program, &LaunchError::NoThreadSupport);
        return EXIT_FAILURE;
    }

    let fast_exit = FastExit::new();
    info!(
        template = %config.file_name_template.to_string_lossy(),
        first = config.first_frame,
        last = config.last_frame,
        "starting playback"
    );

    if let Err(e) = engine.play(&config, fast_exit.clone()) {
        error!("playback failed: {e:#}");
        report(&program, &LaunchError::Playback(e));
        fast_exit.record(EXIT_FAILURE);
    }

    fast_exit.status()
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playexr".to_string())
}

fn report(program: &str, e: &LaunchError) {
    if e.shows_usage() {
        eprint!("{}", usage(program, matches!(e, LaunchError::Help)));
    } else {
        eprintln!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[derive(Default)]
    struct RecordingEngine {
        played: Vec<PlaybackConfig>,
        fail_with: Option<&'static str>,
    }

    impl PlaybackEngine for RecordingEngine {
        fn play(&mut self, config: &PlaybackConfig, fast_exit: FastExit) -> anyhow::Result<()> {
            assert_eq!(fast_exit.status(), EXIT_SUCCESS);
            self.played.push(config.clone());
            match self.fail_with {
                Some(message) => Err(anyhow!(message)),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn valid_command_line_plays_once() {
        let mut engine = RecordingEngine::default();
        let status = run(["playexr", "img.%.exr", "1", "5"], &mut engine);

        assert_eq!(status, EXIT_SUCCESS);
        assert_eq!(engine.played.len(), 1);
        let config = &engine.played[0];
        assert_eq!(config.file_name_template, "img.%.exr");
        assert_eq!((config.first_frame, config.last_frame), (1, 5));
        assert_eq!(config.threads, 0);
        assert_eq!(config.fps, None);
        assert!(config.transforms.is_empty());
    }

    #[test]
    fn invalid_command_lines_never_reach_the_engine() {
        let bad: &[&[&str]] = &[
            &["playexr"],
            &["playexr", "-h"],
            &["playexr", "-t", "-1", "img.%.exr"],
            &["playexr", "-f", "2000", "img.%.exr"],
            &["playexr", "img.%.exr", "9", "3"],
            &["playexr", "img.%.exr", "3"],
            &["playexr", "img.%.exr", "-t"],
        ];

        for args in bad {
            let mut engine = RecordingEngine::default();
            assert_eq!(run(args.iter().copied(), &mut engine), EXIT_FAILURE, "{args:?}");
            assert!(engine.played.is_empty(), "{args:?}");
        }
    }

    #[test]
    fn engine_failure_sets_failure_status() {
        let mut engine = RecordingEngine {
            fail_with: Some("Cannot open image file img.1.exr"),
            ..Default::default()
        };
        assert_eq!(run(["playexr", "img.%.exr"], &mut engine), EXIT_FAILURE);
        assert_eq!(engine.played.len(), 1);
    }

    #[test]
    fn fast_exit_shares_recorded_status() {
        let fast_exit = FastExit::new();
        let handle = fast_exit.clone();
        assert_eq!(handle.status(), EXIT_SUCCESS);
        fast_exit.record(EXIT_FAILURE);
        assert_eq!(handle.status(), EXIT_FAILURE);
    }

    #[test]
    fn threads_are_available_here() {
        assert!(supports_threads());
    }
}
