//! Command-line parsing.
//!
//! Arguments are read strictly in order. Only the exact tokens `-t`, `-f`,
//! `-C` and `-h` are flags, and a flag takes the next token as its value
//! whatever it looks like. Every other token is positional and fills the
//! template, first frame and last frame slots in turn; tokens after that
//! are counted but not interpreted.

use clap_lex::RawArgs;
use std::ffi::{OsStr, OsString};
use tracing::debug;

use crate::config::{validate_fps, validate_frame_range, validate_threads, PlaybackConfig};
use crate::error::{LaunchError, LaunchResult};

/// Which positional argument the next non-flag token fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expecting {
    Template,
    FirstFrame,
    LastFrame,
    Extra,
}

impl Expecting {
    fn next(self) -> Self {
        match self {
            Expecting::Template => Expecting::FirstFrame,
            Expecting::FirstFrame => Expecting::LastFrame,
            Expecting::LastFrame | Expecting::Extra => Expecting::Extra,
        }
    }
}

#[derive(Debug)]
struct Positionals {
    expecting: Expecting,
    template: Option<OsString>,
    first_frame: Option<OsString>,
    last_frame: Option<OsString>,
    count: usize,
}

impl Positionals {
    fn new() -> Self {
        Self {
            expecting: Expecting::Template,
            template: None,
            first_frame: None,
            last_frame: None,
            count: 0,
        }
    }

    fn push(&mut self, token: &OsStr) {
        match self.expecting {
            Expecting::Template => self.template = Some(token.to_os_string()),
            Expecting::FirstFrame => self.first_frame = Some(token.to_os_string()),
            Expecting::LastFrame => self.last_frame = Some(token.to_os_string()),
            Expecting::Extra => {}
        }
        self.count += 1;
        self.expecting = self.expecting.next();
    }
}

/// Parse a full argument vector (program name first) into a validated
/// [`PlaybackConfig`].
pub fn parse_args<I, T>(args: I) -> LaunchResult<PlaybackConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let raw = RawArgs::new(args);
    let mut cursor = raw.cursor();
    // program name
    let _ = raw.next_os(&mut cursor);
    if raw.is_end(&cursor) {
        return Err(LaunchError::Help);
    }

    let mut threads = 0;
    let mut fps = None;
    let mut transforms = Vec::new();
    let mut positionals = Positionals::new();

    while let Some(token) = raw.next_os(&mut cursor) {
        match token.to_str() {
            Some("-t") => {
                let value = raw.next_os(&mut cursor).ok_or(LaunchError::Usage)?;
                threads = validate_threads(parse_number(value, "number of threads")?)?;
            }
            Some("-f") => {
                let value = raw.next_os(&mut cursor).ok_or(LaunchError::Usage)?;
                fps = Some(validate_fps(parse_number(value, "frame rate")?)?);
            }
            Some("-C") => {
                let value = raw.next_os(&mut cursor).ok_or(LaunchError::Usage)?;
                transforms.push(value.to_string_lossy().into_owned());
            }
            Some("-h") => return Err(LaunchError::Help),
            _ => positionals.push(token),
        }
    }

    if positionals.count != 1 && positionals.count != 3 {
        debug!(count = positionals.count, "wrong number of positional arguments");
        return Err(LaunchError::Usage);
    }

    let file_name_template = positionals.template.ok_or(LaunchError::Usage)?;
    let first_frame = match positionals.first_frame {
        Some(value) => parse_number(&value, "first frame number")?,
        None => 1,
    };
    let last_frame = match positionals.last_frame {
        Some(value) => parse_number(&value, "last frame number")?,
        None => 1,
    };
    let (first_frame, last_frame) = validate_frame_range(first_frame, last_frame)?;

    let config = PlaybackConfig {
        file_name_template,
        first_frame,
        last_frame,
        threads,
        fps,
        transforms,
    };
    debug!(?config, "parsed command line");
    Ok(config)
}

fn parse_number<N: std::str::FromStr>(value: &OsStr, what: &'static str) -> LaunchResult<N> {
    value
        .to_str()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(|| LaunchError::InvalidNumber {
            what,
            value: value.to_string_lossy().into_owned(),
        })
}

/// The usage line, followed by the full help text when `verbose` is set.
pub fn usage(program: &str, verbose: bool) -> String {
    let mut text = format!("usage: {program} [options] fileName [firstFrame lastFrame]\n");
    if !verbose {
        return text;
    }

    text.push_str(&format!(
        "
Plays back a sequence of OpenEXR files.  All files must
have the same data window and the same set of channels.
The names of the files are constructed by substituting
the first '%' in fileName with firstFrame, firstFrame+1,
firstFrame+2, ... lastFrame.  For example,

       {program} image.%.exr 1 100

plays back image.1.exr, image.2.exr ... image.100.exr.

Options:

-t n   read the images using n parallel threads

-f n   images will be played back at a rate of n frames
       per second (assuming that reading and displaying
       an individual image file takes no more than 1/n
       seconds).

-C s   CTL transform s is applied to each image before it
       is displayed.  Option -C can be specified multiple
       times to apply a series of transforms to each image.
       The transforms are applied in the order in which
       they appear on the command line.

-h     prints this message

CTL transforms:

       If no CTL transforms are specified on the command
       line then a rendering transform (transform_RRT) is
       applied, followed by a display transform.  The name
       of the display transform is taken from the environment
       variable CTL_DISPLAY_TRANSFORM, or is
       \"transform_display_video\" if the variable is not set.
       The files that contain the transforms are located
       using the CTL_MODULE_PATH environment variable.
       The selected transforms are shown in the text overlay;
       running them requires an external CTL interpreter.

Playback frame rate:

       If the frame rate is not specified on the command
       line (using the -f flag), then the frame rate is
       determined by the framesPerSecond attribute in the
       header of the first frame of the image sequence.
       If the header contains no framesPerSecond attribute
       then the frame rate is set to 24 frames per second.

Keyboard commands:

       L or P       play forward / pause
       H            play backward / pause
       K            step one frame forward
       J            step one frame backward
       > or .       increase exposure
       < or ,       decrease exposure
       C            CTL transforms on/off
       O            text overlay on/off
       F            full-screen mode on/off
       Q or ESC     quit
"
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> LaunchResult<PlaybackConfig> {
        parse_args(std::iter::once("playexr").chain(args.iter().copied()))
    }

    #[test]
    fn single_positional_defaults_to_frame_one() {
        let config = parse(&["img.%.exr"]).unwrap();
        assert_eq!(config, PlaybackConfig::new("img.%.exr"));
    }

    #[test]
    fn template_and_range() {
        let config = parse(&["img.%.exr", "1", "5"]).unwrap();
        assert_eq!(
            config,
            PlaybackConfig {
                file_name_template: "img.%.exr".into(),
                first_frame: 1,
                last_frame: 5,
                threads: 0,
                fps: None,
                transforms: vec![],
            }
        );
    }

    #[test]
    fn flags_may_be_interleaved_with_positionals() {
        let config = parse(&["img.%.exr", "-t", "4", "10", "-f", "30", "20"]).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.fps, Some(30.0));
        assert_eq!((config.first_frame, config.last_frame), (10, 20));
    }

    #[test]
    fn transforms_keep_command_line_order() {
        let config = parse(&["-C", "a", "img.%.exr", "-C", "b"]).unwrap();
        assert_eq!(config.transforms, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn negative_frame_numbers_are_positionals() {
        let config = parse(&["img.%.exr", "-5", "-1"]).unwrap();
        assert_eq!((config.first_frame, config.last_frame), (-5, -1));
    }

    #[test]
    fn negative_thread_count() {
        assert!(matches!(parse(&["-t", "-1", "img.%.exr"]), Err(LaunchError::NegativeThreads)));
    }

    #[test]
    fn frame_rate_out_of_range() {
        assert!(matches!(parse(&["-f", "0", "img.%.exr"]), Err(LaunchError::FrameRate)));
        assert!(matches!(parse(&["-f", "1001", "img.%.exr"]), Err(LaunchError::FrameRate)));
        assert_eq!(parse(&["-f", "1000", "img.%.exr"]).unwrap().fps, Some(1000.0));
    }

    #[test]
    fn inverted_range() {
        assert!(matches!(parse(&["img.%.exr", "5", "1"]), Err(LaunchError::FrameOrder)));
    }

    #[test]
    fn wrong_positional_count_is_a_usage_error() {
        assert!(matches!(parse(&["img.%.exr", "1"]), Err(LaunchError::Usage)));
        assert!(matches!(parse(&["img.%.exr", "1", "2", "3"]), Err(LaunchError::Usage)));
        assert!(matches!(parse(&["-t", "2"]), Err(LaunchError::Usage)));
    }

    #[test]
    fn flag_without_value_is_a_usage_error() {
        for flag in ["-t", "-f", "-C"] {
            assert!(matches!(parse(&["img.%.exr", flag]), Err(LaunchError::Usage)), "{flag}");
        }
    }

    #[test]
    fn help_and_empty_command_line() {
        assert!(matches!(parse(&["-h"]), Err(LaunchError::Help)));
        assert!(matches!(parse(&["img.%.exr", "-h"]), Err(LaunchError::Help)));
        assert!(matches!(parse(&[]), Err(LaunchError::Help)));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        match parse(&["img.%.exr", "one", "5"]) {
            Err(LaunchError::InvalidNumber { what, value }) => {
                assert_eq!(what, "first frame number");
                assert_eq!(value, "one");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            parse(&["-t", "many", "img.%.exr"]),
            Err(LaunchError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn positional_state_machine_ignores_extras() {
        let mut positionals = Positionals::new();
        for token in ["a", "1", "2", "3", "4"] {
            positionals.push(OsStr::new(token));
        }
        assert_eq!(positionals.count, 5);
        assert_eq!(positionals.expecting, Expecting::Extra);
        assert_eq!(positionals.template.as_deref(), Some(OsStr::new("a")));
        assert_eq!(positionals.first_frame.as_deref(), Some(OsStr::new("1")));
        assert_eq!(positionals.last_frame.as_deref(), Some(OsStr::new("2")));
    }

    #[test]
    fn unknown_dash_tokens_are_positionals() {
        let config = parse(&["-x"]).unwrap();
        assert_eq!(config.file_name_template, "-x");

        let config = parse(&["-shot.%.exr", "-3", "-2"]).unwrap();
        assert_eq!(config.file_name_template, "-shot.%.exr");
        assert_eq!((config.first_frame, config.last_frame), (-3, -2));

        assert_eq!(parse(&["--"]).unwrap().file_name_template, "--");
        assert!(matches!(parse(&["-x", "-y"]), Err(LaunchError::Usage)));
    }

    #[test]
    fn flag_values_are_taken_verbatim() {
        let config = parse(&["-C", "-look", "img.%.exr", "-C", "-h"]).unwrap();
        assert_eq!(config.transforms, vec!["-look".to_string(), "-h".to_string()]);
        assert_eq!(config.file_name_template, "img.%.exr");
    }

    #[test]
    fn arguments_are_checked_in_order() {
        assert!(matches!(parse(&["-f", "0", "-t", "-1", "img.%.exr"]), Err(LaunchError::FrameRate)));
        assert!(matches!(parse(&["-t", "-1", "-f", "0", "img.%.exr"]), Err(LaunchError::NegativeThreads)));
        assert!(matches!(parse(&["-t", "-1", "img.%.exr", "-t"]), Err(LaunchError::NegativeThreads)));
        assert!(matches!(parse(&["-t", "2", "-h", "-t", "-1"]), Err(LaunchError::Help)));
    }

    #[test]
    fn later_flag_values_win() {
        let config = parse(&["-t", "2", "-f", "12", "img.%.exr", "-t", "6", "-f", "48"]).unwrap();
        assert_eq!(config.threads, 6);
        assert_eq!(config.fps, Some(48.0));
    }

    #[cfg(unix)]
    #[test]
    fn template_need_not_be_utf8() {
        use std::os::unix::ffi::OsStrExt;

        let template = OsStr::from_bytes(b"img\xff.%.exr");
        let config = parse_args([OsStr::new("playexr"), template]).unwrap();
        assert_eq!(config.file_name_template.as_os_str(), template);
    }

    #[test]
    fn short_usage_is_one_line() {
        assert_eq!(
            usage("playexr", false),
            "usage: playexr [options] fileName [firstFrame lastFrame]\n"
        );
        assert!(usage("playexr", true).contains("Keyboard commands"));
    }
}
