use anyhow::{bail, Result};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Character in the file name template replaced by the frame number
pub const FRAME_MARKER: char = '%';

/// A numbered range of image files described by a file name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    prefix: OsString,
    suffix: OsString,
    first: i32,
    last: i32,
}

impl FrameSequence {
    /// The template may hold any bytes the platform allows in a path.
    pub fn new(template: impl AsRef<OsStr>, first: i32, last: i32) -> Result<Self> {
        let template = template.as_ref();
        let bytes = template.as_encoded_bytes();
        let Some(marker) = bytes.iter().position(|&b| b == FRAME_MARKER as u8) else {
            bail!(
                "File name template \"{}\" does not contain a '{FRAME_MARKER}' \
                 to be replaced with the frame number.",
                template.to_string_lossy()
            );
        };
        if first > last {
            bail!("Frame range {first}..{last} is empty.");
        }

        // SAFETY: both halves border the ASCII marker, which is a complete
        // UTF-8 substring, so each is a valid encoded OsStr.
        let (prefix, suffix) = unsafe {
            (
                OsStr::from_encoded_bytes_unchecked(&bytes[..marker]),
                OsStr::from_encoded_bytes_unchecked(&bytes[marker + 1..]),
            )
        };

        Ok(Self {
            prefix: prefix.to_os_string(),
            suffix: suffix.to_os_string(),
            first,
            last,
        })
    }

    /// Path of the given frame; only the first marker is substituted.
    pub fn path(&self, frame: i32) -> PathBuf {
        let mut name = self.prefix.clone();
        name.push(frame.to_string());
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    pub fn first(&self) -> i32 {
        self.first
    }

    pub fn last(&self) -> i32 {
        self.last
    }

    pub fn len(&self) -> usize {
        (i64::from(self.last) - i64::from(self.first) + 1) as usize
    }
}
