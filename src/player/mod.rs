mod cache;
mod clock;
mod loader;
mod sequence;
mod transform;

use anyhow::{Context as _, Result};
use egui::{ColorImage, Context, TextureHandle, TextureOptions};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::PlaybackConfig;

pub use cache::FrameCache;
pub use clock::{Direction, FrameClock, PlayState, DEFAULT_FPS};
pub use loader::{read_frame_info, FrameInfo, LoadedFrame, LoaderEvent, LoaderPool};
pub use sequence::{FrameSequence, FRAME_MARKER};
pub use transform::{apply_exposure, TransformChain, TransformSettings};

/// Frames requested ahead of the playhead
const READ_AHEAD: usize = 16;
/// Exposure change per key press, in stops
pub const EXPOSURE_STEP: f32 = 0.5;
/// Loader threads used when the thread count is 0
const DEFAULT_LOADER_THREADS: usize = 1;

/// Playback state of an image sequence: playhead, loaded frames and the
/// texture currently on screen.
pub struct SequencePlayer {
    sequence: FrameSequence,
    clock: FrameClock,
    cache: FrameCache,
    loader: LoaderPool,
    transforms: TransformChain,
    exposure: f32,
    size: (u32, u32),

    pending: HashSet<i32>,
    last_update: Option<Instant>,
    texture: Option<TextureHandle>,
    /// Frame number and exposure of the picture in `texture`
    shown: Option<(i32, f32)>,
    failure: Option<String>,
}

impl SequencePlayer {
    /// Check the sequence and transforms and start the loader threads.
    pub fn open(config: &PlaybackConfig, settings: &TransformSettings) -> Result<Self> {
        let sequence = FrameSequence::new(
            &config.file_name_template,
            config.first_frame,
            config.last_frame,
        )?;

        let first_path = sequence.path(sequence.first());
        let info = read_frame_info(&first_path).with_context(|| {
            format!(
                "Cannot play back \"{}\"",
                config.file_name_template.to_string_lossy()
            )
        })?;

        let transforms = TransformChain::resolve(&config.transforms, settings)?;

        let workers = match config.threads {
            0 => DEFAULT_LOADER_THREADS,
            n => n as usize,
        };
        let read_ahead = READ_AHEAD.min(sequence.len());
        let loader = LoaderPool::start(workers, read_ahead)?;
        let clock = FrameClock::new(sequence.first(), sequence.last(), playback_fps(config, &info));

        info!(
            frames = sequence.len(),
            width = info.width,
            height = info.height,
            fps = clock.fps(),
            workers = loader.workers(),
            "image sequence opened"
        );

        Ok(Self {
            cache: FrameCache::new(read_ahead * 2),
            sequence,
            clock,
            loader,
            transforms,
            exposure: 0.0,
            size: (info.width, info.height),
            pending: HashSet::new(),
            last_update: None,
            texture: None,
            shown: None,
            failure: None,
        })
    }

    /// Advance the playhead, collect loaded frames and refresh the texture
    /// (call each UI frame).
    pub fn update(&mut self, ctx: &Context) {
        let now = Instant::now();
        let elapsed = self
            .last_update
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_update = Some(now);

        self.receive_frames();
        self.clock.advance(elapsed);
        self.request_read_ahead();
        self.refresh_texture(ctx);

        if self.clock.is_playing() {
            ctx.request_repaint();
        } else if !self.pending.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(10));
        }
    }

    fn receive_frames(&mut self) {
        while let Some(event) = self.loader.try_recv() {
            match event {
                LoaderEvent::Loaded(frame) => {
                    self.pending.remove(&frame.frame);
                    self.cache.insert(frame, &self.clock);
                }
                LoaderEvent::Failed { frame, message } => {
                    self.pending.remove(&frame);
                    self.failure.get_or_insert(message);
                }
            }
        }
    }

    fn request_read_ahead(&mut self) {
        let direction = self.clock.direction();
        let count = READ_AHEAD.min(self.sequence.len());
        for offset in 0..count as u64 {
            let frame = self.clock.offset(self.clock.current(), offset, direction);
            if self.cache.contains(frame) || self.pending.contains(&frame) {
                continue;
            }
            if !self.loader.request(frame, self.sequence.path(frame)) {
                break;
            }
            self.pending.insert(frame);
        }
    }

    fn refresh_texture(&mut self, ctx: &Context) {
        let current = self.clock.current();
        if self.shown == Some((current, self.exposure)) {
            return;
        }
        // Late frames are skipped; the previous picture stays up
        let Some(frame) = self.cache.get(current) else {
            return;
        };

        let image = ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &apply_exposure(&frame.rgba, self.exposure),
        );
        match self.texture {
            Some(ref mut texture) => texture.set(image, TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("sequence_frame", image, TextureOptions::LINEAR)),
        }
        self.shown = Some((current, self.exposure));
    }

    pub fn toggle_playback(&mut self, direction: Direction) {
        self.clock.toggle(direction);
        debug!(state = ?self.clock.state(), "playback toggled");
    }

    pub fn step(&mut self, direction: Direction) {
        self.clock.step(direction);
    }

    pub fn adjust_exposure(&mut self, stops: f32) {
        self.exposure += stops;
    }

    pub fn toggle_transforms(&mut self) {
        self.transforms.toggle();
    }

    /// First load error, if any frame failed
    pub fn take_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    pub fn current_frame(&self) -> i32 {
        self.clock.current()
    }

    /// Frame number of the picture on screen
    pub fn shown_frame(&self) -> Option<i32> {
        self.shown.map(|(frame, _)| frame)
    }

    pub fn state(&self) -> PlayState {
        self.clock.state()
    }

    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn transforms(&self) -> &TransformChain {
        &self.transforms
    }
}

/// Command line first, then the rate stored in the first frame, then the default.
fn playback_fps(config: &PlaybackConfig, info: &FrameInfo) -> f32 {
    config.fps.or(info.fps).unwrap_or(DEFAULT_FPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(fps: Option<f32>) -> FrameInfo {
        FrameInfo {
            width: 16,
            height: 9,
            fps,
        }
    }

    #[test]
    fn frame_rate_prefers_command_line_then_header() {
        let mut config = PlaybackConfig::new("img.%.exr");
        assert_eq!(playback_fps(&config, &info(None)), DEFAULT_FPS);
        assert_eq!(playback_fps(&config, &info(Some(25.0))), 25.0);

        config.fps = Some(60.0);
        assert_eq!(playback_fps(&config, &info(Some(25.0))), 60.0);
    }
}
