use anyhow::{anyhow, Context as _, Result};
use eframe::NativeOptions;
use egui::{CentralPanel, Color32, Context, Frame, Key, Vec2, ViewportCommand};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PlaybackConfig;
use crate::launcher::{FastExit, PlaybackEngine};
use crate::player::{Direction, SequencePlayer, TransformSettings, EXPOSURE_STEP};
use crate::ui::overlay::Overlay;

/// Plays the sequence in a native window.
#[derive(Debug, Default)]
pub struct ViewerEngine;

impl PlaybackEngine for ViewerEngine {
    fn play(&mut self, config: &PlaybackConfig, fast_exit: FastExit) -> Result<()> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        let settings = TransformSettings::from_env();
        let player = SequencePlayer::open(config, &settings)?;
        info!(
            transforms = %player.transforms().describe(),
            "CTL transforms resolved; frames are displayed without CTL interpretation"
        );

        let (width, height) = player.frame_size();
        let options = NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(config.file_name_template.to_string_lossy())
                .with_inner_size([width.max(320) as f32, height.max(240) as f32])
                .with_min_inner_size([320.0, 240.0]),
            ..Default::default()
        };

        let failure = Arc::new(Mutex::new(None));
        let app_failure = failure.clone();
        eframe::run_native(
            "playexr",
            options,
            Box::new(move |_cc| Ok(Box::new(PlayerApp::new(player, fast_exit, app_failure)))),
        )
        .map_err(|e| anyhow!("Display error: {e}"))?;

        let message = failure.lock().take();
        match message {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

struct PlayerApp {
    player: SequencePlayer,
    fast_exit: FastExit,
    failure: Arc<Mutex<Option<String>>>,
    show_overlay: bool,
    fullscreen: bool,
    /// Set when we close the window ourselves
    quitting: bool,
}

impl PlayerApp {
    fn new(
        player: SequencePlayer,
        fast_exit: FastExit,
        failure: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            player,
            fast_exit,
            failure,
            show_overlay: true,
            fullscreen: false,
            quitting: false,
        }
    }

    fn quit(&mut self, ctx: &Context) {
        self.quitting = true;
        ctx.send_viewport_cmd(ViewportCommand::Close);
    }

    fn handle_keys(&mut self, ctx: &Context) {
        let pressed = |key: Key| ctx.input(|i| i.key_pressed(key));

        if pressed(Key::L) || pressed(Key::P) {
            self.player.toggle_playback(Direction::Forward);
        }
        if pressed(Key::H) {
            self.player.toggle_playback(Direction::Backward);
        }
        if pressed(Key::K) {
            self.player.step(Direction::Forward);
        }
        if pressed(Key::J) {
            self.player.step(Direction::Backward);
        }
        // '>' and '<' arrive as shifted period and comma
        if pressed(Key::Period) {
            self.player.adjust_exposure(EXPOSURE_STEP);
        }
        if pressed(Key::Comma) {
            self.player.adjust_exposure(-EXPOSURE_STEP);
        }
        if pressed(Key::C) {
            self.player.toggle_transforms();
        }
        if pressed(Key::O) {
            self.show_overlay = !self.show_overlay;
        }
        if pressed(Key::F) {
            self.fullscreen = !self.fullscreen;
            ctx.send_viewport_cmd(ViewportCommand::Fullscreen(self.fullscreen));
        }
        if pressed(Key::Q) || pressed(Key::Escape) {
            self.quit(ctx);
        }
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        // Closed from the title bar: skip the toolkit's teardown
        if ctx.input(|i| i.viewport().close_requested()) && !self.quitting {
            self.fast_exit.terminate();
        }

        self.handle_keys(ctx);
        self.player.update(ctx);

        if let Some(message) = self.player.take_failure() {
            warn!("stopping playback: {message}");
            *self.failure.lock() = Some(message);
            self.quit(ctx);
        }

        CentralPanel::default()
            .frame(Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| {
                let Some(texture_id) = self.player.texture().map(|t| t.id()) else {
                    return;
                };

                // Scale to fit while maintaining aspect ratio
                let (width, height) = self.player.frame_size();
                let aspect = width as f32 / height.max(1) as f32;
                let available_size = ui.available_size();
                let available_aspect = available_size.x / available_size.y;

                let display_size = if aspect > available_aspect {
                    Vec2::new(available_size.x, available_size.x / aspect)
                } else {
                    Vec2::new(available_size.y * aspect, available_size.y)
                };

                ui.centered_and_justified(|ui| {
                    ui.image((texture_id, display_size));
                });
            });

        if self.show_overlay {
            Overlay::show(ctx, &self.player);
        }
    }
}
