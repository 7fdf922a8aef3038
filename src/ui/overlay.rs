use crate::player::{Direction, PlayState, SequencePlayer};
use egui::{Align2, Area, Color32, Context, Frame, Id, RichText};

/// Snapshot of what the text overlay reports
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub frame: i32,
    pub loading: bool,
    pub state: PlayState,
    pub fps: f32,
    pub exposure: f32,
    pub transforms_enabled: bool,
    pub transforms: String,
}

impl Status {
    pub fn of(player: &SequencePlayer) -> Self {
        Self {
            frame: player.current_frame(),
            loading: player.shown_frame() != Some(player.current_frame()),
            state: player.state(),
            fps: player.fps(),
            exposure: player.exposure(),
            transforms_enabled: player.transforms().is_enabled(),
            transforms: player.transforms().describe(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let state = match self.state {
            PlayState::Playing(Direction::Forward) => "playing",
            PlayState::Playing(Direction::Backward) => "playing backward",
            PlayState::Paused => "paused",
        };
        let frame = if self.loading {
            format!("frame {} (loading)", self.frame)
        } else {
            format!("frame {}", self.frame)
        };

        vec![
            frame,
            format!("{state}, {:.2} fps", self.fps),
            format!("exposure {:+.1}", self.exposure),
            format!(
                "CTL {}: {}",
                if self.transforms_enabled { "on" } else { "off" },
                self.transforms
            ),
        ]
    }
}

pub struct Overlay;

impl Overlay {
    pub fn show(ctx: &Context, player: &SequencePlayer) {
        let lines = Status::of(player).lines();

        Area::new(Id::new("status_overlay"))
            .anchor(Align2::LEFT_TOP, [8.0, 8.0])
            .interactable(false)
            .show(ctx, |ui| {
                Frame::none()
                    .fill(Color32::from_black_alpha(160))
                    .inner_margin(6.0)
                    .show(ui, |ui| {
                        for line in lines {
                            ui.label(RichText::new(line).monospace().color(Color32::WHITE));
                        }
                    });
            });
    }
}
