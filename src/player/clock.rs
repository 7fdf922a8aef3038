use std::time::Duration;

/// Playback rate used when none was given on the command line
pub const DEFAULT_FPS: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Paused,
    Playing(Direction),
}

/// Frame-rate driven playhead over an inclusive frame range.
///
/// The clock only moves in whole frames. Elapsed time that does not add up
/// to a full frame is carried over to the next call to [`advance`].
/// Playback wraps around at both ends of the range.
///
/// [`advance`]: FrameClock::advance
#[derive(Debug, Clone)]
pub struct FrameClock {
    first: i32,
    last: i32,
    current: i32,
    fps: f32,
    state: PlayState,
    frame_time: Duration,
    /// Time accumulated towards the next frame
    lag: Duration,
}

impl FrameClock {
    /// A clock positioned on `first`, playing forward.
    pub fn new(first: i32, last: i32, fps: f32) -> Self {
        Self {
            first,
            last,
            current: first,
            fps,
            frame_time: Duration::from_secs_f64(1.0 / f64::from(fps)),
            state: PlayState::Playing(Direction::Forward),
            lag: Duration::ZERO,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing(_))
    }

    /// Direction frames are read ahead in; forward while paused.
    pub fn direction(&self) -> Direction {
        match self.state {
            PlayState::Playing(direction) => direction,
            PlayState::Paused => Direction::Forward,
        }
    }

    /// Start playing in `direction`, or pause if already doing so.
    pub fn toggle(&mut self, direction: Direction) {
        self.state = match self.state {
            PlayState::Playing(current) if current == direction => PlayState::Paused,
            _ => PlayState::Playing(direction),
        };
        self.lag = Duration::ZERO;
    }

    /// Pause and move one frame.
    pub fn step(&mut self, direction: Direction) {
        self.state = PlayState::Paused;
        self.lag = Duration::ZERO;
        self.current = self.offset(self.current, 1, direction);
    }

    /// Move the playhead by the frames that fit into `elapsed`; returns the
    /// number of frames moved.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        let PlayState::Playing(direction) = self.state else {
            return 0;
        };

        self.lag += elapsed;
        let frame_nanos = self.frame_time.as_nanos().max(1);
        let frames = (self.lag.as_nanos() / frame_nanos) as u64;
        self.lag = Duration::from_nanos((self.lag.as_nanos() % frame_nanos) as u64);

        self.current = self.offset(self.current, frames, direction);
        frames
    }

    /// The frame `count` frames away from `frame`, wrapping around the range.
    pub fn offset(&self, frame: i32, count: u64, direction: Direction) -> i32 {
        let len = self.len();
        let count = (count % len as u64) as i64;
        let index = i64::from(frame) - i64::from(self.first);
        let index = match direction {
            Direction::Forward => index + count,
            Direction::Backward => index - count,
        }
        .rem_euclid(len);
        (i64::from(self.first) + index) as i32
    }

    /// Frames between `from` and `to` when moving in `direction`, wrapping
    /// around the range. Inverse of [`offset`](FrameClock::offset).
    pub fn distance(&self, from: i32, to: i32, direction: Direction) -> u64 {
        let delta = i64::from(to) - i64::from(from);
        let delta = match direction {
            Direction::Forward => delta,
            Direction::Backward => -delta,
        };
        delta.rem_euclid(self.len()) as u64
    }

    fn len(&self) -> i64 {
        i64::from(self.last) - i64::from(self.first) + 1
    }
}
