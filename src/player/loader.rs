use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use ffmpeg_next::codec::{self, decoder};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{Context as ScalerContext, Flags};
use ffmpeg_next::{Packet, Rational};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{MAX_FPS, MIN_FPS};

/// How often idle workers check the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A decoded frame ready for display
pub struct LoadedFrame {
    pub frame: i32,
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Commands sent to the loader threads
pub enum LoaderCommand {
    Load { frame: i32, path: PathBuf },
    Stop,
}

/// Results sent back by the loader threads
pub enum LoaderEvent {
    Loaded(LoadedFrame),
    Failed { frame: i32, message: String },
}

/// Image dimensions and frame rate read from the first frame of a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// From the `framesPerSecond` header attribute, when present and usable
    pub fps: Option<f32>,
}

/// Decodes one frame file; swapped out in tests.
pub type DecodeFn = fn(&Path, i32) -> Result<LoadedFrame>;

/// Decode the first frame of a sequence and report what playback needs
/// to know about it.
///
/// FFmpeg only fills in the header frame rate once a frame went through
/// the decoder, so reading codec parameters alone is not enough.
pub fn read_frame_info(path: &Path) -> Result<FrameInfo> {
    let (decoder, decoded) = decode_image(path)?;
    Ok(FrameInfo {
        width: decoded.width(),
        height: decoded.height(),
        fps: fps_from_rate(decoder.frame_rate()),
    })
}

/// Decode a single image file into packed RGBA
pub fn decode_frame(path: &Path, frame: i32) -> Result<LoadedFrame> {
    let (_, decoded) = decode_image(path)?;

    let mut scaler = ScalerContext::get(
        decoded.format(),
        decoded.width(),
        decoded.height(),
        Pixel::RGBA,
        decoded.width(),
        decoded.height(),
        Flags::BILINEAR,
    )?;
    let mut rgba_frame = VideoFrame::empty();
    scaler.run(&decoded, &mut rgba_frame)?;

    let width = rgba_frame.width();
    let height = rgba_frame.height();
    Ok(LoadedFrame {
        frame,
        rgba: pack_rows(rgba_frame.data(0), rgba_frame.stride(0), width, height),
        width,
        height,
    })
}

fn decode_image(path: &Path) -> Result<(decoder::Video, VideoFrame)> {
    let mut input = ffmpeg_next::format::input(path)
        .with_context(|| format!("Cannot open image file \"{}\"", path.display()))?;

    let stream = input
        .streams()
        .best(Type::Video)
        .ok_or_else(|| anyhow!("\"{}\" contains no image data", path.display()))?;
    let stream_index = stream.index();

    let mut decoder = codec::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;

    let mut decoded = VideoFrame::empty();
    loop {
        let mut packet = Packet::empty();
        match packet.read(&mut input) {
            Ok(()) => {
                if packet.stream() != stream_index {
                    continue;
                }
                decoder.send_packet(&packet)?;
                if decoder.receive_frame(&mut decoded).is_ok() {
                    break;
                }
            }
            Err(ffmpeg_next::Error::Eof) => {
                decoder.send_eof()?;
                decoder
                    .receive_frame(&mut decoded)
                    .map_err(|_| anyhow!("Cannot decode image file \"{}\"", path.display()))?;
                break;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Cannot read image file \"{}\"", path.display()));
            }
        }
    }

    Ok((decoder, decoded))
}

/// Frame rate stored in the file, if it is one playback accepts.
fn fps_from_rate(rate: Option<Rational>) -> Option<f32> {
    let rate = rate?;
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    let fps = (f64::from(rate.numerator()) / f64::from(rate.denominator())) as f32;
    (MIN_FPS..=MAX_FPS).contains(&fps).then_some(fps)
}

/// Strip the per-row padding FFmpeg adds to RGBA planes
fn pack_rows(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row = width as usize * 4;
    let height = height as usize;
    if stride == row {
        return data[..row * height].to_vec();
    }

    let mut packed = Vec::with_capacity(row * height);
    for line in data.chunks(stride).take(height) {
        packed.extend_from_slice(&line[..row]);
    }
    packed
}

/// A fixed set of threads that decode frames on request.
pub struct LoaderPool {
    command_sender: Sender<LoaderCommand>,
    event_receiver: Receiver<LoaderEvent>,
    handles: Vec<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl LoaderPool {
    /// Start `workers` FFmpeg loader threads with room for `capacity`
    /// queued requests.
    pub fn start(workers: usize, capacity: usize) -> Result<Self> {
        Self::start_with(workers, capacity, decode_frame)
    }

    pub fn start_with(workers: usize, capacity: usize, decode: DecodeFn) -> Result<Self> {
        let (command_sender, command_receiver) = bounded(capacity.max(1));
        let (event_sender, event_receiver) = bounded(capacity.max(1));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let commands = command_receiver.clone();
            let events = event_sender.clone();
            let stop_flag = stop_flag.clone();
            let handle = thread::Builder::new()
                .name(format!("frame-loader-{index}"))
                .spawn(move || load_loop(commands, events, stop_flag, decode))
                .context("Cannot start frame loader thread")?;
            handles.push(handle);
        }
        debug!(workers = handles.len(), "frame loaders started");

        Ok(Self {
            command_sender,
            event_receiver,
            handles,
            stop_flag,
        })
    }

    /// Queue a frame for loading; false if the queue is full.
    pub fn request(&self, frame: i32, path: PathBuf) -> bool {
        self.command_sender
            .try_send(LoaderCommand::Load { frame, path })
            .is_ok()
    }

    /// Next finished frame, if any
    pub fn try_recv(&self) -> Option<LoaderEvent> {
        self.event_receiver.try_recv().ok()
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        for _ in &self.handles {
            let _ = self.command_sender.try_send(LoaderCommand::Stop);
        }

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn load_loop(
    commands: Receiver<LoaderCommand>,
    events: Sender<LoaderEvent>,
    stop_flag: Arc<AtomicBool>,
    decode: DecodeFn,
) {
    while !stop_flag.load(Ordering::Relaxed) {
        let (frame, path) = match commands.recv_timeout(POLL_INTERVAL) {
            Ok(LoaderCommand::Load { frame, path }) => (frame, path),
            Ok(LoaderCommand::Stop) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => continue,
        };

        let mut event = match decode(&path, frame) {
            Ok(loaded) => LoaderEvent::Loaded(loaded),
            Err(e) => {
                warn!(frame, "frame failed to load: {e:#}");
                LoaderEvent::Failed {
                    frame,
                    message: format!("{e:#}"),
                }
            }
        };

        // Non-blocking send so a full queue cannot hold up shutdown
        loop {
            if stop_flag.load(Ordering::Relaxed) {
                return;
            }
            match events.try_send(event) {
                Ok(()) => break,
                Err(TrySendError::Full(e)) => {
                    event = e;
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}
