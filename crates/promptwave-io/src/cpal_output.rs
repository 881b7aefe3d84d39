//! cpal-backed output device.
//!
//! The cpal callback owns a [`Timeline`] and an atomic frame counter. The
//! control side never touches the timeline directly: scheduling, gain and
//! disconnect requests cross over a `crossbeam-channel`, and the device clock
//! is read from the atomic. Finished buffers are sent back on a bounded
//! channel and freed on the next control call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::device::{DeviceInfo, OutputDevice};
use crate::timeline::{Command, Timeline};
use crate::{AudioChunk, Error, Result};

const RETIRED_CAPACITY: usize = 256;

/// Output stream settings.
///
/// ## Fields
///
/// - `sample_rate`: stream rate in Hz (default: 48000)
/// - `channels`: interleaved channels (default: 2)
/// - `buffer_size`: fixed callback size in frames, or the host default
/// - `device_name`: case-insensitive substring of an output device name
/// - `initial_gain`: master gain at open (default: 0.8)
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Stream sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Fixed buffer size in frames, `None` for the host default.
    pub buffer_size: Option<u32>,
    /// Device name filter, `None` for the default output.
    pub device_name: Option<String>,
    /// Master gain when the stream opens.
    pub initial_gain: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: None,
            device_name: None,
            initial_gain: 0.8,
        }
    }
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

fn find_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    let Some(search) = name else {
        return host.default_output_device().ok_or(Error::NoDevice);
    };
    let needle = search.to_lowercase();
    let devices = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;
    for device in devices {
        if device_name(&device).is_some_and(|n| n.to_lowercase().contains(&needle)) {
            return Ok(device);
        }
    }
    Err(Error::DeviceNotFound(format!(
        "no output device matching '{search}'"
    )))
}

/// List output devices on the default host.
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().as_ref().and_then(device_name);
    let devices = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let Some(name) = device_name(&device) else {
            continue;
        };
        let (default_sample_rate, channels) = device
            .default_output_config()
            .map(|c| (c.sample_rate(), c.channels()))
            .unwrap_or((48000, 2));
        infos.push(DeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            default_sample_rate,
            channels,
        });
    }
    Ok(infos)
}

/// Requests to the thread that owns the cpal stream.
enum StreamControl {
    Play(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
}

/// Speaker output through cpal.
///
/// `cpal::Stream` cannot leave the thread that built it, so the stream lives
/// on a dedicated owner thread. Dropping the handle ends that thread and
/// closes the stream.
pub struct CpalOutput {
    control: Sender<StreamControl>,
    owner: Option<JoinHandle<()>>,
    commands: Sender<Command>,
    retired: Receiver<Vec<f32>>,
    frames: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
}

impl std::fmt::Debug for CpalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutput")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("frames", &self.frames.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Build and start the stream. Runs on the owner thread.
fn build_stream(
    config: &OutputConfig,
    command_rx: Receiver<Command>,
    retired_tx: Sender<Vec<f32>>,
    frames: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = find_output_device(&host, config.device_name.as_deref())?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: config.sample_rate,
        buffer_size: config
            .buffer_size
            .map_or(cpal::BufferSize::Default, cpal::BufferSize::Fixed),
    };

    let mut timeline = Timeline::new(config.channels, config.initial_gain, Some(retired_tx));
    let channels = usize::from(config.channels.max(1));

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let now = frames.load(Ordering::Acquire);
                while let Ok(command) = command_rx.try_recv() {
                    timeline.apply(command, now);
                }
                timeline.render(data, now);
                frames.fetch_add((data.len() / channels) as u64, Ordering::Release);
            },
            move |err| {
                running.store(false, Ordering::Release);
                tracing::warn!(error = %err, "output stream error");
            },
            None,
        )
        .map_err(|e| Error::Stream(e.to_string()))?;

    stream.play().map_err(|e| Error::Stream(e.to_string()))?;
    tracing::info!(
        device = device_name(&device).as_deref().unwrap_or("unknown"),
        channels = config.channels,
        sample_rate = config.sample_rate,
        "output stream started"
    );
    Ok(stream)
}

impl CpalOutput {
    /// Open and start an output stream.
    pub fn open(config: &OutputConfig) -> Result<Self> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<StreamControl>();
        let (opened_tx, opened_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let frames = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(false));

        let owner = {
            let config = config.clone();
            let frames = Arc::clone(&frames);
            let error_flag = Arc::clone(&running);
            std::thread::Builder::new()
                .name("promptwave-audio".to_string())
                .spawn(move || {
                    let stream =
                        match build_stream(&config, command_rx, retired_tx, frames, error_flag) {
                            Ok(stream) => {
                                let _ = opened_tx.send(Ok(()));
                                stream
                            }
                            Err(e) => {
                                let _ = opened_tx.send(Err(e));
                                return;
                            }
                        };
                    // Runs until the handle is dropped.
                    for control in &control_rx {
                        match control {
                            StreamControl::Play(reply) => {
                                let _ = reply
                                    .send(stream.play().map_err(|e| Error::Stream(e.to_string())));
                            }
                            StreamControl::Pause(reply) => {
                                let _ = reply
                                    .send(stream.pause().map_err(|e| Error::Stream(e.to_string())));
                            }
                        }
                    }
                    tracing::debug!("output stream closed");
                })?
        };

        opened_rx
            .recv()
            .map_err(|_| Error::Stream("audio thread exited during setup".to_string()))??;
        running.store(true, Ordering::Release);

        Ok(Self {
            control: control_tx,
            owner: Some(owner),
            commands: command_tx,
            retired: retired_rx,
            frames,
            running,
            sample_rate: config.sample_rate,
            channels: config.channels,
        })
    }

    fn control(&self, make: impl FnOnce(Sender<Result<()>>) -> StreamControl) -> Result<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.control
            .send(make(reply_tx))
            .map_err(|_| Error::Stream("audio thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::Stream("audio thread is gone".to_string()))?
    }

    /// Suspend the stream. The device clock stops.
    pub fn suspend(&mut self) -> Result<()> {
        self.control(StreamControl::Pause)?;
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("output stream is gone, command dropped");
        }
    }

    fn collect_retired(&self) {
        while self.retired.try_recv().is_ok() {}
    }

    fn secs_to_frames(&self, secs: f64) -> u32 {
        (secs.max(0.0) * f64::from(self.sample_rate)).round() as u32
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        // Disconnecting the control channel ends the owner thread.
        let (closed, _) = crossbeam_channel::unbounded();
        drop(std::mem::replace(&mut self.control, closed));
        if let Some(owner) = self.owner.take()
            && owner.join().is_err()
        {
            tracing::warn!("audio thread panicked");
        }
    }
}

impl OutputDevice for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn resume(&mut self) -> Result<()> {
        self.control(StreamControl::Play)?;
        self.running.store(true, Ordering::Release);
        tracing::debug!("output stream resumed");
        Ok(())
    }

    fn schedule(&mut self, chunk: AudioChunk, start_time: f64) {
        self.collect_retired();
        if chunk.sample_rate() != self.sample_rate || chunk.channels() != self.channels {
            tracing::warn!(
                chunk_rate = chunk.sample_rate(),
                chunk_channels = chunk.channels(),
                device_rate = self.sample_rate,
                device_channels = self.channels,
                "chunk format does not match device, dropped"
            );
            return;
        }
        let start_frame = (start_time.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        self.send(Command::Schedule {
            start_frame,
            samples: chunk.into_samples(),
        });
    }

    fn set_gain(&mut self, gain: f32, ramp_secs: f64) {
        self.send(Command::Gain {
            target: gain.clamp(0.0, 1.0),
            ramp_frames: self.secs_to_frames(ramp_secs),
        });
    }

    fn disconnect(&mut self, fade_secs: f64) {
        self.send(Command::Disconnect {
            fade_frames: self.secs_to_frames(fade_secs),
        });
        self.collect_retired();
    }
}
