// src/player.rs

use crate::audio::{build_stream, setup_output_device, OutputConfig};
use crate::decoder::{spawn_decoder_with_ctrl, DecoderCmd, DecoderTarget, FlushSync};
use crate::playback::Transport;
use anyhow::Context;
use cpal::traits::StreamTrait;
use cpal::{SampleFormat, Stream};
use log::{info, warn};
use ringbuf::{traits::Split, HeapRb};
use std::fs::File;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    mpsc::Sender,
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::default::get_probe;

const RING_CAPACITY: usize = 131_072;

/// Basic facts about an audio file, read without decoding it.
#[derive(Clone, Copy, Debug)]
pub struct SourceInfo {
    pub channels: usize,
    pub sample_rate: u32,
    pub duration: Duration,
}

/// Probes `path` for its default track.
pub fn probe_source(path: &str) -> Result<SourceInfo, anyhow::Error> {
    let file = File::open(path).context("opening audio file")?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = get_probe().format(
        &Default::default(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let track = probed
        .format
        .default_track()
        .context("no default audio track found")?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("missing sample rate")?;
    let channels = track
        .codec_params
        .channels
        .context("missing channel layout")?
        .count();
    let n_frames = track.codec_params.n_frames.unwrap_or(0);
    let duration = Duration::from_secs_f64(n_frames as f64 / sample_rate as f64);

    Ok(SourceInfo {
        channels,
        sample_rate,
        duration,
    })
}

/// One loaded audio file on the default output device.
///
/// Starts paused at 0. The position clock counts samples the device has
/// consumed since the last seek.
pub struct AudioPlayer {
    _stream: Stream,
    _decoder_handle: JoinHandle<()>,
    path: String,
    is_playing: Arc<AtomicBool>,
    volume: Arc<AtomicU32>,
    info: SourceInfo,
    played_samples: Arc<AtomicU64>,
    flush: Arc<FlushSync>,
    output_sample_rate: u32,
    output_channels: u16,
    cmd_tx: Sender<DecoderCmd>,
}

impl AudioPlayer {
    pub fn open(path: &str) -> Result<Self, anyhow::Error> {
        let info = probe_source(path)?;
        info!(
            "file info: channels: {}, sample_rate: {}, duration: {:?}",
            info.channels, info.sample_rate, info.duration
        );

        let rb = HeapRb::<f32>::new(RING_CAPACITY);
        let (producer, consumer) = rb.split();

        let is_playing = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let played_samples = Arc::new(AtomicU64::new(0));
        let flush = Arc::new(FlushSync::default());

        let output = setup_output_device()?;

        let (decoder_handle, cmd_tx) = spawn_decoder_with_ctrl(
            path.to_string(),
            producer,
            is_playing.clone(),
            DecoderTarget {
                channels: output.output_channels,
                sample_rate: output.output_sample_rate,
            },
            flush.clone(),
        );

        let err_fn = |err| log::error!("output stream error: {err}");
        let OutputConfig {
            device,
            config,
            sample_format,
            output_channels,
            output_sample_rate,
        } = output;

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, _>(
                &device,
                &config,
                is_playing.clone(),
                volume.clone(),
                played_samples.clone(),
                flush.clone(),
                consumer,
                err_fn,
            )?,
            SampleFormat::I16 => build_stream::<i16, _>(
                &device,
                &config,
                is_playing.clone(),
                volume.clone(),
                played_samples.clone(),
                flush.clone(),
                consumer,
                err_fn,
            )?,
            SampleFormat::U16 => build_stream::<u16, _>(
                &device,
                &config,
                is_playing.clone(),
                volume.clone(),
                played_samples.clone(),
                flush.clone(),
                consumer,
                err_fn,
            )?,
            _ => anyhow::bail!("Unsupported sample format: {:?}", sample_format),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            _decoder_handle: decoder_handle,
            path: path.to_string(),
            is_playing,
            volume,
            info,
            played_samples,
            flush,
            output_sample_rate,
            output_channels: output_channels as u16,
            cmd_tx,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn total_duration(&self) -> Duration {
        self.info.duration
    }

    pub fn current_time(&self) -> Duration {
        let samples = self.played_samples.load(Ordering::Relaxed) as f64;
        let frames = samples / self.output_channels as f64;
        let seconds = frames / self.output_sample_rate as f64;
        let pos = Duration::from_secs_f64(seconds);
        if self.info.duration.is_zero() {
            pos
        } else {
            pos.min(self.info.duration)
        }
    }

    pub fn toggle_playback(&self) {
        self.is_playing.fetch_xor(true, Ordering::Relaxed);
    }

    pub fn set_volume(&self, level: f32) {
        let new_float = level.clamp(0.0, 1.0);
        self.volume.store(new_float.to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Absolute seek, clamped to the file length.
    pub fn seek_to(&self, pos: Duration) -> Result<(), anyhow::Error> {
        let pos = if self.info.duration.is_zero() {
            pos
        } else {
            pos.min(self.info.duration)
        };

        self.flush.request();
        self.cmd_tx
            .send(DecoderCmd::Seek(pos))
            .context("decoder thread is gone")?;

        // Update the clock immediately so the UI does not lag the seek.
        let frames = (pos.as_secs_f64() * self.output_sample_rate as f64).round();
        let samples = (frames as u64).saturating_mul(self.output_channels as u64);
        self.played_samples.store(samples, Ordering::Relaxed);
        Ok(())
    }

    /// Relative seek in seconds (signed).
    pub fn seek_by_secs(&self, delta_secs: f64) -> Result<(), anyhow::Error> {
        self.seek_to(relative_target(self.current_time(), delta_secs)?)
    }
}

/// `current + delta_secs`, floored at 0. Non-finite or out of range steps are errors.
fn relative_target(current: Duration, delta_secs: f64) -> Result<Duration, anyhow::Error> {
    anyhow::ensure!(delta_secs.is_finite(), "seek step {delta_secs} is not finite");
    let target = (current.as_secs_f64() + delta_secs).max(0.0);
    Duration::try_from_secs_f64(target).with_context(|| format!("seek target {target}s out of range"))
}

impl Transport for AudioPlayer {
    fn position(&self) -> Duration {
        self.current_time()
    }

    fn seek(&mut self, pos: Duration) -> anyhow::Result<()> {
        self.seek_to(pos)
    }

    fn play(&mut self) {
        self.is_playing.store(true, Ordering::Relaxed);
    }

    fn pause(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
        if self.cmd_tx.send(DecoderCmd::Shutdown).is_err() {
            warn!("decoder for {} already stopped", self.path);
        }
        // Unblocks a decoder waiting on a full ring.
        self.flush.request();
    }
}
