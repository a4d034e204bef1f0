// src/decoder/mod.rs

pub mod control;
pub mod dsp;
pub mod output;
pub mod resample;

use anyhow::{anyhow, Context};
use log::{debug, error, warn};
use ringbuf::traits::Producer as RbProducer;
use rubato::{Resampler, SincFixedIn};
use std::fs::File;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, Receiver, Sender, TryRecvError},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::Time;
use symphonia::default::{get_codecs, get_probe};

pub use control::{DecoderCmd, FlushSync};

/// Output format the decoder converts to.
#[derive(Clone, Copy, Debug)]
pub struct DecoderTarget {
    pub channels: usize,
    pub sample_rate: u32,
}

/// What happened while waiting at end of stream.
enum Next {
    Seek(Duration),
    Exit,
}

pub struct Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    path: String,
    producer: P,
    is_playing: Arc<AtomicBool>,
    target: DecoderTarget,
    cmd_rx: Receiver<DecoderCmd>,
    flush: Arc<FlushSync>,
    post_seek_fade_samples: usize,
}

/// Samples staged between the codec and the ring buffer.
struct Stage {
    sample_buf: Option<SampleBuffer<f32>>,
    planar: Vec<Vec<f32>>,
    resampler: Option<SincFixedIn<f32>>,
}

impl Stage {
    fn reset(&mut self) {
        self.sample_buf = None;
        for lane in &mut self.planar {
            lane.clear();
        }
        if let Some(r) = &mut self.resampler {
            r.reset();
        }
    }
}

impl<P> Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            let path = self.path.clone();
            if let Err(e) = self.run() {
                error!("decoder thread for {path} failed: {e:#}");
            }
        })
    }

    fn run(mut self) -> Result<(), anyhow::Error> {
        let file = File::open(&self.path).with_context(|| format!("opening {}", self.path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = get_probe().format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default audio track"))?;
        let track_id = track.id;
        let source_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("missing sample rate"))?;

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
        let mut stage = Stage {
            sample_buf: None,
            planar: vec![Vec::with_capacity(4096); self.target.channels],
            resampler: resample::build_resampler(
                source_rate,
                self.target.sample_rate,
                self.target.channels,
            )?,
        };

        let mut at_end = false;

        loop {
            loop {
                match self.cmd_rx.try_recv() {
                    Ok(DecoderCmd::Seek(target)) => {
                        self.seek(format.as_mut(), track_id, target, &mut stage);
                        decoder.reset();
                        at_end = false;
                    }
                    Ok(DecoderCmd::Shutdown) | Err(TryRecvError::Disconnected) => return Ok(()),
                    Err(TryRecvError::Empty) => break,
                }
            }

            // Anything decoded now would be thrown out with the old samples.
            if self.flush.is_pending() {
                thread::park_timeout(Duration::from_millis(1));
                continue;
            }

            if at_end {
                self.drain(&mut stage)?;
                match self.wait_at_end() {
                    Next::Seek(target) => {
                        self.seek(format.as_mut(), track_id, target, &mut stage);
                        decoder.reset();
                        at_end = false;
                        continue;
                    }
                    Next::Exit => return Ok(()),
                }
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(e) => {
                    debug!("end of stream for {}: {e}", self.path);
                    at_end = true;
                    continue;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => {
                    warn!("decoder for {} stopped: {e}", self.path);
                    at_end = true;
                    continue;
                }
            };

            let decoded_ch = decoded.spec().channels.count();
            let buf = stage.sample_buf.get_or_insert_with(|| {
                SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
            });
            buf.copy_interleaved_ref(decoded);

            let mixed = if decoded_ch == self.target.channels {
                buf.samples().to_vec()
            } else {
                dsp::updown_mix_interleaved(buf.samples(), decoded_ch, self.target.channels)
            };

            match stage.resampler.as_mut() {
                Some(r) => {
                    dsp::append_interleaved_to_planar(&mixed, &mut stage.planar);
                    while let Some(out_block) = resample::try_process_exact(r, &mut stage.planar) {
                        if !self.push(&dsp::interleave(&out_block)) {
                            break;
                        }
                    }
                }
                None => {
                    self.push(&mixed);
                }
            }

            if !self.is_playing.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    fn push(&mut self, interleaved: &[f32]) -> bool {
        output::push_with_fade(
            &mut self.producer,
            interleaved,
            &mut self.post_seek_fade_samples,
            &self.flush,
        )
    }

    fn seek(
        &mut self,
        format: &mut dyn FormatReader,
        track_id: u32,
        target: Duration,
        stage: &mut Stage,
    ) {
        let time = Time::new(target.as_secs(), target.subsec_nanos() as f64 / 1_000_000_000f64);
        if let Err(e) = format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(track_id),
            },
        ) {
            // Past the end or unseekable: keep the current read position.
            warn!("seek to {:.2}s failed: {e}", target.as_secs_f64());
        }

        stage.reset();
        self.post_seek_fade_samples =
            dsp::fade_samples_ms(self.target.sample_rate, 10) * self.target.channels;
    }

    /// Pushes what the resampler still holds.
    fn drain(&mut self, stage: &mut Stage) -> Result<(), anyhow::Error> {
        if let Some(r) = stage.resampler.as_mut() {
            for block in resample::flush(r, &mut stage.planar)? {
                if !self.push(&dsp::interleave(&block)) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// At end of stream only a seek brings the decoder back.
    fn wait_at_end(&self) -> Next {
        match self.cmd_rx.recv() {
            Ok(DecoderCmd::Seek(target)) => Next::Seek(target),
            Ok(DecoderCmd::Shutdown) | Err(_) => Next::Exit,
        }
    }
}

pub fn spawn_decoder_with_ctrl<P>(
    path: String,
    producer: P,
    is_playing: Arc<AtomicBool>,
    target: DecoderTarget,
    flush: Arc<FlushSync>,
) -> (JoinHandle<()>, Sender<DecoderCmd>)
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    let (tx, rx) = channel();
    let handle = Decoder {
        path,
        producer,
        is_playing,
        target,
        cmd_rx: rx,
        flush,
        post_seek_fade_samples: 0,
    }
    .spawn();
    (handle, tx)
}
