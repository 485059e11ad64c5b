//! PCM driver backed by the host's default CPAL devices.
//!
//! A CPAL stream is not `Send` on every platform, so each opened PCM owns a
//! dedicated thread that builds, plays and finally drops the stream. The
//! real-time callback and the blocking `write`/`read` calls meet in a
//! lock-free ring buffer sized to the requested kernel buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::{Pcm, PcmConfig, PcmDirection, PcmDriver, PcmPath};
use crate::format::convert::{bytes_to_samples, f32_to_i16, i16_to_f32, samples_to_bytes};
use crate::PcmError;

/// A transfer that makes no progress for this long fails.
const STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between ring buffer polls while a transfer waits.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Opens codec PCMs on the default CPAL output and input devices.
///
/// The Bluetooth path has no host equivalent and fails to open, which the
/// router logs and tolerates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalPcmDriver;

impl CpalPcmDriver {
    /// Creates the driver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// The callback's end of the ring buffer.
enum CallbackSide {
    Playback(HeapCons<i16>),
    Capture(HeapProd<i16>),
}

/// The caller's end of the ring buffer.
enum CallerSide {
    Playback(HeapProd<i16>),
    Capture(HeapCons<i16>),
}

impl PcmDriver for CpalPcmDriver {
    fn open(&self, config: &PcmConfig) -> Result<Box<dyn Pcm>, PcmError> {
        if config.path == PcmPath::Bluetooth {
            return Err(PcmError::open_failed("no bluetooth pcm on this host"));
        }

        let capacity = (config.period_size as usize
            * config.period_count as usize
            * usize::from(config.channels))
        .max(1);
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
        let (caller, callback) = match config.direction {
            PcmDirection::Output => (
                CallerSide::Playback(producer),
                CallbackSide::Playback(consumer),
            ),
            PcmDirection::Input => (
                CallerSide::Capture(consumer),
                CallbackSide::Capture(producer),
            ),
        };

        let failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = {
            let config = *config;
            let failed = failed.clone();
            thread::Builder::new()
                .name("cpal-pcm".into())
                .spawn(move || run_stream(config, callback, failed, ready_tx, stop_rx))
                .map_err(|e| PcmError::open_failed(format!("cannot spawn stream thread: {e}")))?
        };

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(PcmError::open_failed("stream thread exited")));
        if let Err(e) = started {
            drop(stop_tx);
            let _ = thread.join();
            return Err(e);
        }

        tracing::debug!(?config, "cpal pcm opened");
        Ok(Box::new(CpalPcm {
            side: caller,
            failed,
            stop: Some(stop_tx),
            thread: Some(thread),
            scratch: Vec::new(),
        }))
    }
}

fn run_stream(
    config: PcmConfig,
    side: CallbackSide,
    failed: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), PcmError>>,
    stop: mpsc::Receiver<()>,
) {
    let stream = match build_stream(&config, side, failed) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(PcmError::open_failed(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    // Returns once the handle drops its sender.
    let _ = stop.recv();
    drop(stream);
}

fn build_stream(
    config: &PcmConfig,
    side: CallbackSide,
    failed: Arc<AtomicBool>,
) -> Result<Stream, PcmError> {
    let host = cpal::default_host();
    let cpal_config = CpalStreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = move |err: cpal::StreamError| {
        tracing::error!(error = %err, "cpal stream error");
        failed.store(true, Ordering::Release);
    };

    let stream = match side {
        CallbackSide::Playback(mut consumer) => {
            let device = host
                .default_output_device()
                .ok_or_else(|| PcmError::open_failed("no default output device"))?;
            let format = device
                .default_output_config()
                .map_err(|e| PcmError::open_failed(e.to_string()))?
                .sample_format();

            match format {
                SampleFormat::I16 => device.build_output_stream(
                    &cpal_config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let n = consumer.pop_slice(data);
                        data[n..].fill(0);
                    },
                    on_error,
                    None,
                ),
                SampleFormat::F32 => device.build_output_stream(
                    &cpal_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for sample in data.iter_mut() {
                            *sample = consumer.try_pop().map_or(0.0, i16_to_f32);
                        }
                    },
                    on_error,
                    None,
                ),
                other => {
                    return Err(PcmError::open_failed(format!(
                        "unsupported sample format {other:?}"
                    )))
                }
            }
        }
        CallbackSide::Capture(mut producer) => {
            let device = host
                .default_input_device()
                .ok_or_else(|| PcmError::open_failed("no default input device"))?;
            let format = device
                .default_input_config()
                .map_err(|e| PcmError::open_failed(e.to_string()))?
                .sample_format();

            match format {
                SampleFormat::I16 => device.build_input_stream(
                    &cpal_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        // drops samples if the reader falls behind
                        let _ = producer.push_slice(data);
                    },
                    on_error,
                    None,
                ),
                SampleFormat::F32 => device.build_input_stream(
                    &cpal_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        for &sample in data {
                            let _ = producer.try_push(f32_to_i16(sample));
                        }
                    },
                    on_error,
                    None,
                ),
                other => {
                    return Err(PcmError::open_failed(format!(
                        "unsupported sample format {other:?}"
                    )))
                }
            }
        }
    };

    stream.map_err(|e| PcmError::open_failed(e.to_string()))
}

/// An open CPAL-backed PCM.
struct CpalPcm {
    side: CallerSide,
    failed: Arc<AtomicBool>,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    scratch: Vec<i16>,
}

impl CpalPcm {
    fn check_failed(&self) -> Result<(), PcmError> {
        if self.failed.load(Ordering::Acquire) {
            Err(PcmError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl Pcm for CpalPcm {
    fn is_ready(&self) -> bool {
        !self.failed.load(Ordering::Acquire)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PcmError> {
        self.scratch.resize(data.len() / 2, 0);
        bytes_to_samples(data, &mut self.scratch);

        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < self.scratch.len() {
            self.check_failed()?;
            let CallerSide::Playback(producer) = &mut self.side else {
                return Err(PcmError::transfer("write on a capture pcm"));
            };

            let pushed = producer.push_slice(&self.scratch[offset..]);
            if pushed > 0 {
                offset += pushed;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(PcmError::transfer("playback stalled"));
            } else {
                thread::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
        self.scratch.resize(data.len() / 2, 0);

        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < self.scratch.len() {
            self.check_failed()?;
            let CallerSide::Capture(consumer) = &mut self.side else {
                return Err(PcmError::transfer("read on a playback pcm"));
            };

            let popped = consumer.pop_slice(&mut self.scratch[offset..]);
            if popped > 0 {
                offset += popped;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(PcmError::transfer("capture stalled"));
            } else {
                thread::sleep(POLL_INTERVAL);
            }
        }

        samples_to_bytes(&self.scratch, data);
        Ok(())
    }
}

impl Drop for CpalPcm {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("cpal stream thread panicked");
            }
        }
    }
}
