//! The capture stream.

use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{
    acquire_with_handoff, on_off, HandoffTarget, StreamFlags, StreamGuard, INPUT_WAKE_LOCK,
};
use crate::config::{
    input_buffer_size, nearest_input_rate, SampleFormat, StreamParams, StreamRequest, HW_CHANNELS,
    HW_SAMPLE_RATE,
};
use crate::device::AudioDevices;
use crate::driver::{Pcm, PcmConfig, PcmDirection, PcmPath};
use crate::event::{HalEvent, StreamKind};
use crate::format::convert::{bytes_to_samples, samples_to_bytes};
use crate::format::{BufferProvider, CaptureChain};
use crate::hardware::{HalContext, HwShared, HwState};
use crate::params::{ParamBag, KEY_ROUTING};
use crate::routing::RouteCategory;
use crate::stream::OutputStream;
use crate::trace::{DriverOp, DriverTrace};
use crate::{HalError, PcmError};

/// State guarded by an input stream lock.
pub(crate) struct InputInner {
    pcm: Option<Box<dyn Pcm>>,
    devices: AudioDevices,
    chain: CaptureChain,
    raw: Vec<u8>,
    samples: Vec<i16>,
}

/// Reads hardware-format frames straight from the capture PCM.
struct PcmCapture<'a> {
    pcm: &'a mut Box<dyn Pcm>,
    bytes: &'a mut Vec<u8>,
    trace: &'a DriverTrace,
}

impl BufferProvider for PcmCapture<'_> {
    fn next_buffer(&mut self, out: &mut [i16]) -> Result<usize, PcmError> {
        self.bytes.resize(out.len() * 2, 0);
        let pcm = &mut *self.pcm;
        let bytes = self.bytes.as_mut_slice();
        self.trace.call(DriverOp::PcmRead, || pcm.read(&mut *bytes))?;
        bytes_to_samples(bytes, out);
        Ok(out.len() / usize::from(HW_CHANNELS))
    }
}

/// A capture stream of an [`AudioHardware`](crate::AudioHardware).
///
/// The codec always captures 44.1kHz stereo; mono and lower rates are
/// produced by the stream's capture chain.
pub struct InputStream {
    ctx: Arc<HalContext>,
    hw: Weak<HwShared>,
    inner: Arc<Mutex<InputInner>>,
    flags: StreamFlags,
    trace: DriverTrace,
    params: StreamParams,
    buffer_size: usize,
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("params", &self.params)
            .field("buffer_size", &self.buffer_size)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl InputStream {
    /// Validates `request` and creates a stream in standby.
    ///
    /// Unset fields default to the hardware format. A rate that is not
    /// exactly supported is rejected with the nearest supported rate.
    pub(crate) fn open(
        ctx: Arc<HalContext>,
        hw: Weak<HwShared>,
        devices: AudioDevices,
        request: StreamRequest,
    ) -> Result<Self, HalError> {
        let format = request.format.unwrap_or(SampleFormat::Pcm16);
        let channels = request.channels.unwrap_or(HW_CHANNELS);
        let sample_rate = request.sample_rate.unwrap_or(HW_SAMPLE_RATE);

        let channels_ok = (1..=2).contains(&channels);
        let nearest = nearest_input_rate(sample_rate);

        if format != SampleFormat::Pcm16 || !channels_ok || sample_rate != nearest {
            tracing::warn!(?request, nearest, "input stream: unsupported config");
            return Err(HalError::UnsupportedConfig {
                requested: request,
                supported: StreamParams {
                    format: SampleFormat::Pcm16,
                    channels: if channels_ok { channels } else { HW_CHANNELS },
                    sample_rate: nearest,
                },
            });
        }

        let params = StreamParams {
            format,
            channels,
            sample_rate,
        };
        let period_size = ctx.config.input_period_size;
        let chain = CaptureChain::new(&params, period_size as usize)?;
        let buffer_size = input_buffer_size(period_size, sample_rate, format, channels);

        Ok(Self {
            ctx,
            hw,
            inner: Arc::new(Mutex::new(InputInner {
                pcm: None,
                devices,
                chain,
                raw: Vec::new(),
                samples: Vec::new(),
            })),
            flags: StreamFlags::new(),
            trace: DriverTrace::default(),
            params,
            buffer_size,
        })
    }

    /// Returns the stream format as delivered to the caller.
    #[must_use]
    pub fn params(&self) -> StreamParams {
        self.params
    }

    /// Returns the preferred read size in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the capture device.
    pub fn devices(&self) -> AudioDevices {
        self.inner.lock().devices
    }

    /// Returns true while the PCM is closed.
    pub fn is_standby(&self) -> bool {
        self.flags.is_standby()
    }

    /// Capture never drops frames on overrun; always 0.
    #[must_use]
    pub fn frames_lost(&self) -> u32 {
        0
    }

    /// Capture gain is not adjustable on this hardware.
    pub fn set_gain(&self, _gain: f32) -> Result<(), HalError> {
        Err(HalError::invalid_operation("input gain is not supported"))
    }

    /// Fills `buffer` with captured frames, leaving standby first if needed.
    ///
    /// Blocks until every whole frame of `buffer` is filled and returns the
    /// number of bytes written; a trailing partial frame is left untouched.
    /// A buffer shorter than one frame is a bad value. On failure the stream
    /// drops to standby and the call still takes as long as `buffer` would
    /// have taken to capture.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize, HalError> {
        let frame_size = self.params.frame_size();
        let len = buffer.len() / frame_size * frame_size;
        if len == 0 {
            return Err(HalError::bad_value(format!(
                "read of {} bytes is shorter than one {frame_size}-byte frame",
                buffer.len()
            )));
        }
        let buffer = &mut buffer[..len];
        self.flags.yield_if_requested(self.ctx.config.sleep_request_delay);

        let mut guard = self.inner.lock_arc();
        let result = self
            .wake_up(&mut guard)
            .and_then(|()| self.read_frames(&mut guard, buffer));

        match result {
            Ok(()) => {
                tracing::trace!(bytes = len, "input stream: read");
                Ok(len)
            }
            Err(e) => {
                drop(guard);
                tracing::error!(error = %e, "input stream: read failed");
                self.ctx.emit(HalEvent::IoError {
                    stream: StreamKind::Input,
                    error: e.to_string(),
                });
                if let Err(standby_err) = self.standby() {
                    tracing::warn!(error = %standby_err, "input stream: standby after read failure failed");
                }
                std::thread::sleep(self.params.duration_of(len));
                Err(e)
            }
        }
    }

    /// Closes the PCM and releases the wake lock.
    pub fn standby(&self) -> Result<(), HalError> {
        let shared = self.hw.upgrade().ok_or(HalError::NotInitialized)?;
        self.flags.request_lock();
        let mut inner = self.lock_stream();
        let mut hw = shared.state.lock();
        self.do_standby_l(&mut inner, &mut hw);
        Ok(())
    }

    /// Applies `key=value` pairs. `routing` selects the capture device and
    /// forces standby when it changes. Any other key is rejected.
    pub fn set_parameters(&self, pairs: &str) -> Result<(), HalError> {
        let shared = self.hw.upgrade().ok_or(HalError::NotInitialized)?;
        let mut bag = ParamBag::parse(pairs);

        self.flags.request_lock();
        let mut inner = self.lock_stream();

        if let Some(bits) = bag.get_int(KEY_ROUTING).and_then(|v| u32::try_from(v).ok()) {
            let device = AudioDevices::from_bits_retain(bits);
            if !device.is_empty() {
                let mut hw = shared.state.lock();
                if inner.devices != device {
                    self.do_standby_l(&mut inner, &mut hw);
                }
                inner.devices = device;
            }
            bag.remove(KEY_ROUTING);
        }

        if bag.is_empty() {
            Ok(())
        } else {
            Err(HalError::bad_value(format!("unsupported input parameters: {bag}")))
        }
    }

    /// Answers the requested keys. Only `routing` is filled in.
    pub fn get_parameters(&self, keys: &str) -> String {
        let mut bag = ParamBag::parse(keys);
        if bag.contains(KEY_ROUTING) {
            bag.insert(KEY_ROUTING, self.devices().bits().to_string());
        }
        bag.to_string()
    }

    /// Describes the stream state for diagnostics.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Input stream:");

        match self.inner.try_lock() {
            Some(inner) => {
                let _ = writeln!(out, "\tdevices: {:#x}", inner.devices.bits());
            }
            None => {
                let _ = writeln!(out, "\tstream lock busy (maybe deadlocked)");
            }
        }

        let _ = writeln!(out, "\tstandby: {}", on_off(self.flags.is_standby()));
        let _ = writeln!(out, "\tchannels: {}", self.params.channels);
        let _ = writeln!(out, "\tsample rate: {}", self.params.sample_rate);
        let _ = writeln!(out, "\tbuffer size: {}", self.buffer_size);
        let _ = writeln!(out, "\tdriver op: {:?}", self.trace.current());
        out
    }

    /// Takes the stream lock on behalf of another thread.
    pub(crate) fn lock_stream(&self) -> StreamGuard<InputInner> {
        let guard = self.inner.lock_arc();
        self.flags.clear_request();
        guard
    }

    /// Marks the stream as closed by the hardware. Later transfers fail.
    pub(crate) fn detach(&self) {
        self.flags.detach();
    }

    pub(crate) fn do_standby_l(&self, inner: &mut InputInner, _hw: &mut HwState) {
        self.flags.bump_generation();
        if self.flags.set_standby(true) {
            self.ctx.wake_lock.release(INPUT_WAKE_LOCK);
            tracing::debug!("input stream: entering standby");
            self.ctx.emit(HalEvent::StandbyEntered {
                stream: StreamKind::Input,
            });
        }
        self.close_l(inner);
    }

    pub(crate) fn open_l(&self, inner: &mut InputInner, hw: &mut HwState) -> Result<(), HalError> {
        let config = PcmConfig {
            direction: PcmDirection::Input,
            path: PcmPath::Codec,
            period_size: self.ctx.config.input_period_size,
            period_count: self.ctx.config.input_period_count,
            channels: HW_CHANNELS,
            sample_rate: HW_SAMPLE_RATE,
        };

        let pcm = self
            .trace
            .call(DriverOp::PcmOpen, || self.ctx.pcm.open(&config))
            .map_err(|e| {
                tracing::error!(error = %e, "input stream: cannot open pcm");
                e
            })?;

        if !pcm.is_ready() {
            tracing::error!("input stream: pcm not ready");
            self.trace.call(DriverOp::PcmClose, || drop(pcm));
            return Err(PcmError::NotReady.into());
        }
        inner.pcm = Some(pcm);
        inner.chain.reset();

        hw.set_audio_route(RouteCategory::Input, inner.devices.input_route());
        Ok(())
    }

    /// Closes the PCM. The input route stays as it is.
    pub(crate) fn close_l(&self, inner: &mut InputInner) {
        if let Some(pcm) = inner.pcm.take() {
            self.trace.call(DriverOp::PcmClose, || drop(pcm));
        }
    }

    /// Leaves standby, pausing an active output stream around the open.
    ///
    /// Both the hardware lock and this stream's own lock are released while
    /// waiting for the output lock, since the output orders first.
    fn wake_up(&self, guard: &mut StreamGuard<InputInner>) -> Result<(), HalError> {
        if !self.flags.is_standby() {
            return Ok(());
        }
        if self.flags.is_detached() {
            return Err(HalError::NotInitialized);
        }

        let shared = self.hw.upgrade().ok_or(HalError::NotInitialized)?;
        let mut hw = shared.state.lock();
        self.ctx.wake_lock.acquire(INPUT_WAKE_LOCK);

        let mut sibling = acquire_with_handoff(&mut hw, HwState::active_output, |out: &Arc<OutputStream>| {
            StreamGuard::unlocked(guard, || out.lock_stream())
        });
        if let Some(handoff) = &mut sibling {
            if handoff.retries > 0 {
                self.ctx.emit(HalEvent::HandoffRetried {
                    stream: StreamKind::Output,
                    attempts: handoff.retries,
                });
            }
            handoff.stream.close_l(&mut handoff.guard, &mut hw);
            if let Err(e) = handoff.stream.open_l(&mut handoff.guard, &mut hw) {
                tracing::warn!(error = %e, "input stream: cannot reopen output");
                handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
            }
        }
        drop(sibling);

        if let Err(e) = self.open_l(guard, &mut hw) {
            self.ctx.wake_lock.release(INPUT_WAKE_LOCK);
            return Err(e);
        }

        self.flags.set_standby(false);
        tracing::debug!(params = ?self.params, "input stream: leaving standby");
        self.ctx.emit(HalEvent::StandbyExited {
            stream: StreamKind::Input,
        });
        Ok(())
    }

    fn read_frames(&self, inner: &mut InputInner, buffer: &mut [u8]) -> Result<(), HalError> {
        let channels = usize::from(self.params.channels);
        let frames = buffer.len() / self.params.frame_size();
        let wanted = frames * channels;

        let InputInner {
            pcm,
            chain,
            raw,
            samples,
            ..
        } = inner;
        let pcm = pcm.as_mut().ok_or(PcmError::Disconnected)?;
        samples.resize(wanted, 0);

        let mut capture = PcmCapture {
            pcm,
            bytes: raw,
            trace: &self.trace,
        };

        let mut done = 0;
        while done < frames {
            let got = chain.pull(&mut capture, &mut samples[done * channels..wanted])?;
            if got == 0 {
                return Err(PcmError::transfer("capture chain produced no frames").into());
            }
            done += got;
        }

        samples_to_bytes(&samples[..wanted], buffer);
        Ok(())
    }
}

impl HandoffTarget for InputStream {
    fn prepare_lock(&self) -> u32 {
        self.flags.request_lock()
    }

    fn standby_generation(&self) -> u32 {
        self.flags.generation()
    }
}
