//! The playback stream.

use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    acquire_with_handoff, on_off, HandoffTarget, StreamFlags, StreamGuard, OUTPUT_WAKE_LOCK,
};
use crate::config::{StreamParams, StreamRequest};
use crate::device::{AudioDevices, AudioMode};
use crate::driver::{Pcm, PcmConfig, PcmDirection, PcmPath};
use crate::event::{HalEvent, StreamKind};
use crate::hardware::{HalContext, HwShared, HwState};
use crate::params::{ParamBag, KEY_ROUTING};
use crate::routing::{EndpointMask, RouteCategory};
use crate::stream::InputStream;
use crate::trace::{DriverOp, DriverTrace};
use crate::{HalError, PcmError};

/// State guarded by the output stream lock.
pub(crate) struct OutputInner {
    pcm: Option<Box<dyn Pcm>>,
    devices: AudioDevices,
}

/// The single playback stream of an [`AudioHardware`](crate::AudioHardware).
///
/// Always runs at the codec's native format, 44.1kHz stereo PCM16.
pub struct OutputStream {
    ctx: Arc<HalContext>,
    hw: Weak<HwShared>,
    inner: Arc<Mutex<OutputInner>>,
    flags: StreamFlags,
    trace: DriverTrace,
    params: StreamParams,
    buffer_size: usize,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("params", &self.params)
            .field("buffer_size", &self.buffer_size)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl OutputStream {
    /// Validates `request` and creates a stream in standby.
    ///
    /// Every field of the request that is set must match the hardware format.
    pub(crate) fn open(
        ctx: Arc<HalContext>,
        hw: Weak<HwShared>,
        devices: AudioDevices,
        request: StreamRequest,
    ) -> Result<Self, HalError> {
        let supported = StreamParams::HARDWARE;
        let mismatch = request.format.is_some_and(|f| f != supported.format)
            || request.channels.is_some_and(|c| c != supported.channels)
            || request.sample_rate.is_some_and(|r| r != supported.sample_rate);

        if mismatch {
            tracing::warn!(?request, "output stream: unsupported config");
            return Err(HalError::UnsupportedConfig {
                requested: request,
                supported,
            });
        }

        let buffer_size = ctx.config.output_buffer_bytes();
        Ok(Self {
            ctx,
            hw,
            inner: Arc::new(Mutex::new(OutputInner { pcm: None, devices })),
            flags: StreamFlags::new(),
            trace: DriverTrace::default(),
            params: supported,
            buffer_size,
        })
    }

    /// Returns the stream format.
    #[must_use]
    pub fn params(&self) -> StreamParams {
        self.params
    }

    /// Returns the preferred write size in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the playback latency of the kernel buffer plus the
    /// configured extra latency.
    #[must_use]
    pub fn latency(&self) -> Duration {
        let config = &self.ctx.config;
        let millis = 1000 * u64::from(config.output_period_count) * u64::from(config.output_period_size)
            / u64::from(self.params.sample_rate);
        Duration::from_millis(millis) + config.output_extra_latency
    }

    /// Returns the devices the stream plays to.
    pub fn devices(&self) -> AudioDevices {
        self.inner.lock().devices
    }

    /// Returns true while the PCM is closed.
    pub fn is_standby(&self) -> bool {
        self.flags.is_standby()
    }

    /// Writes `buffer` to the codec, leaving standby first if needed.
    ///
    /// Blocks until the whole buffer is transferred. On failure the stream
    /// drops to standby and the call still takes as long as `buffer` would
    /// have taken to play.
    pub fn write(&self, buffer: &[u8]) -> Result<usize, HalError> {
        self.flags.yield_if_requested(self.ctx.config.sleep_request_delay);

        let mut inner = self.inner.lock_arc();
        let result = self
            .wake_up(&mut inner)
            .and_then(|()| self.write_pcm(&mut inner, buffer));

        match result {
            Ok(()) => {
                tracing::trace!(bytes = buffer.len(), "output stream: wrote");
                Ok(buffer.len())
            }
            Err(e) => {
                drop(inner);
                tracing::error!(error = %e, "output stream: write failed");
                self.ctx.emit(HalEvent::IoError {
                    stream: StreamKind::Output,
                    error: e.to_string(),
                });
                if let Err(standby_err) = self.standby() {
                    tracing::warn!(error = %standby_err, "output stream: standby after write failure failed");
                }
                std::thread::sleep(self.params.duration_of(buffer.len()));
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

    /// Applies `key=value` pairs.
    ///
    /// `routing` selects the output device. Outside a call a device change
    /// forces standby so the next write reopens on the new route; during a
    /// call the voice path follows the device instead. Any other key is
    /// rejected.
    pub fn set_parameters(&self, pairs: &str) -> Result<(), HalError> {
        let shared = self.hw.upgrade().ok_or(HalError::NotInitialized)?;
        let mut bag = ParamBag::parse(pairs);

        self.flags.request_lock();
        let mut inner = self.lock_stream();

        if let Some(bits) = bag.get_int(KEY_ROUTING).and_then(|v| u32::try_from(v).ok()) {
            let device = AudioDevices::from_bits_retain(bits);
            if !device.is_empty() {
                let mut hw = shared.state.lock();
                if inner.devices != device && hw.mode != AudioMode::InCall {
                    self.do_standby_l(&mut inner, &mut hw);
                }
                inner.devices = device;
                if hw.mode == AudioMode::InCall {
                    hw.set_incall_path(device);
                }
            }
            bag.remove(KEY_ROUTING);
        }

        if bag.is_empty() {
            Ok(())
        } else {
            Err(HalError::bad_value(format!("unsupported output parameters: {bag}")))
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

    /// Not supported by this hardware.
    pub fn render_position(&self) -> Result<u32, HalError> {
        Err(HalError::invalid_operation("render position is not supported"))
    }

    /// Describes the stream state for diagnostics.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Output stream:");

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
    pub(crate) fn lock_stream(&self) -> StreamGuard<OutputInner> {
        let guard = self.inner.lock_arc();
        self.flags.clear_request();
        guard
    }

    /// Marks the stream as closed by the hardware. Later transfers fail.
    pub(crate) fn detach(&self) {
        self.flags.detach();
    }

    pub(crate) fn do_standby_l(&self, inner: &mut OutputInner, hw: &mut HwState) {
        self.flags.bump_generation();
        if self.flags.set_standby(true) {
            self.ctx.wake_lock.release(OUTPUT_WAKE_LOCK);
            tracing::debug!("output stream: entering standby");
            self.ctx.emit(HalEvent::StandbyEntered {
                stream: StreamKind::Output,
            });
        }
        self.close_l(inner, hw);
    }

    pub(crate) fn open_l(&self, inner: &mut OutputInner, hw: &mut HwState) -> Result<(), HalError> {
        let config = PcmConfig {
            direction: PcmDirection::Output,
            path: PcmPath::Codec,
            period_size: self.ctx.config.output_period_size,
            period_count: self.ctx.config.output_period_count,
            channels: self.params.channels,
            sample_rate: self.params.sample_rate,
        };

        let pcm = self
            .trace
            .call(DriverOp::PcmOpen, || self.ctx.pcm.open(&config))
            .map_err(|e| {
                tracing::error!(error = %e, "output stream: cannot open pcm");
                e
            })?;

        if !pcm.is_ready() {
            tracing::error!("output stream: pcm not ready");
            self.trace.call(DriverOp::PcmClose, || drop(pcm));
            return Err(PcmError::NotReady.into());
        }
        inner.pcm = Some(pcm);

        if hw.mode != AudioMode::InCall {
            hw.set_audio_route(RouteCategory::Output, inner.devices.output_route());
        }
        Ok(())
    }

    pub(crate) fn close_l(&self, inner: &mut OutputInner, hw: &mut HwState) {
        hw.set_audio_route(RouteCategory::Output, EndpointMask::empty());
        if let Some(pcm) = inner.pcm.take() {
            self.trace.call(DriverOp::PcmClose, || drop(pcm));
        }
    }

    /// Leaves standby, taking the codec from an active input stream.
    ///
    /// The input's PCM is closed while the output opens and reopened after,
    /// so both run without one stealing the other's clocks.
    fn wake_up(&self, inner: &mut OutputInner) -> Result<(), HalError> {
        if !self.flags.is_standby() {
            return Ok(());
        }
        if self.flags.is_detached() {
            return Err(HalError::NotInitialized);
        }

        let shared = self.hw.upgrade().ok_or(HalError::NotInitialized)?;
        let mut hw = shared.state.lock();
        self.ctx.wake_lock.acquire(OUTPUT_WAKE_LOCK);

        let mut sibling = acquire_with_handoff(&mut hw, HwState::active_input, |input: &Arc<InputStream>| {
            input.lock_stream()
        });
        if let Some(handoff) = &mut sibling {
            if handoff.retries > 0 {
                self.ctx.emit(HalEvent::HandoffRetried {
                    stream: StreamKind::Input,
                    attempts: handoff.retries,
                });
            }
            handoff.stream.close_l(&mut handoff.guard);
        }

        let opened = self.open_l(inner, &mut hw);

        if let Some(mut handoff) = sibling {
            if let Err(e) = handoff.stream.open_l(&mut handoff.guard, &mut hw) {
                tracing::warn!(error = %e, "output stream: cannot reopen input");
                handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
            }
        }

        if let Err(e) = opened {
            self.ctx.wake_lock.release(OUTPUT_WAKE_LOCK);
            return Err(e);
        }

        self.flags.set_standby(false);
        tracing::debug!(devices = ?inner.devices, "output stream: leaving standby");
        self.ctx.emit(HalEvent::StandbyExited {
            stream: StreamKind::Output,
        });
        Ok(())
    }

    fn write_pcm(&self, inner: &mut OutputInner, buffer: &[u8]) -> Result<(), HalError> {
        let pcm = inner.pcm.as_mut().ok_or(PcmError::Disconnected)?;
        self.trace.call(DriverOp::PcmWrite, || pcm.write(buffer))?;
        Ok(())
    }
}

impl HandoffTarget for OutputStream {
    fn prepare_lock(&self) -> u32 {
        self.flags.request_lock()
    }

    fn standby_generation(&self) -> u32 {
        self.flags.generation()
    }
}
