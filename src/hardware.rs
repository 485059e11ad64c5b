//! The hardware facade.
//!
//! [`AudioHardware`] owns the router, the single output stream and the
//! input streams. Every router call happens under the hardware lock, either
//! taken here or by a stream that already holds its own lock.

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::builder::AudioHardwareBuilder;
use crate::config::{input_buffer_size, HalConfig, SampleFormat, StreamRequest};
use crate::device::{AudioDevices, AudioMode};
use crate::driver::{PcmDriver, WakeLock};
use crate::event::{self, EventCallback, HalEvent, StreamKind};
use crate::routing::{EndpointMask, RouteCategory, Router};
use crate::stream::{acquire_with_handoff, InputStream, OutputStream};
use crate::trace::DriverTrace;
use crate::HalError;

/// Drivers and settings shared by the hardware and its streams.
pub(crate) struct HalContext {
    pub(crate) pcm: Arc<dyn PcmDriver>,
    pub(crate) wake_lock: Arc<dyn WakeLock>,
    pub(crate) events: Option<EventCallback>,
    pub(crate) config: HalConfig,
}

impl HalContext {
    pub(crate) fn emit(&self, event: HalEvent) {
        event::emit(self.events.as_ref(), event);
    }
}

/// The part of the hardware streams point back to.
pub(crate) struct HwShared {
    pub(crate) state: Mutex<HwState>,
    ctx: Arc<HalContext>,
    router_trace: Arc<DriverTrace>,
    init_ok: bool,
}

/// State guarded by the hardware lock.
pub(crate) struct HwState {
    router: Option<Router>,
    output: Option<Arc<OutputStream>>,
    inputs: Vec<Arc<InputStream>>,
    pub(crate) mode: AudioMode,
    mic_mute: bool,
    in_call: bool,
    voice_volume: f32,
}

impl HwState {
    /// Returns the output stream if it is out of standby.
    pub(crate) fn active_output(&self) -> Option<Arc<OutputStream>> {
        self.output.as_ref().filter(|out| !out.is_standby()).cloned()
    }

    /// Returns the first input stream out of standby.
    pub(crate) fn active_input(&self) -> Option<Arc<InputStream>> {
        self.inputs.iter().find(|input| !input.is_standby()).cloned()
    }

    pub(crate) fn set_audio_route(&mut self, category: RouteCategory, mask: EndpointMask) {
        if let Some(router) = &mut self.router {
            router.set_audio_route(category, mask);
        }
    }

    fn set_route_disable(&mut self, category: RouteCategory, disabled: bool) {
        if let Some(router) = &mut self.router {
            router.set_route_disable(category, disabled);
        }
    }

    /// Points the voice routes at `device`. Does nothing outside a call.
    pub(crate) fn set_incall_path(&mut self, device: AudioDevices) {
        if self.mode != AudioMode::InCall {
            return;
        }

        let Some(router) = &mut self.router else {
            tracing::warn!(?device, "in-call path change without a router");
            return;
        };

        tracing::debug!(?device, "in-call route");
        router.set_audio_route(RouteCategory::VoiceOut, device.voice_out_route());
        router.set_audio_route(RouteCategory::VoiceIn, device.voice_in_route());
    }
}

/// The audio hardware: routing, mode, volumes and stream lifecycle.
///
/// Create one with [`AudioHardware::builder()`].
pub struct AudioHardware {
    shared: Arc<HwShared>,
}

impl std::fmt::Debug for AudioHardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHardware")
            .field("init_ok", &self.shared.init_ok)
            .finish_non_exhaustive()
    }
}

impl AudioHardware {
    /// Creates a new builder for configuring the hardware.
    pub fn builder() -> AudioHardwareBuilder {
        AudioHardwareBuilder::new()
    }

    pub(crate) fn from_parts(
        ctx: Arc<HalContext>,
        router: Option<Router>,
        router_trace: Arc<DriverTrace>,
    ) -> Self {
        let init_ok = router.is_some();
        let state = HwState {
            router,
            output: None,
            inputs: Vec::new(),
            mode: AudioMode::Normal,
            mic_mute: false,
            in_call: false,
            voice_volume: 0.0,
        };

        Self {
            shared: Arc::new(HwShared {
                state: Mutex::new(state),
                ctx,
                router_trace,
                init_ok,
            }),
        }
    }

    /// Returns an error if the mixer could not be opened.
    pub fn init_check(&self) -> Result<(), HalError> {
        if self.shared.init_ok {
            Ok(())
        } else {
            Err(HalError::NotInitialized)
        }
    }

    /// Opens the output stream.
    ///
    /// Only one output stream may be open at a time.
    pub fn open_output_stream(
        &self,
        devices: AudioDevices,
        request: StreamRequest,
    ) -> Result<Arc<OutputStream>, HalError> {
        let mut hw = self.shared.state.lock();
        if hw.output.is_some() {
            return Err(HalError::invalid_operation("an output stream is already open"));
        }

        let out = Arc::new(OutputStream::open(
            self.shared.ctx.clone(),
            Arc::downgrade(&self.shared),
            devices,
            request,
        )?);
        hw.output = Some(out.clone());
        tracing::debug!(?devices, "output stream opened");
        Ok(out)
    }

    /// Closes `stream`, putting it to standby first.
    pub fn close_output_stream(&self, stream: &Arc<OutputStream>) -> Result<(), HalError> {
        let out = {
            let mut hw = self.shared.state.lock();
            let is_current = hw
                .output
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, stream));
            if is_current {
                hw.output.take()
            } else {
                None
            }
        };

        let Some(out) = out else {
            tracing::warn!("Attempt to close invalid output stream");
            return Err(HalError::invalid_operation("not the open output stream"));
        };
        retire_output(&out);
        Ok(())
    }

    /// Opens a capture stream on `devices`, which must be a single input
    /// device.
    pub fn open_input_stream(
        &self,
        devices: AudioDevices,
        request: StreamRequest,
    ) -> Result<Arc<InputStream>, HalError> {
        if !devices.is_input_device() {
            return Err(HalError::bad_value(format!(
                "{:#x} is not an input device",
                devices.bits()
            )));
        }

        let mut hw = self.shared.state.lock();
        let input = Arc::new(InputStream::open(
            self.shared.ctx.clone(),
            Arc::downgrade(&self.shared),
            devices,
            request,
        )?);
        hw.inputs.push(input.clone());
        tracing::debug!(?devices, params = ?input.params(), "input stream opened");
        Ok(input)
    }

    /// Closes `stream`, putting it to standby first.
    pub fn close_input_stream(&self, stream: &Arc<InputStream>) -> Result<(), HalError> {
        let input = {
            let mut hw = self.shared.state.lock();
            let index = hw.inputs.iter().position(|input| Arc::ptr_eq(input, stream));
            index.map(|index| hw.inputs.remove(index))
        };

        let Some(input) = input else {
            tracing::warn!("Attempt to close invalid input stream");
            return Err(HalError::invalid_operation("not an open input stream"));
        };
        retire_input(&input);
        Ok(())
    }

    /// Changes the audio mode.
    ///
    /// Entering or leaving a call puts both active streams to standby and
    /// swaps ordinary routing for the voice routes.
    pub fn set_mode(&self, mode: AudioMode) -> Result<(), HalError> {
        let ctx = &self.shared.ctx;
        let mut hw = self.shared.state.lock();

        let mut out = acquire_with_handoff(&mut hw, HwState::active_output, |out: &Arc<OutputStream>| {
            out.lock_stream()
        });
        let mut input = acquire_with_handoff(&mut hw, HwState::active_input, |input: &Arc<InputStream>| {
            input.lock_stream()
        });

        for (stream, retries) in [
            (StreamKind::Output, out.as_ref().map_or(0, |h| h.retries)),
            (StreamKind::Input, input.as_ref().map_or(0, |h| h.retries)),
        ] {
            if retries > 0 {
                ctx.emit(HalEvent::HandoffRetried {
                    stream,
                    attempts: retries,
                });
            }
        }

        let previous = hw.mode;
        hw.mode = mode;
        if previous != mode {
            tracing::debug!(?previous, current = ?mode, "audio mode changed");
            ctx.emit(HalEvent::ModeChanged {
                previous,
                current: mode,
            });
        }

        let entering = mode == AudioMode::InCall;
        if entering != hw.in_call {
            if entering {
                if let Some(handoff) = &mut out {
                    handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
                }
                if let Some(handoff) = &mut input {
                    handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
                }

                let voice_volume = hw.voice_volume;
                hw.set_route_disable(RouteCategory::Input, true);
                hw.set_route_disable(RouteCategory::Output, true);
                if let Some(router) = &mut hw.router {
                    router.set_voice_volume(voice_volume);
                }
                hw.set_audio_route(RouteCategory::VoiceIn, EndpointMask::MIC_MAIN);
                hw.set_audio_route(RouteCategory::VoiceOut, EndpointMask::EARPIECE);
                hw.in_call = true;
            } else {
                hw.set_audio_route(RouteCategory::VoiceIn, EndpointMask::empty());
                hw.set_audio_route(RouteCategory::VoiceOut, EndpointMask::empty());
                hw.set_route_disable(RouteCategory::Output, false);
                hw.set_route_disable(RouteCategory::Input, false);
                if let Some(router) = &mut hw.router {
                    router.set_voice_volume(0.0);
                }

                if let Some(handoff) = &mut out {
                    handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
                }
                if let Some(handoff) = &mut input {
                    handoff.stream.do_standby_l(&mut handoff.guard, &mut hw);
                }
                hw.in_call = false;
            }
        }

        drop(input);
        drop(out);
        Ok(())
    }

    /// Returns the audio mode.
    pub fn mode(&self) -> AudioMode {
        self.shared.state.lock().mode
    }

    /// Returns true while call routing is in effect.
    pub fn in_call(&self) -> bool {
        self.shared.state.lock().in_call
    }

    /// Mutes or unmutes the microphones by disabling the capture routes.
    ///
    /// Muting also puts the active input stream to standby.
    pub fn set_mic_mute(&self, state: bool) -> Result<(), HalError> {
        let active = {
            let mut hw = self.shared.state.lock();
            tracing::debug!(state, previous = hw.mic_mute, "mic mute");
            hw.set_route_disable(RouteCategory::VoiceIn, state);
            hw.set_route_disable(RouteCategory::Input, state);
            hw.mic_mute = state;
            if state {
                hw.active_input()
            } else {
                None
            }
        };

        if let Some(input) = active {
            input.standby()?;
        }
        Ok(())
    }

    /// Returns the mic mute state.
    pub fn mic_mute(&self) -> bool {
        self.shared.state.lock().mic_mute
    }

    /// Stores the call volume. It is applied now if a call is active, and
    /// on the next call otherwise.
    pub fn set_voice_volume(&self, volume: f32) -> Result<(), HalError> {
        let mut hw = self.shared.state.lock();
        hw.voice_volume = volume;

        let in_call = hw.in_call;
        let Some(router) = &mut hw.router else {
            tracing::warn!(volume, "voice volume without a router");
            return Ok(());
        };
        if in_call {
            router.set_voice_volume(volume);
        }
        Ok(())
    }

    /// Sets the media volume. Without a router this only logs a warning.
    pub fn set_master_volume(&self, volume: f32) -> Result<(), HalError> {
        let mut hw = self.shared.state.lock();
        let Some(router) = &mut hw.router else {
            tracing::warn!(volume, "master volume without a router");
            return Ok(());
        };
        router.set_master_volume(volume);
        Ok(())
    }

    /// Accepts and ignores hardware-level parameters.
    pub fn set_parameters(&self, pairs: &str) -> Result<(), HalError> {
        tracing::trace!(pairs, "hardware parameters ignored");
        Ok(())
    }

    /// Hardware-level parameters are not reported; always empty.
    pub fn get_parameters(&self, keys: &str) -> String {
        tracing::trace!(keys, "hardware parameters requested");
        String::new()
    }

    /// Returns the capture buffer size for the given format, or 0 if the
    /// format is not supported.
    #[must_use]
    pub fn input_buffer_size(&self, sample_rate: u32, format: SampleFormat, channels: u16) -> usize {
        input_buffer_size(
            self.shared.ctx.config.input_period_size,
            sample_rate,
            format,
            channels,
        )
    }

    /// Routes the call to `device`. Does nothing outside a call.
    pub fn set_incall_path(&self, device: AudioDevices) -> Result<(), HalError> {
        self.shared.state.lock().set_incall_path(device);
        Ok(())
    }

    /// Returns the endpoints stored for `category`.
    pub fn route(&self, category: RouteCategory) -> EndpointMask {
        self.shared
            .state
            .lock()
            .router
            .as_ref()
            .map_or(EndpointMask::empty(), |router| router.route(category))
    }

    /// Returns true if `category` is currently disabled.
    pub fn is_route_disabled(&self, category: RouteCategory) -> bool {
        self.shared
            .state
            .lock()
            .router
            .as_ref()
            .is_some_and(|router| router.is_disabled(category))
    }

    /// Describes the hardware and stream state for diagnostics.
    ///
    /// Gives up on the hardware lock after the configured number of
    /// attempts and reports a possible deadlock instead of blocking.
    #[must_use]
    pub fn dump(&self) -> String {
        let config = &self.shared.ctx.config;
        let mut out = String::new();

        let mut state = None;
        for _ in 0..config.dump_lock_retries {
            if let Some(guard) = self.shared.state.try_lock() {
                state = Some(guard);
                break;
            }
            std::thread::sleep(config.dump_lock_interval);
        }

        let _ = writeln!(out, "Audio hardware:");
        let _ = writeln!(out, "\tInit {}", if self.shared.init_ok { "OK" } else { "Failed" });
        let _ = writeln!(out, "\tdriver op: {:?}", self.shared.router_trace.current());

        let Some(hw) = state else {
            let _ = writeln!(out, "\tAudioHardware maybe deadlocked");
            return out;
        };

        let _ = writeln!(out, "\tMic Mute {}", if hw.mic_mute { "ON" } else { "OFF" });
        let _ = writeln!(out, "\tIn Call Audio Mode {}", if hw.in_call { "ON" } else { "OFF" });

        match &hw.output {
            Some(output) => out.push_str(&output.dump()),
            None => {
                let _ = writeln!(out, "No output stream");
            }
        }

        let _ = writeln!(out, "{} inputs opened", hw.inputs.len());
        for (index, input) in hw.inputs.iter().enumerate() {
            let _ = writeln!(out, "- input {index}:");
            out.push_str(&input.dump());
        }
        out
    }
}

impl Drop for AudioHardware {
    fn drop(&mut self) {
        let (inputs, output) = {
            let mut hw = self.shared.state.lock();
            (std::mem::take(&mut hw.inputs), hw.output.take())
        };

        for input in &inputs {
            retire_input(input);
        }
        if let Some(output) = &output {
            retire_output(output);
        }
    }
}

fn retire_output(out: &OutputStream) {
    out.detach();
    if let Err(e) = out.standby() {
        tracing::warn!(error = %e, "output stream: standby on close failed");
    }
    tracing::debug!("output stream closed");
}

fn retire_input(input: &InputStream) {
    input.detach();
    if let Err(e) = input.standby() {
        tracing::warn!(error = %e, "input stream: standby on close failed");
    }
    tracing::debug!("input stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockPcmDriver, VirtualMixer};
    use crate::driver::PcmDirection;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn hardware(pcm: &MockPcmDriver) -> AudioHardware {
        AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(pcm.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_output_stream() {
        let pcm = MockPcmDriver::new();
        let hw = hardware(&pcm);

        let first = hw
            .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .unwrap();
        let second = hw.open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default());
        assert!(matches!(second, Err(HalError::InvalidOperation { .. })));

        hw.close_output_stream(&first).unwrap();
        assert!(matches!(
            hw.close_output_stream(&first),
            Err(HalError::InvalidOperation { .. })
        ));
        assert!(hw
            .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .is_ok());
    }

    #[test]
    fn test_closed_output_cannot_write() {
        let pcm = MockPcmDriver::new();
        let hw = hardware(&pcm);
        let out = hw
            .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .unwrap();
        out.write(&[0u8; 64]).unwrap();

        hw.close_output_stream(&out).unwrap();
        assert!(out.is_standby());
        assert_eq!(pcm.live_codec(PcmDirection::Output), 0);
        assert!(matches!(out.write(&[0u8; 4]), Err(HalError::NotInitialized)));
    }

    #[test]
    fn test_input_device_validation() {
        let pcm = MockPcmDriver::new();
        let hw = hardware(&pcm);

        let err = hw
            .open_input_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .unwrap_err();
        assert!(matches!(err, HalError::BadValue { .. }));

        let a = hw
            .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
            .unwrap();
        let b = hw
            .open_input_stream(AudioDevices::IN_WIRED_HEADSET, StreamRequest::default())
            .unwrap();
        hw.close_input_stream(&a).unwrap();
        assert!(hw.close_input_stream(&a).is_err());
        hw.close_input_stream(&b).unwrap();
    }

    #[test]
    fn test_mode_change_emits_event_once() {
        let changes = Arc::new(AtomicU32::new(0));
        let counter = changes.clone();
        let hw = AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(MockPcmDriver::new())
            .on_event(move |event| {
                if matches!(event, HalEvent::ModeChanged { .. }) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();

        hw.set_mode(AudioMode::Ringtone).unwrap();
        hw.set_mode(AudioMode::Ringtone).unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert!(!hw.in_call());
    }

    #[test]
    fn test_enter_and_leave_call() {
        let pcm = MockPcmDriver::new();
        let hw = hardware(&pcm);
        let out = hw
            .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .unwrap();
        out.write(&[0u8; 64]).unwrap();

        hw.set_mode(AudioMode::InCall).unwrap();
        assert!(hw.in_call());
        assert!(out.is_standby());
        assert!(hw.is_route_disabled(RouteCategory::Output));
        assert!(hw.is_route_disabled(RouteCategory::Input));
        assert_eq!(hw.route(RouteCategory::VoiceIn), EndpointMask::MIC_MAIN);
        assert_eq!(hw.route(RouteCategory::VoiceOut), EndpointMask::EARPIECE);

        hw.set_mode(AudioMode::Normal).unwrap();
        assert!(!hw.in_call());
        assert!(hw.route(RouteCategory::VoiceIn).is_empty());
        assert!(hw.route(RouteCategory::VoiceOut).is_empty());
        assert!(!hw.is_route_disabled(RouteCategory::Output));
    }

    #[test]
    fn test_incall_path_outside_call_is_noop() {
        let hw = hardware(&MockPcmDriver::new());
        hw.set_incall_path(AudioDevices::OUT_SPEAKER).unwrap();
        assert!(hw.route(RouteCategory::VoiceOut).is_empty());
    }

    #[test]
    fn test_volumes_without_a_router_are_noops() {
        let mixer = VirtualMixer::new();
        mixer.set_fail_open(true);
        let hw = AudioHardware::builder()
            .mixer(mixer.clone())
            .pcm(MockPcmDriver::new())
            .build()
            .unwrap();

        hw.set_master_volume(0.5).unwrap();
        hw.set_voice_volume(0.7).unwrap();
        assert!((hw.shared.state.lock().voice_volume - 0.7).abs() < f32::EPSILON);
        assert!(mixer.writes().is_empty());
        assert!(hw.route(RouteCategory::Output).is_empty());
    }

    #[test]
    fn test_hardware_parameters_are_inert() {
        let hw = hardware(&MockPcmDriver::new());
        hw.set_parameters("anything=1").unwrap();
        assert!(hw.get_parameters("anything").is_empty());
    }

    #[test]
    fn test_input_buffer_size() {
        let hw = hardware(&MockPcmDriver::new());
        assert_eq!(hw.input_buffer_size(16000, SampleFormat::Pcm16, 2), 2048);
        assert_eq!(hw.input_buffer_size(44100, SampleFormat::Pcm16, 2), 4096);
        assert_eq!(hw.input_buffer_size(8000, SampleFormat::Pcm16, 1), 512);
        assert_eq!(hw.input_buffer_size(12000, SampleFormat::Pcm16, 2), 0);
        assert_eq!(hw.input_buffer_size(16000, SampleFormat::Pcm8, 2), 0);
    }

    #[test]
    fn test_dump_reports_deadlock() {
        let hw = AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(MockPcmDriver::new())
            .with_config(HalConfig {
                dump_lock_retries: 3,
                dump_lock_interval: std::time::Duration::from_millis(1),
                ..Default::default()
            })
            .build()
            .unwrap();

        let dump = hw.dump();
        assert!(dump.contains("Init OK"));
        assert!(dump.contains("0 inputs opened"));

        let _held = hw.shared.state.lock();
        let dump = hw.dump();
        assert!(dump.contains("maybe deadlocked"));
    }

    #[test]
    fn test_drop_closes_streams() {
        let pcm = MockPcmDriver::new();
        let hw = hardware(&pcm);
        let out = hw
            .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
            .unwrap();
        let input = hw
            .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
            .unwrap();
        out.write(&[0u8; 64]).unwrap();
        input.read(&mut [0u8; 64]).unwrap();

        drop(hw);
        assert!(out.is_standby());
        assert!(input.is_standby());
        assert_eq!(pcm.live_codec(PcmDirection::Output), 0);
        assert_eq!(pcm.live_codec(PcmDirection::Input), 0);
    }
}
