//! In-memory drivers for testing without hardware.
//!
//! All mocks are cheap to clone; clones share state, so a test can hand one
//! copy to the builder and keep another to inspect what the HAL did.
//!
//! # Example
//!
//! ```
//! use asoc_audio_hal::driver::mock::{MockPcmDriver, VirtualMixer};
//! use asoc_audio_hal::AudioHardware;
//!
//! let mixer = VirtualMixer::new();
//! let pcm = MockPcmDriver::new();
//! let hw = AudioHardware::builder()
//!     .mixer(mixer.clone())
//!     .pcm(pcm.clone())
//!     .build()
//!     .unwrap();
//!
//! assert!(hw.init_check().is_ok());
//! // The router applied its initial pins on open.
//! assert!(!mixer.writes().is_empty());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use super::{ControlId, Mixer, MixerDriver, Pcm, PcmConfig, PcmDirection, PcmDriver, PcmPath, WakeLock};
use crate::format::convert::samples_to_bytes;
use crate::{MixerError, PcmError};

/// Samples of synthetic capture data a [`MockPcmDriver`] can hold.
const CAPTURE_CAPACITY: usize = 1 << 18;

/// One write observed by a [`VirtualMixer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerWrite {
    /// An integer value was written.
    Value {
        /// Control name.
        control: String,
        /// Raw value.
        value: i32,
    },
    /// A mux option was selected.
    Select {
        /// Control name.
        control: String,
        /// Option name.
        option: String,
    },
}

impl MixerWrite {
    /// Shorthand for [`MixerWrite::Value`].
    pub fn value(control: &str, value: i32) -> Self {
        Self::Value {
            control: control.to_owned(),
            value,
        }
    }

    /// Shorthand for [`MixerWrite::Select`].
    pub fn select(control: &str, option: &str) -> Self {
        Self::Select {
            control: control.to_owned(),
            option: option.to_owned(),
        }
    }

    /// Returns the control this write targets.
    pub fn control(&self) -> &str {
        match self {
            Self::Value { control, .. } | Self::Select { control, .. } => control,
        }
    }
}

#[derive(Default)]
struct MixerState {
    names: Vec<String>,
    missing: HashSet<String>,
    rejected: HashSet<String>,
    fail_open: bool,
    writes: Vec<MixerWrite>,
    values: HashMap<String, i32>,
    selections: HashMap<String, String>,
}

impl MixerState {
    fn name(&self, id: ControlId) -> Result<String, MixerError> {
        self.names
            .get(id.0)
            .cloned()
            .ok_or_else(|| MixerError::rejected(format!("#{}", id.0), "unknown control id"))
    }
}

/// An in-memory mixer that accepts every control name and logs each write.
///
/// Controls can be hidden with [`VirtualMixer::with_missing`] to exercise
/// hardware variants that lack them.
#[derive(Clone, Default)]
pub struct VirtualMixer {
    state: Arc<Mutex<MixerState>>,
}

impl VirtualMixer {
    /// Creates a mixer exposing every control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides the named controls from lookups.
    #[must_use]
    pub fn with_missing(self, names: &[&str]) -> Self {
        self.state
            .lock()
            .missing
            .extend(names.iter().map(|n| (*n).to_owned()));
        self
    }

    /// Makes writes to the named controls fail.
    #[must_use]
    pub fn with_rejected(self, names: &[&str]) -> Self {
        self.state
            .lock()
            .rejected
            .extend(names.iter().map(|n| (*n).to_owned()));
        self
    }

    /// Makes [`MixerDriver::open`] fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Returns every write so far, oldest first.
    pub fn writes(&self) -> Vec<MixerWrite> {
        self.state.lock().writes.clone()
    }

    /// Returns and clears the write log.
    pub fn take_writes(&self) -> Vec<MixerWrite> {
        std::mem::take(&mut self.state.lock().writes)
    }

    /// Returns the last value written to `control`.
    pub fn value(&self, control: &str) -> Option<i32> {
        self.state.lock().values.get(control).copied()
    }

    /// Returns the last option selected on `control`.
    pub fn selection(&self, control: &str) -> Option<String> {
        self.state.lock().selections.get(control).cloned()
    }
}

impl MixerDriver for VirtualMixer {
    fn open(&self) -> Result<Box<dyn Mixer>, MixerError> {
        if self.state.lock().fail_open {
            return Err(MixerError::open_failed("injected failure"));
        }
        Ok(Box::new(self.clone()))
    }
}

impl Mixer for VirtualMixer {
    fn control(&mut self, name: &str) -> Option<ControlId> {
        let mut state = self.state.lock();
        if state.missing.contains(name) {
            return None;
        }
        let index = match state.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                state.names.push(name.to_owned());
                state.names.len() - 1
            }
        };
        Some(ControlId(index))
    }

    fn select(&mut self, control: ControlId, option: &str) -> Result<(), MixerError> {
        let mut state = self.state.lock();
        let name = state.name(control)?;
        if state.rejected.contains(&name) {
            return Err(MixerError::rejected(name, "injected failure"));
        }
        state.writes.push(MixerWrite::select(&name, option));
        state.selections.insert(name, option.to_owned());
        Ok(())
    }

    fn set_value(&mut self, control: ControlId, value: i32) -> Result<(), MixerError> {
        let mut state = self.state.lock();
        let name = state.name(control)?;
        if state.rejected.contains(&name) {
            return Err(MixerError::rejected(name, "injected failure"));
        }
        state.writes.push(MixerWrite::value(&name, value));
        state.values.insert(name, value);
        Ok(())
    }
}

struct PcmState {
    fail_open: bool,
    not_ready: bool,
    fail_io: bool,
    io_delay: Duration,
    opens: Vec<PcmConfig>,
    live: HashMap<(PcmPath, PcmDirection), usize>,
    written: usize,
    capture: HeapRb<i16>,
}

impl Default for PcmState {
    fn default() -> Self {
        Self {
            fail_open: false,
            not_ready: false,
            fail_io: false,
            io_delay: Duration::ZERO,
            opens: Vec::new(),
            live: HashMap::new(),
            written: 0,
            capture: HeapRb::new(CAPTURE_CAPACITY),
        }
    }
}

/// An in-memory PCM driver with failure injection.
///
/// Playback data is counted and discarded. Capture returns samples queued
/// with [`MockPcmDriver::queue_capture`], then silence.
#[derive(Clone, Default)]
pub struct MockPcmDriver {
    state: Arc<Mutex<PcmState>>,
}

impl MockPcmDriver {
    /// Creates a driver whose PCMs open and transfer successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Makes subsequently opened PCMs report not ready.
    pub fn set_not_ready(&self, not_ready: bool) {
        self.state.lock().not_ready = not_ready;
    }

    /// Makes reads and writes on open PCMs fail.
    pub fn set_fail_io(&self, fail: bool) {
        self.state.lock().fail_io = fail;
    }

    /// Adds a delay to every read and write, to simulate a blocking device.
    pub fn set_io_delay(&self, delay: Duration) {
        self.state.lock().io_delay = delay;
    }

    /// Returns the configuration of every successful open, oldest first.
    pub fn opens(&self) -> Vec<PcmConfig> {
        self.state.lock().opens.clone()
    }

    /// Returns how many PCMs were opened on `path`.
    pub fn open_count(&self, path: PcmPath) -> usize {
        self.state
            .lock()
            .opens
            .iter()
            .filter(|c| c.path == path)
            .count()
    }

    /// Returns how many PCMs on `path` are currently open.
    pub fn live(&self, path: PcmPath) -> usize {
        self.state
            .lock()
            .live
            .iter()
            .filter(|((p, _), _)| *p == path)
            .map(|(_, n)| n)
            .sum()
    }

    /// Returns how many codec PCMs with `direction` are currently open.
    pub fn live_codec(&self, direction: PcmDirection) -> usize {
        self.state
            .lock()
            .live
            .get(&(PcmPath::Codec, direction))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the total number of bytes written to playback PCMs.
    pub fn bytes_written(&self) -> usize {
        self.state.lock().written
    }

    /// Queues interleaved samples for capture PCMs to return.
    ///
    /// Returns how many samples fit.
    pub fn queue_capture(&self, samples: &[i16]) -> usize {
        self.state.lock().capture.push_slice(samples)
    }

    /// Returns how many queued capture samples have not been read yet.
    pub fn pending_capture(&self) -> usize {
        self.state.lock().capture.occupied_len()
    }
}

impl PcmDriver for MockPcmDriver {
    fn open(&self, config: &PcmConfig) -> Result<Box<dyn Pcm>, PcmError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(PcmError::open_failed("injected failure"));
        }
        state.opens.push(*config);
        *state.live.entry((config.path, config.direction)).or_insert(0) += 1;
        tracing::trace!(?config, "mock pcm opened");

        Ok(Box::new(MockPcm {
            state: Arc::clone(&self.state),
            config: *config,
            ready: !state.not_ready,
        }))
    }
}

struct MockPcm {
    state: Arc<Mutex<PcmState>>,
    config: PcmConfig,
    ready: bool,
}

impl MockPcm {
    fn begin_io(&self) -> Result<(), PcmError> {
        let delay = self.state.lock().io_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.state.lock().fail_io {
            return Err(PcmError::transfer("injected failure"));
        }
        if !self.ready {
            return Err(PcmError::NotReady);
        }
        Ok(())
    }
}

impl Pcm for MockPcm {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PcmError> {
        self.begin_io()?;
        self.state.lock().written += data.len();
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
        self.begin_io()?;
        let mut samples = vec![0i16; data.len() / 2];
        self.state.lock().capture.pop_slice(&mut samples);
        samples_to_bytes(&samples, data);
        Ok(())
    }
}

impl Drop for MockPcm {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(live) = state.live.get_mut(&(self.config.path, self.config.direction)) {
            *live = live.saturating_sub(1);
        }
    }
}

/// One wake-lock call observed by a [`RecordingWakeLock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeEvent {
    /// `acquire(tag)`
    Acquire(String),
    /// `release(tag)`
    Release(String),
}

/// A [`WakeLock`] that records every call.
#[derive(Clone, Default)]
pub struct RecordingWakeLock {
    events: Arc<Mutex<Vec<WakeEvent>>>,
}

impl RecordingWakeLock {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every call so far, oldest first.
    pub fn events(&self) -> Vec<WakeEvent> {
        self.events.lock().clone()
    }

    /// Returns true if `tag` was acquired more often than released.
    pub fn held(&self, tag: &str) -> bool {
        let balance = self.events.lock().iter().fold(0i32, |n, e| match e {
            WakeEvent::Acquire(t) if t == tag => n + 1,
            WakeEvent::Release(t) if t == tag => n - 1,
            _ => n,
        });
        balance > 0
    }
}

impl WakeLock for RecordingWakeLock {
    fn acquire(&self, tag: &str) {
        self.events.lock().push(WakeEvent::Acquire(tag.to_owned()));
    }

    fn release(&self, tag: &str) {
        self.events.lock().push(WakeEvent::Release(tag.to_owned()));
    }
}

/// Generates `frames` frames of a full-scale sine wave, the same sample on
/// every channel.
pub fn sine(frequency: f64, sample_rate: u32, channels: u16, frames: usize) -> Vec<i16> {
    let rate = f64::from(sample_rate);
    let mut samples = Vec::with_capacity(frames * usize::from(channels));

    for i in 0..frames {
        let t = i as f64 / rate;
        let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
        let sample = (value * 32767.0) as i16;
        for _ in 0..channels {
            samples.push(sample);
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec_config(direction: PcmDirection) -> PcmConfig {
        PcmConfig {
            direction,
            path: PcmPath::Codec,
            period_size: 1024,
            period_count: 4,
            channels: 2,
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_virtual_mixer_logs_writes() {
        let mixer = VirtualMixer::new();
        let mut handle = mixer.open().unwrap();

        let id = handle.control("Speaker Switch").unwrap();
        handle.set_value(id, 1).unwrap();
        let mux = handle.control("RIN MUX").unwrap();
        handle.select(mux, "RIN2").unwrap();

        assert_eq!(
            mixer.writes(),
            vec![
                MixerWrite::value("Speaker Switch", 1),
                MixerWrite::select("RIN MUX", "RIN2"),
            ]
        );
        assert_eq!(mixer.value("Speaker Switch"), Some(1));
        assert_eq!(mixer.selection("RIN MUX").as_deref(), Some("RIN2"));
    }

    #[test]
    fn test_virtual_mixer_lookup_is_stable() {
        let mut mixer = VirtualMixer::new();
        let a = mixer.control("A").unwrap();
        let b = mixer.control("B").unwrap();
        assert_ne!(a, b);
        assert_eq!(mixer.control("A"), Some(a));
    }

    #[test]
    fn test_virtual_mixer_missing_and_rejected() {
        let mut mixer = VirtualMixer::new()
            .with_missing(&["Gone"])
            .with_rejected(&["Stuck"]);
        assert!(mixer.control("Gone").is_none());

        let id = mixer.control("Stuck").unwrap();
        assert!(mixer.set_value(id, 1).is_err());
        assert!(mixer.writes().is_empty());
    }

    #[test]
    fn test_virtual_mixer_fail_open() {
        let mixer = VirtualMixer::new();
        mixer.set_fail_open(true);
        assert!(matches!(mixer.open(), Err(MixerError::OpenFailed { .. })));
    }

    #[test]
    fn test_mock_pcm_counts_live_handles() {
        let driver = MockPcmDriver::new();
        let pcm = driver.open(&codec_config(PcmDirection::Output)).unwrap();
        assert_eq!(driver.live(PcmPath::Codec), 1);
        assert_eq!(driver.open_count(PcmPath::Codec), 1);

        drop(pcm);
        assert_eq!(driver.live(PcmPath::Codec), 0);
        assert_eq!(driver.open_count(PcmPath::Codec), 1);
    }

    #[test]
    fn test_mock_pcm_write_and_capture() {
        let driver = MockPcmDriver::new();
        let mut out = driver.open(&codec_config(PcmDirection::Output)).unwrap();
        out.write(&[0u8; 64]).unwrap();
        assert_eq!(driver.bytes_written(), 64);

        driver.queue_capture(&[1, -1]);
        let mut input = driver.open(&codec_config(PcmDirection::Input)).unwrap();
        let mut data = [0xaau8; 8];
        input.read(&mut data).unwrap();
        assert_eq!(data, [1, 0, 0xff, 0xff, 0, 0, 0, 0]);
        assert_eq!(driver.pending_capture(), 0);
    }

    #[test]
    fn test_mock_pcm_failure_injection() {
        let driver = MockPcmDriver::new();
        driver.set_fail_open(true);
        assert!(driver.open(&codec_config(PcmDirection::Output)).is_err());
        driver.set_fail_open(false);

        let mut pcm = driver.open(&codec_config(PcmDirection::Output)).unwrap();
        driver.set_fail_io(true);
        assert!(matches!(pcm.write(&[0; 4]), Err(PcmError::Transfer { .. })));

        driver.set_fail_io(false);
        driver.set_not_ready(true);
        let pcm = driver.open(&codec_config(PcmDirection::Output)).unwrap();
        assert!(!pcm.is_ready());
    }

    #[test]
    fn test_recording_wake_lock() {
        let lock = RecordingWakeLock::new();
        lock.acquire("AudioOutLock");
        assert!(lock.held("AudioOutLock"));
        lock.release("AudioOutLock");
        assert!(!lock.held("AudioOutLock"));
        assert_eq!(lock.events().len(), 2);
    }

    #[test]
    fn test_sine_fills_all_channels() {
        let samples = sine(440.0, 44100, 2, 100);
        assert_eq!(samples.len(), 200);
        assert_eq!(samples[0], 0);
        for frame in samples.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(samples.iter().any(|&s| s > 10000));
    }
}
