//! Integration tests for asoc-audio-hal.
//!
//! Everything runs against the in-memory drivers in `driver::mock`.
//! Tests that require actual audio hardware are marked with `#[ignore]`
//! and should be run manually.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use asoc_audio_hal::driver::mock::{sine, MockPcmDriver, RecordingWakeLock, VirtualMixer, WakeEvent};
use asoc_audio_hal::driver::{PcmDirection, PcmPath};
use asoc_audio_hal::routing::{EndpointMask, RouteCategory};
use asoc_audio_hal::{
    AudioDevices, AudioHardware, AudioMode, HalError, HalEvent, StreamKind, StreamRequest,
    INPUT_WAKE_LOCK, OUTPUT_WAKE_LOCK,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Rig {
    hw: AudioHardware,
    mixer: VirtualMixer,
    pcm: MockPcmDriver,
    wake: RecordingWakeLock,
    events: Arc<Mutex<Vec<HalEvent>>>,
}

fn rig() -> Rig {
    init_tracing();
    let mixer = VirtualMixer::new();
    let pcm = MockPcmDriver::new();
    let wake = RecordingWakeLock::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    let log = events.clone();
    let hw = AudioHardware::builder()
        .mixer(mixer.clone())
        .pcm(pcm.clone())
        .wake_lock(wake.clone())
        .on_event(move |event| log.lock().push(event))
        .build()
        .unwrap();

    Rig {
        hw,
        mixer,
        pcm,
        wake,
        events,
    }
}

#[test]
fn test_output_open_close_reopen() {
    let rig = rig();

    let first = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let second = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default());
    assert!(matches!(second, Err(HalError::InvalidOperation { .. })));

    rig.hw.close_output_stream(&first).unwrap();
    let reopened = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    assert_eq!(reopened.write(&[0u8; 4096]).unwrap(), 4096);
}

#[test]
fn test_incall_speaker_routing() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_EARPIECE, StreamRequest::default())
        .unwrap();
    out.write(&[0u8; 256]).unwrap();

    rig.hw.set_mode(AudioMode::InCall).unwrap();
    assert!(out.is_standby());

    // the routing parameter re-routes the call while in call mode
    out.set_parameters("routing=2").unwrap();
    assert_eq!(
        rig.hw.route(RouteCategory::VoiceOut),
        EndpointMask::AMP | EndpointMask::SPEAKER
    );
    assert_eq!(rig.hw.route(RouteCategory::VoiceIn), EndpointMask::MIC_SUB);

    // playback during the call leaves the output route to the call
    out.write(&[0u8; 256]).unwrap();
    assert!(rig.hw.is_route_disabled(RouteCategory::Output));

    rig.hw.set_mode(AudioMode::Normal).unwrap();
    assert!(rig.hw.route(RouteCategory::VoiceOut).is_empty());
    assert!(rig.hw.route(RouteCategory::VoiceIn).is_empty());
    assert!(!rig.hw.is_route_disabled(RouteCategory::Output));
    assert!(!rig.hw.is_route_disabled(RouteCategory::Input));
    assert!(out.is_standby());

    out.write(&[0u8; 256]).unwrap();
    assert_eq!(
        rig.hw.route(RouteCategory::Output),
        EndpointMask::AMP | EndpointMask::SPEAKER
    );

    let events = rig.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        HalEvent::ModeChanged {
            previous: AudioMode::Normal,
            current: AudioMode::InCall
        }
    )));
}

#[test]
fn test_bluetooth_call_opens_sco_once_per_direction() {
    let rig = rig();
    rig.hw.set_mode(AudioMode::InCall).unwrap();
    assert_eq!(rig.pcm.live(PcmPath::Bluetooth), 0);

    rig.hw
        .set_incall_path(AudioDevices::OUT_BLUETOOTH_SCO_HEADSET)
        .unwrap();
    assert_eq!(rig.hw.route(RouteCategory::VoiceOut), EndpointMask::BLUETOOTH);
    assert_eq!(
        rig.hw.route(RouteCategory::VoiceIn),
        EndpointMask::MIC_BLUETOOTH
    );
    assert_eq!(rig.pcm.live(PcmPath::Bluetooth), 2);

    // moving between SCO devices keeps the link up
    rig.hw
        .set_incall_path(AudioDevices::OUT_BLUETOOTH_SCO_CARKIT)
        .unwrap();
    assert_eq!(rig.pcm.live(PcmPath::Bluetooth), 2);

    rig.hw.set_mode(AudioMode::Normal).unwrap();
    assert_eq!(rig.pcm.live(PcmPath::Bluetooth), 0);
}

#[test]
fn test_wake_locks_follow_activity() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
        .unwrap();

    out.write(&[0u8; 64]).unwrap();
    input.read(&mut [0u8; 64]).unwrap();
    assert!(rig.wake.held(OUTPUT_WAKE_LOCK));
    assert!(rig.wake.held(INPUT_WAKE_LOCK));

    // staying active does not take the lock again
    out.write(&[0u8; 64]).unwrap();
    let acquires = rig
        .wake
        .events()
        .iter()
        .filter(|e| matches!(e, WakeEvent::Acquire(tag) if tag == OUTPUT_WAKE_LOCK))
        .count();
    assert_eq!(acquires, 1);

    out.standby().unwrap();
    input.standby().unwrap();
    assert!(!rig.wake.held(OUTPUT_WAKE_LOCK));
    assert!(!rig.wake.held(INPUT_WAKE_LOCK));
}

#[test]
fn test_output_wake_pauses_active_input() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
        .unwrap();

    input.read(&mut [0u8; 64]).unwrap();
    out.write(&[0u8; 64]).unwrap();

    let directions: Vec<_> = rig
        .pcm
        .opens()
        .iter()
        .filter(|c| c.path == PcmPath::Codec)
        .map(|c| c.direction)
        .collect();
    assert_eq!(
        directions,
        [PcmDirection::Input, PcmDirection::Output, PcmDirection::Input]
    );
    assert!(!input.is_standby());
    assert_eq!(rig.pcm.live_codec(PcmDirection::Input), 1);
    assert_eq!(rig.pcm.live_codec(PcmDirection::Output), 1);
}

#[test]
fn test_input_wake_pauses_active_output() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
        .unwrap();

    out.write(&[0u8; 64]).unwrap();
    input.read(&mut [0u8; 64]).unwrap();

    let directions: Vec<_> = rig
        .pcm
        .opens()
        .iter()
        .filter(|c| c.path == PcmPath::Codec)
        .map(|c| c.direction)
        .collect();
    assert_eq!(
        directions,
        [PcmDirection::Output, PcmDirection::Output, PcmDirection::Input]
    );
    assert!(!out.is_standby());
    assert_eq!(
        rig.hw.route(RouteCategory::Output),
        EndpointMask::AMP | EndpointMask::SPEAKER
    );
}

#[test]
fn test_concurrent_playback_capture_and_control() {
    let rig = rig();
    rig.pcm.set_io_delay(Duration::from_millis(1));

    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::pcm16(16000, 1))
        .unwrap();
    let hw = Arc::new(rig.hw);

    let writes = Arc::new(AtomicUsize::new(0));
    let reads = Arc::new(AtomicUsize::new(0));

    let playback = {
        let out = out.clone();
        let writes = writes.clone();
        thread::spawn(move || {
            for _ in 0..40 {
                out.write(&[0u8; 512]).unwrap();
                writes.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let capture = {
        let input = input.clone();
        let reads = reads.clone();
        thread::spawn(move || {
            let mut buffer = [0u8; 256];
            for _ in 0..40 {
                input.read(&mut buffer).unwrap();
                reads.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let control = {
        let hw = hw.clone();
        thread::spawn(move || {
            for i in 0..10 {
                let mode = if i % 2 == 0 {
                    AudioMode::InCall
                } else {
                    AudioMode::Normal
                };
                hw.set_mode(mode).unwrap();
                hw.set_mic_mute(i % 3 == 0).unwrap();
                hw.set_master_volume(0.1 * i as f32).unwrap();
                thread::sleep(Duration::from_millis(2));
            }
            hw.set_mic_mute(false).unwrap();
        })
    };

    playback.join().unwrap();
    capture.join().unwrap();
    control.join().unwrap();

    assert_eq!(writes.load(Ordering::SeqCst), 40);
    assert_eq!(reads.load(Ordering::SeqCst), 40);
    assert_eq!(hw.mode(), AudioMode::Normal);
    assert!(!hw.in_call());
}

#[test]
fn test_mic_mute_puts_input_to_standby() {
    let rig = rig();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::default())
        .unwrap();
    input.read(&mut [0u8; 64]).unwrap();

    rig.hw.set_mic_mute(true).unwrap();
    assert!(rig.hw.mic_mute());
    assert!(input.is_standby());
    assert!(rig.hw.is_route_disabled(RouteCategory::Input));
    assert!(rig.hw.is_route_disabled(RouteCategory::VoiceIn));

    rig.hw.set_mic_mute(false).unwrap();
    assert!(!rig.hw.mic_mute());
    assert!(!rig.hw.is_route_disabled(RouteCategory::Input));
    assert!(!rig.hw.is_route_disabled(RouteCategory::VoiceIn));
}

#[test]
fn test_stream_parameters() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();

    assert_eq!(out.get_parameters("routing"), "routing=2");
    assert!(matches!(
        out.set_parameters("routing=4;foo=1"),
        Err(HalError::BadValue { .. })
    ));
    assert_eq!(out.get_parameters("routing"), "routing=4");

    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_WIRED_HEADSET, StreamRequest::default())
        .unwrap();
    assert_eq!(input.get_parameters("routing"), "routing=1048576");
}

#[test]
fn test_write_failure_keeps_real_time_pacing() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    out.write(&[0u8; 64]).unwrap();

    rig.pcm.set_fail_io(true);
    let started = Instant::now();
    let err = out.write(&[0u8; 4096]).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, HalError::Pcm(_)));
    // 1024 frames at 44.1kHz
    assert!(elapsed >= Duration::from_millis(20), "returned after {elapsed:?}");
    assert!(out.is_standby());
    assert!(!rig.wake.held(OUTPUT_WAKE_LOCK));

    let events = rig.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        HalEvent::IoError {
            stream: StreamKind::Output,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        HalEvent::StandbyEntered {
            stream: StreamKind::Output
        }
    )));
}

#[test]
fn test_capture_at_16k_mono() {
    let rig = rig();
    let input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::pcm16(16000, 1))
        .unwrap();
    assert_eq!(input.buffer_size(), 1024);

    rig.pcm.queue_capture(&sine(1000.0, 44100, 2, 8192));
    let mut buffer = vec![0u8; input.buffer_size()];
    assert_eq!(input.read(&mut buffer).unwrap(), 1024);

    let loud = buffer
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .filter(|s| s.unsigned_abs() > 10_000)
        .count();
    assert!(loud > 100, "only {loud} loud samples");
}

#[test]
fn test_mixer_failure_leaves_hardware_usable() {
    init_tracing();
    let mixer = VirtualMixer::new();
    mixer.set_fail_open(true);
    let hw = AudioHardware::builder()
        .mixer(mixer)
        .pcm(MockPcmDriver::new())
        .build()
        .unwrap();

    assert!(matches!(hw.init_check(), Err(HalError::NotInitialized)));
    let out = hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    assert!(out.write(&[0u8; 64]).is_ok());
    assert!(hw.dump().contains("Init Failed"));
}

#[test]
fn test_volume_writes_reach_the_mixer() {
    let rig = rig();
    let out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    out.write(&[0u8; 64]).unwrap();

    rig.mixer.take_writes();
    rig.hw.set_master_volume(0.5).unwrap();
    assert!(!rig.mixer.writes().is_empty());

    // voice volume outside a call is only stored
    rig.mixer.take_writes();
    rig.hw.set_voice_volume(0.7).unwrap();
    assert!(rig.mixer.writes().is_empty());
}

#[test]
fn test_dump() {
    let rig = rig();
    let _out = rig
        .hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();
    let _input = rig
        .hw
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, StreamRequest::pcm16(8000, 1))
        .unwrap();

    let dump = rig.hw.dump();
    assert!(dump.contains("Init OK"));
    assert!(dump.contains("Mic Mute OFF"));
    assert!(dump.contains("In Call Audio Mode OFF"));
    assert!(dump.contains("Output stream:"));
    assert!(dump.contains("1 inputs opened"));
    assert!(dump.contains("sample rate: 8000"));
}

#[cfg(feature = "cpal-backend")]
#[test]
#[ignore = "requires audio hardware"]
fn test_real_playback() {
    use asoc_audio_hal::driver::CpalPcmDriver;

    init_tracing();
    let hw = AudioHardware::builder()
        .mixer(VirtualMixer::new())
        .pcm(CpalPcmDriver::new())
        .build()
        .unwrap();
    let out = hw
        .open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())
        .unwrap();

    let tone = sine(440.0, 44100, 2, 44100);
    let mut bytes = vec![0u8; tone.len() * 2];
    for (chunk, sample) in bytes.chunks_exact_mut(2).zip(&tone) {
        chunk.copy_from_slice(&sample.to_le_bytes());
    }
    for period in bytes.chunks(out.buffer_size()) {
        out.write(period).unwrap();
    }
}
