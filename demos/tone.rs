//! Tone playback demo.
//!
//! Plays a two second 440 Hz tone through the default output device, then
//! switches to call mode and back while printing the hardware dump.
//!
//! Run with: cargo run --example tone

use asoc_audio_hal::driver::mock::{sine, VirtualMixer};
use asoc_audio_hal::driver::CpalPcmDriver;
use asoc_audio_hal::format::convert::samples_to_bytes;
use asoc_audio_hal::{AudioDevices, AudioHardware, AudioMode, StreamRequest, HW_SAMPLE_RATE};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=asoc_audio_hal=debug shows routing decisions
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // The virtual mixer stands in for codec controls the host doesn't have
    let hw = AudioHardware::builder()
        .mixer(VirtualMixer::new())
        .pcm(CpalPcmDriver::new())
        .on_event(|event| println!("event: {event:?}"))
        .build()?;
    hw.init_check()?;

    let out = hw.open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())?;
    println!("latency: {:?}", out.latency());

    let tone = sine(440.0, HW_SAMPLE_RATE, 2, 2 * HW_SAMPLE_RATE as usize);
    let mut bytes = vec![0u8; tone.len() * 2];
    samples_to_bytes(&tone, &mut bytes);

    for period in bytes.chunks(out.buffer_size()) {
        out.write(period)?;
    }
    out.standby()?;

    hw.set_mode(AudioMode::InCall)?;
    hw.set_incall_path(AudioDevices::OUT_SPEAKER)?;
    println!("{}", hw.dump());

    hw.set_mode(AudioMode::Normal)?;
    hw.close_output_stream(&out)?;
    println!("{}", hw.dump());

    Ok(())
}
