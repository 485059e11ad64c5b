//! Sample conversion and the capture transform chain.
//!
//! - Sample encoding conversion (f32 ↔ i16, PCM16 bytes ↔ samples)
//! - Stereo to mono downmix ([`ChannelMixer`])
//! - 44.1kHz to 22050/16000/11025/8000 Hz downsampling ([`DownSampler`])
//! - The pull contract every stage implements ([`BufferProvider`], [`Stage`])

mod chain;
mod channel_mixer;
pub mod convert;
mod downsampler;
mod provider;

pub use chain::CaptureChain;
pub use channel_mixer::ChannelMixer;
pub use downsampler::{DownSampler, DOWNSAMPLER_RATES};
pub use provider::{Attached, BufferProvider, Stage};
