//! Reference-counted Bluetooth SCO PCM links.
//!
//! The SCO interface must be running while any route uses a Bluetooth
//! endpoint. Input and voice-in share the uplink PCM, output and voice-out
//! share the downlink PCM; each is opened on the first reference and closed
//! on the last.

use std::sync::Arc;

use crate::driver::{Pcm, PcmConfig, PcmDirection, PcmDriver};

/// Which SCO PCM an endpoint needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoPath {
    /// Uplink, opened as a capture PCM.
    Input,
    /// Downlink, opened as a playback PCM.
    Output,
}

impl ScoPath {
    fn direction(self) -> PcmDirection {
        match self {
            Self::Input => PcmDirection::Input,
            Self::Output => PcmDirection::Output,
        }
    }
}

#[derive(Default)]
struct ScoChannel {
    refs: u32,
    pcm: Option<Box<dyn Pcm>>,
}

/// Owner of both SCO PCMs.
pub struct ScoLink {
    driver: Arc<dyn PcmDriver>,
    input: ScoChannel,
    output: ScoChannel,
}

impl std::fmt::Debug for ScoLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoLink")
            .field("input_refs", &self.input.refs)
            .field("input_open", &self.input.pcm.is_some())
            .field("output_refs", &self.output.refs)
            .field("output_open", &self.output.pcm.is_some())
            .finish()
    }
}

impl ScoLink {
    /// Creates a link with both PCMs closed.
    pub fn new(driver: Arc<dyn PcmDriver>) -> Self {
        Self {
            driver,
            input: ScoChannel::default(),
            output: ScoChannel::default(),
        }
    }

    fn channel(&mut self, path: ScoPath) -> &mut ScoChannel {
        match path {
            ScoPath::Input => &mut self.input,
            ScoPath::Output => &mut self.output,
        }
    }

    /// Adds a reference, opening and starting the PCM on the first one.
    ///
    /// A PCM that fails to open is logged; the reference is still counted
    /// so the matching release stays balanced.
    pub fn acquire(&mut self, path: ScoPath) {
        let driver = Arc::clone(&self.driver);
        let channel = self.channel(path);
        channel.refs += 1;
        if channel.refs > 1 {
            return;
        }

        tracing::debug!(?path, "opening bluetooth sco pcm");
        match driver.open(&PcmConfig::bluetooth(path.direction())) {
            Ok(mut pcm) => {
                if pcm.is_ready() {
                    if let Err(e) = pcm.start() {
                        tracing::error!(?path, error = %e, "failed to start bluetooth sco pcm");
                    }
                } else {
                    tracing::error!(?path, "bluetooth sco pcm not ready");
                }
                channel.pcm = Some(pcm);
            }
            Err(e) => {
                tracing::error!(?path, error = %e, "failed to open bluetooth sco pcm");
            }
        }
    }

    /// Drops a reference, closing the PCM on the last one.
    pub fn release(&mut self, path: ScoPath) {
        let channel = self.channel(path);
        if channel.refs == 0 {
            tracing::warn!(?path, "bluetooth sco released more often than acquired");
            return;
        }
        channel.refs -= 1;
        if channel.refs == 0 {
            tracing::debug!(?path, "closing bluetooth sco pcm");
            channel.pcm = None;
        }
    }

    /// Returns the number of endpoints holding `path`.
    #[must_use]
    pub fn refs(&self, path: ScoPath) -> u32 {
        match path {
            ScoPath::Input => self.input.refs,
            ScoPath::Output => self.output.refs,
        }
    }

    /// Returns true if the PCM for `path` is open.
    #[must_use]
    pub fn is_open(&self, path: ScoPath) -> bool {
        match path {
            ScoPath::Input => self.input.pcm.is_some(),
            ScoPath::Output => self.output.pcm.is_some(),
        }
    }
}
