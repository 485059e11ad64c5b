//! Applies route masks and volumes to the mixer.

use std::sync::Arc;

use super::endpoint::{EndpointMask, RouteCategory};
use super::pin::{PinConfig, PinWrite};
use super::sco::ScoLink;
use super::tables::{RouteEntry, RouteTables, VolumeControl};
use crate::driver::{Mixer, MixerDriver, PcmDriver};
use crate::trace::{DriverOp, DriverTrace};
use crate::MixerError;

/// Owns the mixer and the per-category route state.
///
/// The router is not synchronized. Callers hold the hardware lock for every
/// call.
pub struct Router {
    mixer: Box<dyn Mixer>,
    tables: &'static RouteTables,
    routes: [EndpointMask; 4],
    disabled: [bool; 4],
    sco: ScoLink,
    master_volume: f32,
    voice_volume: f32,
    playback_volume: f32,
    trace: Arc<DriverTrace>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("disabled", &self.disabled)
            .field("sco", &self.sco)
            .field("master_volume", &self.master_volume)
            .field("voice_volume", &self.voice_volume)
            .field("playback_volume", &self.playback_volume)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Opens the mixer and applies the initial pin configuration.
    ///
    /// This is the only router call that can fail.
    pub fn open(
        driver: &dyn MixerDriver,
        pcm: Arc<dyn PcmDriver>,
        tables: &'static RouteTables,
        trace: Arc<DriverTrace>,
    ) -> Result<Self, MixerError> {
        let mixer = trace.call(DriverOp::MixerOpen, || driver.open()).map_err(|e| {
            tracing::error!(error = %e, "failed to open mixer");
            e
        })?;

        let mut router = Self {
            mixer,
            tables,
            routes: [EndpointMask::empty(); 4],
            disabled: [false; 4],
            sco: ScoLink::new(pcm),
            master_volume: 0.0,
            voice_volume: 0.0,
            playback_volume: 1.0,
            trace,
        };
        router.enable_pins(tables.initial);
        Ok(router)
    }

    /// Returns the stored endpoint mask for `category`.
    #[must_use]
    pub fn route(&self, category: RouteCategory) -> EndpointMask {
        self.routes[category.index()]
    }

    /// Returns true if `category` is currently inert.
    #[must_use]
    pub fn is_disabled(&self, category: RouteCategory) -> bool {
        self.disabled[category.index()]
    }

    /// Returns the current playback path gain factor.
    #[must_use]
    pub fn playback_volume(&self) -> f32 {
        self.playback_volume
    }

    /// Returns the Bluetooth SCO link state.
    #[must_use]
    pub fn sco(&self) -> &ScoLink {
        &self.sco
    }

    /// Replaces the endpoint mask for `category`.
    ///
    /// While the category is disabled the mask is only stored.
    pub fn set_audio_route(&mut self, category: RouteCategory, mask: EndpointMask) {
        let index = category.index();
        if self.disabled[index] {
            self.routes[index] = mask;
            return;
        }

        tracing::debug!(?category, from = ?self.routes[index], to = ?mask, "setting route");

        if category.is_playback() {
            self.mute_outputs();
        }
        self.disable_route(category);
        self.routes[index] = mask;
        self.enable_route(category);
        if category.is_playback() {
            self.update_volume();
        }
    }

    /// Makes `category` inert (reverting its endpoints) or live again
    /// (replaying its stored mask).
    pub fn set_route_disable(&mut self, category: RouteCategory, disabled: bool) {
        let index = category.index();
        if self.disabled[index] == disabled {
            return;
        }

        tracing::debug!(?category, disabled, "changing route enablement");

        if disabled {
            self.disable_route(category);
        } else {
            if category.is_playback() {
                self.mute_outputs();
            }
            self.enable_route(category);
            if category.is_playback() {
                self.update_volume();
            }
        }

        self.disabled[index] = disabled;
    }

    /// Stores the in-call volume and rebalances output gains.
    pub fn set_voice_volume(&mut self, volume: f32) {
        self.voice_volume = volume;
        self.update_volume();
    }

    /// Stores the media volume and rebalances output gains.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
        self.update_volume();
    }

    fn entries(&self, category: RouteCategory) -> impl Iterator<Item = &'static RouteEntry> {
        let mask = self.routes[category.index()];
        self.tables
            .route(category)
            .iter()
            .filter(move |entry| mask.has(entry.endpoint))
    }

    fn enable_route(&mut self, category: RouteCategory) {
        for entry in self.entries(category) {
            if let Some(path) = entry.sco {
                self.sco.acquire(path);
            }
            self.enable_pins(entry.pins);
        }
    }

    fn disable_route(&mut self, category: RouteCategory) {
        for entry in self.entries(category) {
            self.disable_pins(entry.pins);
            if let Some(path) = entry.sco {
                self.sco.release(path);
            }
        }
    }

    fn enable_pins(&mut self, pins: &[PinConfig]) {
        for pin in pins {
            self.apply(pin.control, pin.on_enable());
        }
    }

    fn disable_pins(&mut self, pins: &[PinConfig]) {
        for pin in pins.iter().rev() {
            if let Some(write) = pin.on_disable() {
                self.apply(pin.control, write);
            }
        }
    }

    fn apply(&mut self, control: &str, write: PinWrite) {
        let Some(id) = self.trace.call(DriverOp::MixerGet, || self.mixer.control(control)) else {
            tracing::warn!(control, "failed to get control");
            return;
        };

        let result = self.trace.call(DriverOp::MixerSet, || match write {
            PinWrite::Value(value) => self.mixer.set_value(id, value),
            PinWrite::Select(option) => self.mixer.select(id, option),
        });
        if let Err(e) = result {
            tracing::warn!(control, ?write, error = %e, "failed to set control");
        }
    }

    fn set_volume(&mut self, control: &VolumeControl, volume: f32) {
        let raw = control.raw(volume) as i32;
        tracing::trace!(control = control.control, volume, raw, "setting volume");
        self.apply(control.control, PinWrite::Value(raw));
    }

    fn set_endpoint_volume(&mut self, mask: EndpointMask, volume: f32) {
        let tables = self.tables;
        for (endpoint, control) in tables.endpoint_volumes {
            if mask.has(*endpoint) {
                self.set_volume(control, volume);
            }
        }
    }

    fn set_path_volume(&mut self, category: RouteCategory, volume: f32) {
        let tables = self.tables;
        if let Some(control) = tables.path_volume(category) {
            self.set_volume(control, volume);
        }
    }

    fn mute_outputs(&mut self) {
        self.set_endpoint_volume(self.route(RouteCategory::Output), 0.0);
        self.set_endpoint_volume(self.route(RouteCategory::VoiceOut), 0.0);
    }

    fn update_volume(&mut self) {
        let output = self.route(RouteCategory::Output);
        let voice_out = self.route(RouteCategory::VoiceOut);

        let mut playback = 1.0;
        let mut output_volume = self.master_volume;
        let mut voice_volume = self.voice_volume;

        // Both branches present the voice level on shared endpoints; only
        // the louder voice case scales the playback path down.
        if output.intersects(voice_out) {
            output_volume = self.voice_volume;
            voice_volume = self.voice_volume;
            if self.voice_volume > self.master_volume {
                playback = self.master_volume / self.voice_volume;
            }
        }

        if playback <= self.playback_volume {
            self.set_path_volume(RouteCategory::Output, playback);
        }
        self.set_endpoint_volume(output, output_volume);
        self.set_endpoint_volume(voice_out, voice_volume);
        if playback > self.playback_volume {
            self.set_path_volume(RouteCategory::Output, playback);
        }

        self.playback_volume = playback;
    }
}
