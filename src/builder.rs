//! Builder pattern for `AudioHardware`.

use std::sync::Arc;

use crate::driver::{MixerDriver, NoWakeLock, PcmDriver, WakeLock};
use crate::hardware::{AudioHardware, HalContext};
use crate::routing::{Router, RouteTables, DEFAULT_TABLES};
use crate::trace::DriverTrace;
use crate::{
    event_callback, EventCallback, HalConfig, HalError, HalEvent, PCM_PERIOD_COUNT_MIN,
    PCM_PERIOD_SIZE_MIN,
};

/// Builder for configuring and opening the audio hardware.
///
/// Use [`AudioHardware::builder()`] to create a new builder. A mixer driver
/// and a PCM driver are required; everything else has a default.
///
/// # Example
///
/// ```
/// use asoc_audio_hal::driver::mock::{MockPcmDriver, VirtualMixer};
/// use asoc_audio_hal::{AudioHardware, HalConfig};
///
/// let hw = AudioHardware::builder()
///     .mixer(VirtualMixer::new())
///     .pcm(MockPcmDriver::new())
///     .with_config(HalConfig::default())
///     .on_event(|e| tracing::debug!(?e, "hal event"))
///     .build()
///     .unwrap();
/// assert!(hw.init_check().is_ok());
/// ```
#[must_use]
pub struct AudioHardwareBuilder {
    /// Mixer driver the router opens.
    mixer: Option<Box<dyn MixerDriver>>,
    /// PCM driver for codec and Bluetooth PCMs.
    pcm: Option<Arc<dyn PcmDriver>>,
    /// Wake lock held by active streams.
    wake_lock: Arc<dyn WakeLock>,
    /// Pin and volume tables of the codec.
    tables: &'static RouteTables,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Hardware configuration.
    config: HalConfig,
}

impl Default for AudioHardwareBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHardwareBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            mixer: None,
            pcm: None,
            wake_lock: Arc::new(NoWakeLock),
            tables: &DEFAULT_TABLES,
            event_callback: None,
            config: HalConfig::default(),
        }
    }

    /// Set the mixer driver.
    pub fn mixer<M: MixerDriver + 'static>(mut self, mixer: M) -> Self {
        self.mixer = Some(Box::new(mixer));
        self
    }

    /// Set the PCM driver.
    pub fn pcm<P: PcmDriver + 'static>(mut self, pcm: P) -> Self {
        self.pcm = Some(Arc::new(pcm));
        self
    }

    /// Set the wake lock held while streams are active.
    ///
    /// Defaults to [`NoWakeLock`].
    pub fn wake_lock<W: WakeLock + 'static>(mut self, wake_lock: W) -> Self {
        self.wake_lock = Arc::new(wake_lock);
        self
    }

    /// Use different codec tables.
    ///
    /// Defaults to [`DEFAULT_TABLES`].
    pub fn tables(mut self, tables: &'static RouteTables) -> Self {
        self.tables = tables;
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Callbacks run on the thread that caused the event, with HAL locks
    /// held. They must not call back into the hardware.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(HalEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set the hardware configuration.
    pub fn with_config(mut self, config: HalConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), HalError> {
        if self.mixer.is_none() {
            return Err(HalError::MissingDriver { name: "mixer" });
        }
        if self.pcm.is_none() {
            return Err(HalError::MissingDriver { name: "pcm" });
        }

        let config = &self.config;
        for (name, frames) in [
            ("output_period_size", config.output_period_size),
            ("input_period_size", config.input_period_size),
        ] {
            if frames < PCM_PERIOD_SIZE_MIN {
                return Err(HalError::bad_value(format!(
                    "{name} of {frames} frames is below the minimum of {PCM_PERIOD_SIZE_MIN}"
                )));
            }
        }
        for (name, count) in [
            ("output_period_count", config.output_period_count),
            ("input_period_count", config.input_period_count),
        ] {
            if count < PCM_PERIOD_COUNT_MIN {
                return Err(HalError::bad_value(format!(
                    "{name} of {count} is below the minimum of {PCM_PERIOD_COUNT_MIN}"
                )));
            }
        }
        Ok(())
    }

    /// Opens the mixer and creates the hardware.
    ///
    /// A mixer that fails to open does not fail the build. The hardware is
    /// still returned and reports it through
    /// [`init_check()`](AudioHardware::init_check).
    pub fn build(self) -> Result<AudioHardware, HalError> {
        self.validate()?;
        let (Some(mixer), Some(pcm)) = (self.mixer, self.pcm) else {
            return Err(HalError::MissingDriver { name: "mixer" });
        };

        let router_trace = Arc::new(DriverTrace::default());
        let router = match Router::open(mixer.as_ref(), pcm.clone(), self.tables, router_trace.clone()) {
            Ok(router) => Some(router),
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize audio router");
                None
            }
        };

        let ctx = Arc::new(HalContext {
            pcm,
            wake_lock: self.wake_lock,
            events: self.event_callback,
            config: self.config,
        });

        Ok(AudioHardware::from_parts(ctx, router, router_trace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockPcmDriver, VirtualMixer};

    #[test]
    fn test_builder_defaults() {
        let builder = AudioHardwareBuilder::new();
        assert!(builder.mixer.is_none());
        assert!(builder.pcm.is_none());
        assert!(builder.event_callback.is_none());
        assert_eq!(builder.config.output_period_size, 1024);
    }

    #[test]
    fn test_builder_rejects_missing_mixer() {
        let result = AudioHardware::builder().pcm(MockPcmDriver::new()).build();
        assert!(matches!(
            result,
            Err(HalError::MissingDriver { name: "mixer" })
        ));
    }

    #[test]
    fn test_builder_rejects_missing_pcm() {
        let result = AudioHardware::builder().mixer(VirtualMixer::new()).build();
        assert!(matches!(result, Err(HalError::MissingDriver { name: "pcm" })));
    }

    #[test]
    fn test_builder_rejects_short_periods() {
        let result = AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(MockPcmDriver::new())
            .with_config(HalConfig {
                input_period_size: 16,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(HalError::BadValue { .. })));

        let result = AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(MockPcmDriver::new())
            .with_config(HalConfig {
                output_period_count: 1,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(HalError::BadValue { .. })));
    }

    #[test]
    fn test_builder_accepts_minimum_periods() {
        let hw = AudioHardware::builder()
            .mixer(VirtualMixer::new())
            .pcm(MockPcmDriver::new())
            .with_config(HalConfig {
                input_period_size: PCM_PERIOD_SIZE_MIN,
                input_period_count: PCM_PERIOD_COUNT_MIN,
                output_period_size: PCM_PERIOD_SIZE_MIN,
                output_period_count: PCM_PERIOD_COUNT_MIN,
                ..Default::default()
            })
            .build();
        assert!(hw.is_ok());
    }

    #[test]
    fn test_builder_survives_mixer_failure() {
        let mixer = VirtualMixer::new();
        mixer.set_fail_open(true);

        let hw = AudioHardware::builder()
            .mixer(mixer)
            .pcm(MockPcmDriver::new())
            .build()
            .unwrap();
        assert!(matches!(hw.init_check(), Err(HalError::NotInitialized)));
    }

    #[test]
    fn test_builder_applies_initial_pins() {
        let mixer = VirtualMixer::new();
        let _hw = AudioHardware::builder()
            .mixer(mixer.clone())
            .pcm(MockPcmDriver::new())
            .build()
            .unwrap();
        assert!(!mixer.writes().is_empty());
    }
}
