//! Platform audio devices and modes, and their mapping onto endpoints.

use bitflags::bitflags;

use crate::routing::EndpointMask;

/// The telephony mode of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// Media playback and capture.
    #[default]
    Normal,
    /// The phone is ringing.
    Ringtone,
    /// A cellular call is active. Voice routes own the codec.
    InCall,
    /// A VoIP call is active.
    InCommunication,
}

bitflags! {
    /// Platform device selection, as carried by the `routing` parameter.
    ///
    /// Output devices occupy the low half-word and input devices the high one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AudioDevices: u32 {
        /// Earpiece receiver.
        const OUT_EARPIECE = bits::OUT_EARPIECE;
        /// Loudspeaker.
        const OUT_SPEAKER = bits::OUT_SPEAKER;
        /// Wired headset with microphone.
        const OUT_WIRED_HEADSET = bits::OUT_WIRED_HEADSET;
        /// Wired headphones without microphone.
        const OUT_WIRED_HEADPHONE = bits::OUT_WIRED_HEADPHONE;
        /// Bluetooth SCO.
        const OUT_BLUETOOTH_SCO = bits::OUT_BLUETOOTH_SCO;
        /// Bluetooth SCO headset.
        const OUT_BLUETOOTH_SCO_HEADSET = bits::OUT_BLUETOOTH_SCO_HEADSET;
        /// Bluetooth SCO car kit.
        const OUT_BLUETOOTH_SCO_CARKIT = bits::OUT_BLUETOOTH_SCO_CARKIT;

        /// Communication capture source.
        const IN_COMMUNICATION = bits::IN_COMMUNICATION;
        /// Ambient capture source.
        const IN_AMBIENT = bits::IN_AMBIENT;
        /// Built-in (main) microphone.
        const IN_BUILTIN_MIC = bits::IN_BUILTIN_MIC;
        /// Bluetooth SCO headset microphone.
        const IN_BLUETOOTH_SCO_HEADSET = bits::IN_BLUETOOTH_SCO_HEADSET;
        /// Wired headset microphone.
        const IN_WIRED_HEADSET = bits::IN_WIRED_HEADSET;
        /// Digital auxiliary input.
        const IN_AUX_DIGITAL = bits::IN_AUX_DIGITAL;
        /// Voice call downlink.
        const IN_VOICE_CALL = bits::IN_VOICE_CALL;
        /// Back microphone.
        const IN_BACK_MIC = bits::IN_BACK_MIC;

        /// Every output device.
        const OUT_ALL = bits::OUT_ALL;
        /// Every input device.
        const IN_ALL = bits::IN_ALL;
    }
}

mod bits {
    pub const OUT_EARPIECE: u32 = 0x1;
    pub const OUT_SPEAKER: u32 = 0x2;
    pub const OUT_WIRED_HEADSET: u32 = 0x4;
    pub const OUT_WIRED_HEADPHONE: u32 = 0x8;
    pub const OUT_BLUETOOTH_SCO: u32 = 0x10;
    pub const OUT_BLUETOOTH_SCO_HEADSET: u32 = 0x20;
    pub const OUT_BLUETOOTH_SCO_CARKIT: u32 = 0x40;
    pub const OUT_ALL: u32 = 0x7f;

    pub const IN_COMMUNICATION: u32 = 0x1_0000;
    pub const IN_AMBIENT: u32 = 0x2_0000;
    pub const IN_BUILTIN_MIC: u32 = 0x4_0000;
    pub const IN_BLUETOOTH_SCO_HEADSET: u32 = 0x8_0000;
    pub const IN_WIRED_HEADSET: u32 = 0x10_0000;
    pub const IN_AUX_DIGITAL: u32 = 0x20_0000;
    pub const IN_VOICE_CALL: u32 = 0x40_0000;
    pub const IN_BACK_MIC: u32 = 0x80_0000;
    pub const IN_ALL: u32 = 0xff_0000;

    pub const OUT_SPEAKER_HEADSET: u32 = OUT_SPEAKER | OUT_WIRED_HEADSET;
    pub const OUT_SPEAKER_HEADPHONE: u32 = OUT_SPEAKER | OUT_WIRED_HEADPHONE;
}

impl AudioDevices {
    /// Returns true if this is exactly one input device.
    #[must_use]
    pub fn is_input_device(self) -> bool {
        self.bits().count_ones() == 1 && Self::IN_ALL.contains(self)
    }

    /// Endpoints for ordinary playback to this device.
    ///
    /// Unknown combinations route nowhere.
    #[must_use]
    pub fn output_route(self) -> EndpointMask {
        match self.bits() {
            bits::OUT_SPEAKER_HEADSET | bits::OUT_SPEAKER_HEADPHONE => {
                EndpointMask::AMP | EndpointMask::SPEAKER | EndpointMask::HEADPHONE
            }
            _ => self.voice_out_route(),
        }
    }

    /// Endpoints for the call downlink to this device.
    #[must_use]
    pub fn voice_out_route(self) -> EndpointMask {
        match self.bits() {
            bits::OUT_EARPIECE => EndpointMask::EARPIECE,
            bits::OUT_SPEAKER => EndpointMask::AMP | EndpointMask::SPEAKER,
            bits::OUT_WIRED_HEADPHONE | bits::OUT_WIRED_HEADSET => {
                EndpointMask::AMP | EndpointMask::HEADPHONE
            }
            bits::OUT_BLUETOOTH_SCO
            | bits::OUT_BLUETOOTH_SCO_HEADSET
            | bits::OUT_BLUETOOTH_SCO_CARKIT => EndpointMask::BLUETOOTH,
            _ => EndpointMask::empty(),
        }
    }

    /// Microphone feeding the call uplink while this output device is in use.
    #[must_use]
    pub fn voice_in_route(self) -> EndpointMask {
        match self.bits() {
            bits::OUT_EARPIECE | bits::OUT_WIRED_HEADPHONE => EndpointMask::MIC_MAIN,
            bits::OUT_SPEAKER => EndpointMask::MIC_SUB,
            bits::OUT_WIRED_HEADSET => EndpointMask::MIC_HEADSET,
            bits::OUT_BLUETOOTH_SCO
            | bits::OUT_BLUETOOTH_SCO_HEADSET
            | bits::OUT_BLUETOOTH_SCO_CARKIT => EndpointMask::MIC_BLUETOOTH,
            _ => EndpointMask::empty(),
        }
    }

    /// Endpoints for capturing from this input device.
    #[must_use]
    pub fn input_route(self) -> EndpointMask {
        match self.bits() {
            bits::IN_BUILTIN_MIC => EndpointMask::MIC_MAIN,
            bits::IN_BACK_MIC => EndpointMask::MIC_SUB,
            bits::IN_WIRED_HEADSET => EndpointMask::MIC_HEADSET,
            bits::IN_BLUETOOTH_SCO_HEADSET => EndpointMask::MIC_BLUETOOTH,
            bits::IN_VOICE_CALL => EndpointMask::PHONE_IN,
            _ => EndpointMask::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_input_device() {
        assert!(AudioDevices::IN_BUILTIN_MIC.is_input_device());
        assert!(AudioDevices::IN_VOICE_CALL.is_input_device());
        assert!(!AudioDevices::OUT_SPEAKER.is_input_device());
        assert!(!(AudioDevices::IN_BUILTIN_MIC | AudioDevices::IN_BACK_MIC).is_input_device());
        assert!(!AudioDevices::empty().is_input_device());
    }

    #[test]
    fn test_output_routes() {
        assert_eq!(AudioDevices::OUT_EARPIECE.output_route(), EndpointMask::EARPIECE);
        assert_eq!(
            AudioDevices::OUT_SPEAKER.output_route(),
            EndpointMask::AMP | EndpointMask::SPEAKER
        );
        assert_eq!(
            AudioDevices::OUT_WIRED_HEADSET.output_route(),
            EndpointMask::AMP | EndpointMask::HEADPHONE
        );
        assert_eq!(
            (AudioDevices::OUT_SPEAKER | AudioDevices::OUT_WIRED_HEADPHONE).output_route(),
            EndpointMask::AMP | EndpointMask::SPEAKER | EndpointMask::HEADPHONE
        );
        assert_eq!(
            AudioDevices::OUT_BLUETOOTH_SCO_CARKIT.output_route(),
            EndpointMask::BLUETOOTH
        );
        assert!((AudioDevices::OUT_EARPIECE | AudioDevices::OUT_SPEAKER)
            .output_route()
            .is_empty());
    }

    #[test]
    fn test_voice_routes_follow_output_device() {
        let speaker = AudioDevices::OUT_SPEAKER;
        assert_eq!(speaker.voice_out_route(), EndpointMask::AMP | EndpointMask::SPEAKER);
        assert_eq!(speaker.voice_in_route(), EndpointMask::MIC_SUB);

        let headset = AudioDevices::OUT_WIRED_HEADSET;
        assert_eq!(headset.voice_in_route(), EndpointMask::MIC_HEADSET);
        assert_eq!(
            AudioDevices::OUT_WIRED_HEADPHONE.voice_in_route(),
            EndpointMask::MIC_MAIN
        );

        // combined devices have no call path
        let both = AudioDevices::OUT_SPEAKER | AudioDevices::OUT_WIRED_HEADSET;
        assert!(both.voice_out_route().is_empty());
        assert!(both.voice_in_route().is_empty());
    }

    #[test]
    fn test_input_routes() {
        assert_eq!(AudioDevices::IN_BUILTIN_MIC.input_route(), EndpointMask::MIC_MAIN);
        assert_eq!(AudioDevices::IN_BACK_MIC.input_route(), EndpointMask::MIC_SUB);
        assert_eq!(
            AudioDevices::IN_BLUETOOTH_SCO_HEADSET.input_route(),
            EndpointMask::MIC_BLUETOOTH
        );
        assert_eq!(AudioDevices::IN_VOICE_CALL.input_route(), EndpointMask::PHONE_IN);
        assert!(AudioDevices::IN_AMBIENT.input_route().is_empty());
    }
}
