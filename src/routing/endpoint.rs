//! Physical endpoints and route categories.

use bitflags::bitflags;

/// A physical audio transducer or path on the codec.
///
/// The discriminant is the endpoint's bit position in an [`EndpointMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Endpoint {
    /// Main (bottom) microphone.
    MicMain = 1,
    /// Secondary (back) microphone.
    MicSub = 2,
    /// Headset microphone on the jack.
    MicHeadset = 3,
    /// Wired headphones.
    Headphone = 4,
    /// Cellular modem downlink into the codec.
    PhoneIn = 5,
    /// Codec output towards the cellular modem.
    PhoneOut = 6,
    /// Bluetooth SCO microphone.
    MicBluetooth = 7,
    /// Bluetooth SCO output.
    Bluetooth = 8,
    /// Earpiece receiver.
    Earpiece = 9,
    /// Loudspeaker.
    Speaker = 10,
    /// External amplifier feeding speaker and headphones.
    Amp = 11,
}

impl Endpoint {
    /// Returns this endpoint as a single-bit mask.
    #[must_use]
    pub const fn mask(self) -> EndpointMask {
        EndpointMask::from_bits_retain(1 << self as u32)
    }
}

bitflags! {
    /// A set of endpoints, one bit per [`Endpoint`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EndpointMask: u32 {
        /// [`Endpoint::MicMain`]
        const MIC_MAIN = 1 << 1;
        /// [`Endpoint::MicSub`]
        const MIC_SUB = 1 << 2;
        /// [`Endpoint::MicHeadset`]
        const MIC_HEADSET = 1 << 3;
        /// [`Endpoint::Headphone`]
        const HEADPHONE = 1 << 4;
        /// [`Endpoint::PhoneIn`]
        const PHONE_IN = 1 << 5;
        /// [`Endpoint::PhoneOut`]
        const PHONE_OUT = 1 << 6;
        /// [`Endpoint::MicBluetooth`]
        const MIC_BLUETOOTH = 1 << 7;
        /// [`Endpoint::Bluetooth`]
        const BLUETOOTH = 1 << 8;
        /// [`Endpoint::Earpiece`]
        const EARPIECE = 1 << 9;
        /// [`Endpoint::Speaker`]
        const SPEAKER = 1 << 10;
        /// [`Endpoint::Amp`]
        const AMP = 1 << 11;
    }
}

impl EndpointMask {
    /// Returns true if `endpoint` is in this set.
    #[must_use]
    pub fn has(self, endpoint: Endpoint) -> bool {
        self.contains(endpoint.mask())
    }
}

/// One of the four independent routing channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteCategory {
    /// Capture path.
    Input = 0,
    /// Playback path.
    Output = 1,
    /// Cellular uplink.
    VoiceIn = 2,
    /// Cellular downlink.
    VoiceOut = 3,
}

impl RouteCategory {
    /// All categories in table order.
    pub const ALL: [Self; 4] = [Self::Input, Self::Output, Self::VoiceIn, Self::VoiceOut];

    /// Returns the category's index into per-category arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true for categories that drive an audible output.
    ///
    /// Changes to these are bracketed by a mute and a volume rebalance.
    #[must_use]
    pub const fn is_playback(self) -> bool {
        matches!(self, Self::Output | Self::VoiceOut)
    }
}
