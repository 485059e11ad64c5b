//! Static pin-configuration and volume tables for the codec.
//!
//! Entries within a route apply top to bottom and revert bottom to top; the
//! mux directives rely on that ordering.

use super::endpoint::{Endpoint, RouteCategory};
use super::pin::PinConfig;
use super::sco::ScoPath;

/// One endpoint's directives within a route category.
#[derive(Debug, Clone, Copy)]
pub struct RouteEntry {
    /// The endpoint this entry enables.
    pub endpoint: Endpoint,
    /// Directives applied in order on enable.
    pub pins: &'static [PinConfig],
    /// Bluetooth SCO link held open while the endpoint is enabled.
    pub sco: Option<ScoPath>,
}

impl RouteEntry {
    const fn new(endpoint: Endpoint, pins: &'static [PinConfig]) -> Self {
        Self {
            endpoint,
            pins,
            sco: None,
        }
    }

    const fn with_sco(endpoint: Endpoint, pins: &'static [PinConfig], sco: ScoPath) -> Self {
        Self {
            endpoint,
            pins,
            sco: Some(sco),
        }
    }
}

/// A gain control and its full-scale raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeControl {
    /// Control name as exposed by the mixer driver.
    pub control: &'static str,
    /// Raw value for volume 1.0.
    pub max: u32,
}

impl VolumeControl {
    /// Converts a volume in `[0.0, 1.0]` to the control's raw range.
    #[must_use]
    pub fn raw(&self, volume: f32) -> u32 {
        (volume * self.max as f32) as u32
    }
}

/// The complete routing description for one codec.
#[derive(Debug)]
pub struct RouteTables {
    /// Directives applied once when the router opens.
    pub initial: &'static [PinConfig],
    /// Per-category route entries, indexed by [`RouteCategory::index`].
    pub routes: [&'static [RouteEntry]; 4],
    /// Output gain per endpoint.
    pub endpoint_volumes: &'static [(Endpoint, VolumeControl)],
    /// Path gain per route category.
    pub path_volumes: &'static [(RouteCategory, VolumeControl)],
}

impl RouteTables {
    /// Returns the entries for `category`.
    #[must_use]
    pub fn route(&self, category: RouteCategory) -> &'static [RouteEntry] {
        self.routes[category.index()]
    }

    /// Returns the path gain control for `category`, if it has one.
    #[must_use]
    pub fn path_volume(&self, category: RouteCategory) -> Option<&VolumeControl> {
        self.path_volumes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, control)| control)
    }
}

const MIC_AMP: &str = "Mic Amp Capture Volume";
const GSM_SEND: &str = "GSM Send Switch";
const GSM_RECEIVE: &str = "GSM Receive Switch";
const LINE_IN_4_DIFF: &str = "Line Input 4 Differential";

const INITIAL: &[PinConfig] = &[
    PinConfig::switch("Line Output 1 Differential", true),
    PinConfig::switch("Line Output 3 Differential", true),
    PinConfig::int("DATT-B DATT-B", 0, 0),
    PinConfig::int("DATT-B DATT-B", 231, 0),
    PinConfig::mux("BVMX Mux", "PCM-A", None),
    PinConfig::mux("SDOA Mux", "SRC-A", None),
];

const INPUT_MIC_MAIN: &[PinConfig] = &[
    PinConfig::switch("Line Input 1 Differential", true),
    PinConfig::switch("Main Mic Switch", true),
    PinConfig::mux("RIN MUX", "RIN2", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 13, 0),
];

const INPUT_MIC_SUB: &[PinConfig] = &[
    PinConfig::switch("Line Input 2 Differential", true),
    PinConfig::switch("Sub Mic Switch", true),
    PinConfig::mux("RIN MUX", "RIN2", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 9, 0),
];

const INPUT_HEADSET: &[PinConfig] = &[
    PinConfig::switch("Line Input 3 Differential", true),
    PinConfig::switch("Jack Mic Switch", true),
    PinConfig::mux("RIN MUX", "RIN2", None),
    PinConfig::mux("LIN MUX", "LIN3", None),
    PinConfig::int(MIC_AMP, 9, 0),
];

const INPUT_PHONE: &[PinConfig] = &[
    PinConfig::switch(LINE_IN_4_DIFF, true),
    PinConfig::switch("Main Mic Switch", true),
    PinConfig::mux("RIN MUX", "RIN4", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 13, 0),
];

const INPUT_BT: &[PinConfig] = &[
    PinConfig::mux("SDOL Mux", "SRC-B", Some("ADC Left")),
    PinConfig::mux("SDOR Mux", "SRC-B", Some("ADC Right")),
    PinConfig::int(MIC_AMP, 13, 0),
];

const INPUT_ROUTES: &[RouteEntry] = &[
    RouteEntry::new(Endpoint::MicMain, INPUT_MIC_MAIN),
    RouteEntry::new(Endpoint::MicSub, INPUT_MIC_SUB),
    RouteEntry::new(Endpoint::MicHeadset, INPUT_HEADSET),
    RouteEntry::new(Endpoint::PhoneIn, INPUT_PHONE),
    RouteEntry::with_sco(Endpoint::MicBluetooth, INPUT_BT, ScoPath::Input),
];

const OUTPUT_RCV: &[PinConfig] = &[
    PinConfig::switch("LOUT1 Mixer DACL", true),
    PinConfig::switch("ROUT1 Mixer DACR", true),
    PinConfig::switch("Earpiece Switch", true),
];

const OUTPUT_SPK: &[PinConfig] = &[PinConfig::switch("Speaker Switch", true)];

const OUTPUT_HP: &[PinConfig] = &[PinConfig::switch("Headphones Switch", true)];

const OUTPUT_AMP: &[PinConfig] = &[
    PinConfig::switch("LOUT2 Mixer DACHL", true),
    PinConfig::switch("ROUT2 Mixer DACHR", true),
];

const OUTPUT_ROUTES: &[RouteEntry] = &[
    RouteEntry::new(Endpoint::Earpiece, OUTPUT_RCV),
    RouteEntry::new(Endpoint::Amp, OUTPUT_AMP),
    RouteEntry::new(Endpoint::Speaker, OUTPUT_SPK),
    RouteEntry::new(Endpoint::Headphone, OUTPUT_HP),
    RouteEntry::with_sco(Endpoint::Bluetooth, &[], ScoPath::Output),
];

const VOICE_IN_MIC_MAIN: &[PinConfig] = &[
    PinConfig::switch("Line Input 1 Differential", true),
    PinConfig::switch("Main Mic Switch", true),
    PinConfig::switch("LOUT3 Mixer LINS1", true),
    PinConfig::switch("ROUT3 Mixer RINS1", true),
    PinConfig::switch(GSM_SEND, true),
    PinConfig::mux("RIN MUX", "RIN4", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 13, 0),
];

const VOICE_IN_MIC_SUB: &[PinConfig] = &[
    PinConfig::switch("Line Input 2 Differential", true),
    PinConfig::switch("Sub Mic Switch", true),
    PinConfig::switch("LOUT3 Mixer LINS2", true),
    PinConfig::switch("ROUT3 Mixer RINS2", true),
    PinConfig::switch(GSM_SEND, true),
    PinConfig::mux("RIN MUX", "RIN4", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 13, 0),
];

const VOICE_IN_HEADSET: &[PinConfig] = &[
    PinConfig::switch("Line Input 3 Differential", true),
    PinConfig::switch("Jack Mic Switch", true),
    PinConfig::switch("LOUT3 Mixer LINS3", true),
    PinConfig::switch("ROUT3 Mixer RINS3", true),
    PinConfig::switch(GSM_SEND, true),
    PinConfig::mux("RIN MUX", "RIN4", None),
    PinConfig::mux("LIN MUX", "LIN3", None),
    PinConfig::int(MIC_AMP, 9, 0),
];

const VOICE_IN_BT: &[PinConfig] = &[
    PinConfig::mux("SRA Mux", "SRMXR Mux", Some("MIXD")),
    PinConfig::mux("SRMXL Mux", "SRC-B", Some("PFMXL Mux")),
    PinConfig::switch("LOUT3 Mixer DACSL", true),
    PinConfig::switch(GSM_SEND, true),
    PinConfig::mux("SDOL Mux", "SRC-B", Some("ADC Left")),
    PinConfig::int(MIC_AMP, 5, -1),
];

const VOICE_IN_ROUTES: &[RouteEntry] = &[
    RouteEntry::new(Endpoint::MicMain, VOICE_IN_MIC_MAIN),
    RouteEntry::new(Endpoint::MicSub, VOICE_IN_MIC_SUB),
    RouteEntry::new(Endpoint::MicHeadset, VOICE_IN_HEADSET),
    RouteEntry::with_sco(Endpoint::MicBluetooth, VOICE_IN_BT, ScoPath::Input),
];

const VOICE_OUT_RCV: &[PinConfig] = &[
    PinConfig::switch(LINE_IN_4_DIFF, true),
    PinConfig::switch("LOUT1 Mixer DACL", true),
    PinConfig::switch("ROUT1 Mixer DACR", true),
    PinConfig::switch("LOUT1 Mixer LINL4", true),
    PinConfig::switch("ROUT1 Mixer RINR4", true),
    PinConfig::switch(GSM_RECEIVE, true),
    PinConfig::switch("Earpiece Switch", true),
];

const VOICE_OUT_AMP: &[PinConfig] = &[
    PinConfig::switch(LINE_IN_4_DIFF, true),
    PinConfig::switch("LOUT2 Mixer DACHL", true),
    PinConfig::switch("ROUT2 Mixer DACHR", true),
    PinConfig::switch("LOUT2 Mixer LINH4", true),
    PinConfig::switch("ROUT2 Mixer RINH4", true),
    PinConfig::switch(GSM_RECEIVE, true),
];

const VOICE_OUT_SPK: &[PinConfig] = &[PinConfig::switch("Speaker Switch", true)];

const VOICE_OUT_HP: &[PinConfig] = &[PinConfig::switch("Headphones Switch", true)];

const VOICE_OUT_BT: &[PinConfig] = &[
    PinConfig::switch(LINE_IN_4_DIFF, true),
    PinConfig::switch(GSM_RECEIVE, true),
    PinConfig::mux("PFMXR Mux", "PFMXR Mixer", Some("SDTI Right")),
    PinConfig::mux("RIN MUX", "RIN4", None),
    PinConfig::mux("LIN MUX", "LIN1", None),
    PinConfig::int(MIC_AMP, 5, 0),
];

const VOICE_OUT_ROUTES: &[RouteEntry] = &[
    RouteEntry::new(Endpoint::Earpiece, VOICE_OUT_RCV),
    RouteEntry::new(Endpoint::Amp, VOICE_OUT_AMP),
    RouteEntry::new(Endpoint::Speaker, VOICE_OUT_SPK),
    RouteEntry::new(Endpoint::Headphone, VOICE_OUT_HP),
    RouteEntry::with_sco(Endpoint::Bluetooth, VOICE_OUT_BT, ScoPath::Output),
];

/// Tables for the stock codec and its MAX9877 amplifier.
pub static DEFAULT_TABLES: RouteTables = RouteTables {
    initial: INITIAL,
    routes: [INPUT_ROUTES, OUTPUT_ROUTES, VOICE_IN_ROUTES, VOICE_OUT_ROUTES],
    endpoint_volumes: &[
        (
            Endpoint::Headphone,
            VolumeControl {
                control: "MAX9877 Amp HP Playback Volume",
                max: 28,
            },
        ),
        (
            Endpoint::PhoneOut,
            VolumeControl {
                control: "Line Output3 Playback Volume",
                max: 3,
            },
        ),
        (
            Endpoint::Earpiece,
            VolumeControl {
                control: "Line Output1 Playback Volume",
                max: 6,
            },
        ),
        (
            Endpoint::Speaker,
            VolumeControl {
                control: "MAX9877 Amp Speaker Playback Volume",
                max: 28,
            },
        ),
    ],
    path_volumes: &[
        (
            RouteCategory::Input,
            VolumeControl {
                control: MIC_AMP,
                max: 15,
            },
        ),
        (
            RouteCategory::Output,
            VolumeControl {
                control: "Master Playback Volume",
                max: 231,
            },
        ),
    ],
};
