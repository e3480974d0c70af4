//! HID usages referenced by the PID layer.
//!
//! Values come from the USB HID Usage Tables, "Physical Input Device"
//! page (0x0F), plus the handful of generic desktop, button and ordinal
//! usages a PID descriptor pairs them with.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A (page, id) usage pair.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Usage {
    pub page: u16,
    pub id: u16,
}

impl Usage {
    pub const fn new(page: u16, id: u16) -> Self {
        Self { page, id }
    }

    pub const fn is_pid(self) -> bool {
        self.page == page::PID
    }

    pub const fn is_ordinal(self) -> bool {
        self.page == page::ORDINAL
    }

    /// Name of the usage when it is one this crate knows.
    pub fn name(self) -> Option<&'static str> {
        match self.page {
            page::PID => pid::name(self.id),
            page::GENERIC_DESKTOP => generic::name(self.id),
            _ => None,
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.page) {
            (Some(name), _) => f.write_str(name),
            (None, page::ORDINAL) => write!(f, "ORDINAL_{}", self.id),
            (None, page::BUTTON) => write!(f, "BUTTON_{}", self.id),
            (None, _) => write!(f, "{:#06x}:{:#06x}", self.page, self.id),
        }
    }
}

pub mod page {
    pub const GENERIC_DESKTOP: u16 = 0x01;
    pub const BUTTON: u16 = 0x09;
    pub const ORDINAL: u16 = 0x0A;
    pub const PID: u16 = 0x0F;
}

pub const fn ordinal(n: u16) -> Usage {
    Usage::new(page::ORDINAL, n)
}

pub const fn button(n: u16) -> Usage {
    Usage::new(page::BUTTON, n)
}

pub mod generic {
    use super::{Usage, page};

    pub const JOYSTICK: Usage = Usage::new(page::GENERIC_DESKTOP, 0x04);
    pub const X: Usage = Usage::new(page::GENERIC_DESKTOP, 0x30);
    pub const Y: Usage = Usage::new(page::GENERIC_DESKTOP, 0x31);
    pub const Z: Usage = Usage::new(page::GENERIC_DESKTOP, 0x32);
    pub const RX: Usage = Usage::new(page::GENERIC_DESKTOP, 0x33);
    pub const RY: Usage = Usage::new(page::GENERIC_DESKTOP, 0x34);
    pub const RZ: Usage = Usage::new(page::GENERIC_DESKTOP, 0x35);
    pub const SLIDER: Usage = Usage::new(page::GENERIC_DESKTOP, 0x36);
    pub const DIAL: Usage = Usage::new(page::GENERIC_DESKTOP, 0x37);
    pub const WHEEL: Usage = Usage::new(page::GENERIC_DESKTOP, 0x38);

    pub(super) fn name(id: u16) -> Option<&'static str> {
        Some(match id {
            0x04 => "JOYSTICK",
            0x30 => "X",
            0x31 => "Y",
            0x32 => "Z",
            0x33 => "RX",
            0x34 => "RY",
            0x35 => "RZ",
            0x36 => "SLIDER",
            0x37 => "DIAL",
            0x38 => "WHEEL",
            _ => return None,
        })
    }
}

macro_rules! pid_usages {
    ($($name:ident = $id:literal),* $(,)?) => {
        $(pub const $name: Usage = Usage::new(page::PID, $id);)*

        pub(super) fn name(id: u16) -> Option<&'static str> {
            match id {
                $($id => Some(stringify!($name)),)*
                _ => None,
            }
        }

        /// Every PID usage this crate names.
        pub const ALL: &[Usage] = &[$($name),*];
    };
}

/// Physical Input Device page.
pub mod pid {
    use super::{Usage, page};

    pid_usages! {
        PHYSICAL_INTERFACE_DEVICE = 0x01,
        NORMAL = 0x20,
        SET_EFFECT_REPORT = 0x21,
        EFFECT_BLOCK_INDEX = 0x22,
        PARAMETER_BLOCK_OFFSET = 0x23,
        ROM_FLAG = 0x24,
        EFFECT_TYPE = 0x25,
        ET_CONSTANT_FORCE = 0x26,
        ET_RAMP = 0x27,
        ET_CUSTOM_FORCE_DATA = 0x28,
        ET_SQUARE = 0x30,
        ET_SINE = 0x31,
        ET_TRIANGLE = 0x32,
        ET_SAWTOOTH_UP = 0x33,
        ET_SAWTOOTH_DOWN = 0x34,
        ET_SPRING = 0x40,
        ET_DAMPER = 0x41,
        ET_INERTIA = 0x42,
        ET_FRICTION = 0x43,
        DURATION = 0x50,
        SAMPLE_PERIOD = 0x51,
        GAIN = 0x52,
        TRIGGER_BUTTON = 0x53,
        TRIGGER_REPEAT_INTERVAL = 0x54,
        AXES_ENABLE = 0x55,
        DIRECTION_ENABLE = 0x56,
        DIRECTION = 0x57,
        TYPE_SPECIFIC_BLOCK_OFFSET = 0x58,
        BLOCK_TYPE = 0x59,
        SET_ENVELOPE_REPORT = 0x5a,
        ATTACK_LEVEL = 0x5b,
        ATTACK_TIME = 0x5c,
        FADE_LEVEL = 0x5d,
        FADE_TIME = 0x5e,
        SET_CONDITION_REPORT = 0x5f,
        CP_OFFSET = 0x60,
        POSITIVE_COEFFICIENT = 0x61,
        NEGATIVE_COEFFICIENT = 0x62,
        POSITIVE_SATURATION = 0x63,
        NEGATIVE_SATURATION = 0x64,
        DEAD_BAND = 0x65,
        DOWNLOAD_FORCE_SAMPLE = 0x66,
        ISOCH_CUSTOM_FORCE_ENABLE = 0x67,
        CUSTOM_FORCE_DATA_REPORT = 0x68,
        CUSTOM_FORCE_DATA = 0x69,
        CUSTOM_FORCE_VENDOR_DEFINED_DATA = 0x6a,
        SET_CUSTOM_FORCE_REPORT = 0x6b,
        CUSTOM_FORCE_DATA_OFFSET = 0x6c,
        SAMPLE_COUNT = 0x6d,
        SET_PERIODIC_REPORT = 0x6e,
        OFFSET = 0x6f,
        MAGNITUDE = 0x70,
        PHASE = 0x71,
        PERIOD = 0x72,
        SET_CONSTANT_FORCE_REPORT = 0x73,
        SET_RAMP_FORCE_REPORT = 0x74,
        RAMP_START = 0x75,
        RAMP_END = 0x76,
        EFFECT_OPERATION_REPORT = 0x77,
        EFFECT_OPERATION = 0x78,
        OP_EFFECT_START = 0x79,
        OP_EFFECT_START_SOLO = 0x7a,
        OP_EFFECT_STOP = 0x7b,
        LOOP_COUNT = 0x7c,
        DEVICE_GAIN_REPORT = 0x7d,
        DEVICE_GAIN = 0x7e,
        POOL_REPORT = 0x7f,
        RAM_POOL_SIZE = 0x80,
        ROM_POOL_SIZE = 0x81,
        ROM_EFFECT_BLOCK_COUNT = 0x82,
        SIMULTANEOUS_EFFECTS_MAX = 0x83,
        POOL_ALIGNMENT = 0x84,
        POOL_MOVE_REPORT = 0x85,
        MOVE_SOURCE = 0x86,
        MOVE_DESTINATION = 0x87,
        MOVE_LENGTH = 0x88,
        BLOCK_LOAD_REPORT = 0x89,
        BLOCK_LOAD_STATUS = 0x8b,
        BLOCK_LOAD_SUCCESS = 0x8c,
        BLOCK_LOAD_FULL = 0x8d,
        BLOCK_LOAD_ERROR = 0x8e,
        BLOCK_HANDLE = 0x8f,
        BLOCK_FREE_REPORT = 0x90,
        TYPE_SPECIFIC_BLOCK_HANDLE = 0x91,
        STATE_REPORT = 0x92,
        EFFECT_PLAYING = 0x94,
        DEVICE_CONTROL_REPORT = 0x95,
        DEVICE_CONTROL = 0x96,
        DC_ENABLE_ACTUATORS = 0x97,
        DC_DISABLE_ACTUATORS = 0x98,
        DC_STOP_ALL_EFFECTS = 0x99,
        DC_DEVICE_RESET = 0x9a,
        DC_DEVICE_PAUSE = 0x9b,
        DC_DEVICE_CONTINUE = 0x9c,
        DEVICE_PAUSED = 0x9f,
        ACTUATORS_ENABLED = 0xa0,
        SAFETY_SWITCH = 0xa4,
        ACTUATOR_OVERRIDE_SWITCH = 0xa5,
        ACTUATOR_POWER = 0xa6,
        START_DELAY = 0xa7,
        PARAMETER_BLOCK_SIZE = 0xa8,
        DEVICE_MANAGED_POOL = 0xa9,
        SHARED_PARAMETER_BLOCKS = 0xaa,
        CREATE_NEW_EFFECT_REPORT = 0xab,
        RAM_POOL_AVAILABLE = 0xac,
    }

    /// Usages that name a whole report. A field belongs to the nearest
    /// enclosing collection carrying one of these.
    pub const REPORT_USAGES: &[Usage] = &[
        SET_EFFECT_REPORT,
        SET_ENVELOPE_REPORT,
        SET_CONDITION_REPORT,
        CUSTOM_FORCE_DATA_REPORT,
        DOWNLOAD_FORCE_SAMPLE,
        SET_CUSTOM_FORCE_REPORT,
        SET_PERIODIC_REPORT,
        SET_CONSTANT_FORCE_REPORT,
        SET_RAMP_FORCE_REPORT,
        EFFECT_OPERATION_REPORT,
        DEVICE_GAIN_REPORT,
        POOL_REPORT,
        POOL_MOVE_REPORT,
        BLOCK_LOAD_REPORT,
        BLOCK_FREE_REPORT,
        STATE_REPORT,
        DEVICE_CONTROL_REPORT,
        CREATE_NEW_EFFECT_REPORT,
    ];

    pub fn is_report_usage(usage: Usage) -> bool {
        REPORT_USAGES.contains(&usage)
    }
}
