//! The virtual controller contract.
//!
//! The synthetic device presents a fixed, Xbox-360-compatible surface: 8
//! absolute axes with fixed ranges and a closed button set. Games depend on
//! this capability set never changing across a session, so the contract is
//! compiled in and bindings targeting anything else are rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::SourceKind;

/// Raw evdev event codes used by the contract.
///
/// Numeric values match `<linux/input-event-codes.h>` as reported by the
/// xpad driver for a real Xbox 360 pad.
pub mod codes {
    // Face buttons
    pub const BTN_SOUTH: u16 = 304; // A
    pub const BTN_EAST: u16 = 305; // B
    pub const BTN_NORTH: u16 = 307; // X
    pub const BTN_WEST: u16 = 308; // Y

    // Shoulders and trigger clicks
    pub const BTN_TL: u16 = 310;
    pub const BTN_TR: u16 = 311;
    pub const BTN_TL2: u16 = 312;
    pub const BTN_TR2: u16 = 313;

    // System buttons
    pub const BTN_SELECT: u16 = 314;
    pub const BTN_START: u16 = 315;
    pub const BTN_MODE: u16 = 316;

    // Stick clicks
    pub const BTN_THUMBL: u16 = 317;
    pub const BTN_THUMBR: u16 = 318;

    // D-pad directions
    pub const BTN_DPAD_UP: u16 = 544;
    pub const BTN_DPAD_DOWN: u16 = 545;
    pub const BTN_DPAD_LEFT: u16 = 546;
    pub const BTN_DPAD_RIGHT: u16 = 547;

    // Axes
    pub const ABS_X: u16 = 0;
    pub const ABS_Y: u16 = 1;
    pub const ABS_Z: u16 = 2; // left trigger
    pub const ABS_RX: u16 = 3;
    pub const ABS_RY: u16 = 4;
    pub const ABS_RZ: u16 = 5; // right trigger
    pub const ABS_HAT0X: u16 = 16;
    pub const ABS_HAT0Y: u16 = 17;

    // Common HOTAS source codes, used by the default binding table.
    pub const BTN_TRIGGER: u16 = 288;
    pub const BTN_THUMB: u16 = 289;
    pub const BTN_THUMB2: u16 = 290;
    pub const BTN_TOP: u16 = 291;
    pub const BTN_TOP2: u16 = 292;
    pub const BTN_PINKIE: u16 = 293;
    pub const BTN_BASE: u16 = 294;
    pub const BTN_BASE2: u16 = 295;
    pub const BTN_BASE3: u16 = 296;
    pub const BTN_BASE4: u16 = 297;
    pub const ABS_THROTTLE: u16 = 6;
    pub const ABS_RUDDER: u16 = 7;
}

pub const STICK_MIN: i32 = -32768;
pub const STICK_MAX: i32 = 32767;
pub const TRIGGER_MIN: i32 = 0;
pub const TRIGGER_MAX: i32 = 255;
pub const HAT_MIN: i32 = -1;
pub const HAT_MAX: i32 = 1;

/// USB identity presented by the virtual device. Games recognise the
/// Microsoft Xbox 360 controller without extra mapping layers.
pub const VENDOR_ID: u16 = 0x045e;
pub const PRODUCT_ID: u16 = 0x028e;
pub const VERSION: u16 = 0x0110;

/// Declared range and jitter metadata for one contract axis.
#[derive(Debug, Clone, Copy)]
pub struct AxisSpec {
    pub code: u16,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

const fn stick(code: u16) -> AxisSpec {
    AxisSpec {
        code,
        min: STICK_MIN,
        max: STICK_MAX,
        fuzz: 16,
        flat: 128,
    }
}

const fn trigger(code: u16) -> AxisSpec {
    AxisSpec {
        code,
        min: TRIGGER_MIN,
        max: TRIGGER_MAX,
        fuzz: 0,
        flat: 0,
    }
}

const fn hat(code: u16) -> AxisSpec {
    AxisSpec {
        code,
        min: HAT_MIN,
        max: HAT_MAX,
        fuzz: 0,
        flat: 0,
    }
}

/// The 8 contract axes, in declaration order.
pub const AXES: [AxisSpec; 8] = [
    stick(codes::ABS_X),
    stick(codes::ABS_Y),
    stick(codes::ABS_RX),
    stick(codes::ABS_RY),
    trigger(codes::ABS_Z),
    trigger(codes::ABS_RZ),
    hat(codes::ABS_HAT0X),
    hat(codes::ABS_HAT0Y),
];

/// The 17 contract buttons.
pub const BUTTONS: [u16; 17] = [
    codes::BTN_SOUTH,
    codes::BTN_EAST,
    codes::BTN_NORTH,
    codes::BTN_WEST,
    codes::BTN_TL,
    codes::BTN_TR,
    codes::BTN_TL2,
    codes::BTN_TR2,
    codes::BTN_SELECT,
    codes::BTN_START,
    codes::BTN_MODE,
    codes::BTN_THUMBL,
    codes::BTN_THUMBR,
    codes::BTN_DPAD_UP,
    codes::BTN_DPAD_DOWN,
    codes::BTN_DPAD_LEFT,
    codes::BTN_DPAD_RIGHT,
];

/// Trigger-click buttons: state is tracked (it feeds the analog trigger
/// mirror) but never emitted as button events, because some titles read
/// them as menu buttons.
pub const SUPPRESSED_BUTTONS: [u16; 2] = [codes::BTN_TL2, codes::BTN_TR2];

/// A binding or emission targets a slot outside the contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("virtual slot {0} is not part of the controller contract")]
    IllegalSlot(VirtualSlot),
    #[error("binding kind mismatch: {src_kind:?} source cannot drive {dst:?}")]
    KindMismatch {
        src_kind: SourceKind,
        dst: VirtualSlot,
    },
}

/// One output of the virtual device: a `(kind, code)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtualSlot {
    pub kind: SourceKind,
    pub code: u16,
}

impl VirtualSlot {
    pub fn button(code: u16) -> Self {
        Self {
            kind: SourceKind::Button,
            code,
        }
    }

    pub fn axis(code: u16) -> Self {
        Self {
            kind: SourceKind::Axis,
            code,
        }
    }

    /// Whether this slot is part of the contract.
    pub fn is_in_contract(&self) -> bool {
        match self.kind {
            SourceKind::Button => BUTTONS.contains(&self.code),
            SourceKind::Axis => AXES.iter().any(|a| a.code == self.code),
        }
    }

    /// Whether this is a trigger-click slot whose button emission is
    /// suppressed.
    pub fn is_suppressed_button(&self) -> bool {
        self.kind == SourceKind::Button && SUPPRESSED_BUTTONS.contains(&self.code)
    }

    /// Declared output range for an axis slot in the contract.
    pub fn output_range(&self) -> Option<(i32, i32)> {
        if self.kind != SourceKind::Axis {
            return None;
        }
        AXES
            .iter()
            .find(|a| a.code == self.code)
            .map(|a| (a.min, a.max))
    }
}

impl std::fmt::Display for VirtualSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SourceKind::Button => write!(f, "KEY:{}", self.code),
            SourceKind::Axis => write!(f, "ABS:{}", self.code),
        }
    }
}
