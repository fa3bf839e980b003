//! Bindings: one physical input driving one virtual slot, with the
//! per-binding output spec for axis destinations.

use serde::{Deserialize, Serialize};

use crate::contract::{ContractError, VirtualSlot};
use crate::input::PhysicalInput;

/// Per-binding axis output spec.
///
/// `min_out`/`max_out` are the destination range; for bindings built from
/// configuration they come from the contract slot. `deadzone` only applies
/// when no calibration is installed for the source axis; an installed
/// calibration's own deadzone radius supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTransform {
    pub invert: bool,
    pub deadzone: i32,
    pub scale: f32,
    pub min_out: i32,
    pub max_out: i32,
}

impl Default for AxisTransform {
    /// The identity transform: raw values pass through unchanged over the
    /// full 16-bit unsigned range.
    fn default() -> Self {
        Self {
            invert: false,
            deadzone: 0,
            scale: 1.0,
            min_out: 0,
            max_out: 65535,
        }
    }
}

impl AxisTransform {
    /// A pass-through transform targeting the given output range.
    pub fn for_range(min_out: i32, max_out: i32) -> Self {
        Self {
            min_out,
            max_out,
            ..Self::default()
        }
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_deadzone(mut self, deadzone: i32) -> Self {
        self.deadzone = deadzone;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// One physical input wired to one virtual slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub src: PhysicalInput,
    pub dst: VirtualSlot,
    pub xform: AxisTransform,
}

impl Binding {
    pub fn new(src: PhysicalInput, dst: VirtualSlot, xform: AxisTransform) -> Self {
        Self { src, dst, xform }
    }

    /// A button binding; the transform is unused for button destinations.
    pub fn button(src: PhysicalInput, dst: VirtualSlot) -> Self {
        Self {
            src,
            dst,
            xform: AxisTransform::default(),
        }
    }

    /// Check this binding against the contract: the destination must be a
    /// legal slot and the source kind must match the destination kind.
    pub fn validate(&self) -> Result<(), ContractError> {
        if !self.dst.is_in_contract() {
            return Err(ContractError::IllegalSlot(self.dst));
        }
        if self.src.kind != self.dst.kind {
            return Err(ContractError::KindMismatch {
                src_kind: self.src.kind,
                dst: self.dst,
            });
        }
        Ok(())
    }
}
