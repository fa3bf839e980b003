//! Axis calibration and the raw-to-contract transform
//!
//! This crate holds the numeric contract that turns raw per-device axis
//! values (asymmetric ranges, off-center rests, noise) into the fixed output
//! ranges of the virtual controller. Everything here is a total, pure
//! function of its inputs.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod transform;
pub mod types;

pub use transform::transform;
pub use types::{AxisCalibration, AxisClass};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("calibration range is inverted: observed_min {min} > observed_max {max}")]
    InvertedRange { min: i32, max: i32 },

    #[error("calibration center {center} lies outside [{min}, {max}]")]
    CenterOutOfRange { center: i32, min: i32, max: i32 },

    #[error("deadzone radius {0} is negative")]
    NegativeDeadzone(i32),
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;
