//! Calibration type definitions

use serde::{Deserialize, Serialize};

use crate::{CalibrationError, CalibrationResult};

/// Margin below which the rest position counts as sitting on an endpoint.
/// A center within one count of an end makes the axis unidirectional.
const CENTER_EPSILON: i32 = 1;

/// How an axis maps raw travel onto its output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisClass {
    /// Rest position somewhere in the middle of the travel; mapped in two
    /// segments around a center deadzone (sticks, rudders).
    Centered,
    /// Rest position at one end of the travel; mapped in a single segment
    /// with no deadzone (throttles).
    Unidirectional,
}

/// Captured travel of one physical axis.
///
/// Recorded once per (role, source-code) pair by the external calibration
/// wizard; the daemon only consumes it. Invariants:
/// `observed_min <= center <= observed_max` and `deadzone_radius >= 0`.
///
/// # Examples
///
/// ```
/// use openhotas_calibration::{AxisCalibration, AxisClass};
///
/// let stick = AxisCalibration::new(0, 1023).with_center(600).with_deadzone_radius(5);
/// assert_eq!(stick.classify(), AxisClass::Centered);
///
/// let throttle = AxisCalibration::new(50, 950).with_center(50);
/// assert_eq!(throttle.classify(), AxisClass::Unidirectional);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisCalibration {
    /// Smallest raw value observed over full travel.
    pub observed_min: i32,
    /// Largest raw value observed over full travel.
    pub observed_max: i32,
    /// Raw value at the rest position.
    pub center: i32,
    /// Half-width of the no-output band around `center`, in raw counts.
    #[serde(default)]
    pub deadzone_radius: i32,
}

impl AxisCalibration {
    /// Creates a calibration for the given observed travel, with the center
    /// assumed at the midpoint and no deadzone.
    pub fn new(observed_min: i32, observed_max: i32) -> Self {
        Self {
            observed_min,
            observed_max,
            center: observed_min + (observed_max - observed_min) / 2,
            deadzone_radius: 0,
        }
    }

    /// Sets the measured rest position.
    pub fn with_center(mut self, center: i32) -> Self {
        self.center = center;
        self
    }

    /// Sets the deadzone half-width in raw counts.
    pub fn with_deadzone_radius(mut self, radius: i32) -> Self {
        self.deadzone_radius = radius;
        self
    }

    /// Checks the structural invariants.
    pub fn validate(&self) -> CalibrationResult<()> {
        if self.observed_min > self.observed_max {
            return Err(CalibrationError::InvertedRange {
                min: self.observed_min,
                max: self.observed_max,
            });
        }
        if self.center < self.observed_min || self.center > self.observed_max {
            return Err(CalibrationError::CenterOutOfRange {
                center: self.center,
                min: self.observed_min,
                max: self.observed_max,
            });
        }
        if self.deadzone_radius < 0 {
            return Err(CalibrationError::NegativeDeadzone(self.deadzone_radius));
        }
        Ok(())
    }

    /// Classifies the axis: centered when the rest position has real travel
    /// on both sides, unidirectional otherwise.
    pub fn classify(&self) -> AxisClass {
        if self.center - self.observed_min > CENTER_EPSILON
            && self.observed_max - self.center > CENTER_EPSILON
        {
            AxisClass::Centered
        } else {
            AxisClass::Unidirectional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assumes_midpoint_center() {
        let cal = AxisCalibration::new(0, 1000);
        assert_eq!(cal.center, 500);
        assert_eq!(cal.deadzone_radius, 0);
    }

    #[test]
    fn test_classify_centered() {
        let cal = AxisCalibration::new(0, 1023).with_center(600);
        assert_eq!(cal.classify(), AxisClass::Centered);
    }

    #[test]
    fn test_classify_unidirectional_at_either_end() {
        let low = AxisCalibration::new(50, 950).with_center(50);
        assert_eq!(low.classify(), AxisClass::Unidirectional);
        let high = AxisCalibration::new(50, 950).with_center(950);
        assert_eq!(high.classify(), AxisClass::Unidirectional);
        // One count off the end still counts as on it.
        let near = AxisCalibration::new(50, 950).with_center(51);
        assert_eq!(near.classify(), AxisClass::Unidirectional);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let cal = AxisCalibration {
            observed_min: 100,
            observed_max: 0,
            center: 50,
            deadzone_radius: 0,
        };
        assert_eq!(
            cal.validate(),
            Err(CalibrationError::InvertedRange { min: 100, max: 0 })
        );
    }

    #[test]
    fn test_validate_rejects_center_out_of_range() {
        let cal = AxisCalibration::new(0, 100).with_center(101);
        assert!(matches!(
            cal.validate(),
            Err(CalibrationError::CenterOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_deadzone() {
        let cal = AxisCalibration::new(0, 100).with_deadzone_radius(-1);
        assert_eq!(
            cal.validate(),
            Err(CalibrationError::NegativeDeadzone(-1))
        );
    }
}
