//! The raw-to-output transform pipeline.
//!
//! Three numeric regimes, selected by the calibration state of the source
//! axis:
//!
//! * **Centered** calibration: two linear segments around a center deadzone.
//!   Mechanical off-center on consumer HOTAS gear routinely exceeds 5% of
//!   travel; a single-segment remap would leave the centered output sitting
//!   on a nonzero bias with asymmetric left/right sensitivity.
//! * **Unidirectional** calibration: one linear segment over the whole
//!   travel, no deadzone. Throttles must not quantize to zero around their
//!   rest position.
//! * **Uncalibrated** fallback: the raw value is assumed to occupy
//!   `[0, 65535]`.
//!
//! Intermediate math runs in `f64`; the final clamp to
//! `[min_out, max_out]` is the only post-condition on the result.

use openhotas_device_types::AxisTransform;

use crate::types::{AxisCalibration, AxisClass};

/// Raw span assumed when no calibration has been installed yet.
const UNCALIBRATED_SPAN: f64 = 65535.0;

fn linear(v: f64, in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    if in_hi <= in_lo {
        // Degenerate span: the deadzone (or a bad capture) swallowed the
        // whole segment. Snap to the nearer endpoint; the clamp bounds it.
        return if v <= in_lo { out_lo } else { out_hi };
    }
    out_lo + (v - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

fn centered(raw: i32, cal: &AxisCalibration, xform: &AxisTransform) -> f64 {
    let dz = cal.deadzone_radius;
    if (raw - cal.center).abs() < dz {
        return 0.0;
    }
    if raw < cal.center {
        let edge = cal.center - dz;
        linear(
            raw as f64,
            cal.observed_min as f64,
            edge as f64,
            xform.min_out as f64,
            0.0,
        )
    } else {
        let edge = cal.center + dz;
        linear(
            raw as f64,
            edge as f64,
            cal.observed_max as f64,
            0.0,
            xform.max_out as f64,
        )
    }
}

fn uncalibrated(raw: i32, xform: &AxisTransform) -> f64 {
    let mapped = linear(
        raw as f64,
        0.0,
        UNCALIBRATED_SPAN,
        xform.min_out as f64,
        xform.max_out as f64,
    );
    if xform.deadzone > 0 {
        let dz = xform.deadzone as f64;
        if mapped < 0.0 {
            (mapped + dz).min(0.0)
        } else {
            (mapped - dz).max(0.0)
        }
    } else {
        mapped
    }
}

/// Converts one raw axis value to its output value.
///
/// Total over the whole input domain: every `i32` produces a value inside
/// `[xform.min_out, xform.max_out]`.
pub fn transform(raw: i32, xform: &AxisTransform, calibration: Option<&AxisCalibration>) -> i32 {
    let mapped = match calibration {
        Some(cal) => match cal.classify() {
            AxisClass::Centered => centered(raw, cal, xform),
            AxisClass::Unidirectional => linear(
                raw as f64,
                cal.observed_min as f64,
                cal.observed_max as f64,
                xform.min_out as f64,
                xform.max_out as f64,
            ),
        },
        None => uncalibrated(raw, xform),
    };

    let scaled = mapped * xform.scale as f64;
    let oriented = if xform.invert {
        // Reflect about the midpoint of the output range.
        (xform.min_out as f64 + xform.max_out as f64) - scaled
    } else {
        scaled
    };

    (oriented.round() as i64).clamp(xform.min_out as i64, xform.max_out as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stick_xform() -> AxisTransform {
        AxisTransform::for_range(-32768, 32767)
    }

    fn trigger_xform() -> AxisTransform {
        AxisTransform::for_range(0, 255)
    }

    #[test]
    fn test_centered_boundary_table() {
        let cal = AxisCalibration::new(0, 1023)
            .with_center(600)
            .with_deadzone_radius(5);
        let xform = stick_xform();

        assert_eq!(transform(0, &xform, Some(&cal)), -32768);
        assert_eq!(transform(600, &xform, Some(&cal)), 0);
        assert_eq!(transform(603, &xform, Some(&cal)), 0); // inside deadzone
        assert_eq!(transform(605, &xform, Some(&cal)), 0); // at deadzone edge
        assert_eq!(transform(1023, &xform, Some(&cal)), 32767);

        // Left segment is linear over [observed_min, center - deadzone].
        assert_eq!(transform(300, &xform, Some(&cal)), -16246);
    }

    #[test]
    fn test_centered_deadzone_band_is_flat_zero() {
        let cal = AxisCalibration::new(0, 1023)
            .with_center(600)
            .with_deadzone_radius(5);
        let xform = stick_xform();
        for raw in 596..=604 {
            assert_eq!(transform(raw, &xform, Some(&cal)), 0, "raw={raw}");
        }
        assert!(transform(595, &xform, Some(&cal)) < 0);
        assert_eq!(transform(605, &xform, Some(&cal)), 0);
        assert!(transform(606, &xform, Some(&cal)) > 0);
    }

    #[test]
    fn test_unidirectional_throttle() {
        let cal = AxisCalibration::new(50, 950).with_center(50);
        let xform = trigger_xform();

        assert_eq!(transform(50, &xform, Some(&cal)), 0);
        assert_eq!(transform(950, &xform, Some(&cal)), 255);
        let mid = transform(500, &xform, Some(&cal));
        assert!((127..=128).contains(&mid), "mid-travel was {mid}");
    }

    #[test]
    fn test_unidirectional_ignores_binding_deadzone() {
        let cal = AxisCalibration::new(0, 1000).with_center(0);
        let xform = trigger_xform().with_deadzone(50);
        // Low but nonzero travel must not quantize to zero.
        assert!(transform(40, &xform, Some(&cal)) > 0);
    }

    #[test]
    fn test_uncalibrated_identity_passthrough() {
        let xform = AxisTransform::default();
        for raw in [0, 100, 200, 32767, 65535] {
            assert_eq!(transform(raw, &xform, None), raw);
        }
    }

    #[test]
    fn test_uncalibrated_maps_full_span_onto_output_range() {
        let xform = stick_xform();
        assert_eq!(transform(0, &xform, None), -32768);
        assert_eq!(transform(65535, &xform, None), 32767);
        // Raw 100 sits 100 counts above the bottom of the assumed span.
        assert_eq!(transform(100, &xform, None), -32668);
    }

    #[test]
    fn test_uncalibrated_deadzone_is_subtractive() {
        let xform = stick_xform().with_deadzone(1000);
        // Mid-span maps near zero; small excursions collapse into the band.
        let mid = 65535 / 2;
        assert_eq!(transform(mid, &xform, None), 0);
        let out = transform(mid + 2000, &xform, None);
        assert!(out > 0 && out < 2000, "deadzone must shave the output, got {out}");
    }

    #[test]
    fn test_invert_reflects_about_midpoint() {
        let cal = AxisCalibration::new(0, 1000).with_center(500);
        let inverted = stick_xform().with_invert(true);

        assert_eq!(transform(0, &inverted, Some(&cal)), 32767);
        assert_eq!(transform(1000, &inverted, Some(&cal)), -32768);

        let tr = trigger_xform().with_invert(true);
        let tcal = AxisCalibration::new(0, 1000).with_center(0);
        assert_eq!(transform(0, &tr, Some(&tcal)), 255);
        assert_eq!(transform(1000, &tr, Some(&tcal)), 0);
    }

    #[test]
    fn test_out_of_travel_raw_clamps() {
        let cal = AxisCalibration::new(100, 900).with_center(500);
        let xform = stick_xform();
        assert_eq!(transform(-5000, &xform, Some(&cal)), -32768);
        assert_eq!(transform(5000, &xform, Some(&cal)), 32767);
    }

    #[test]
    fn test_scale_amplifies_then_clamps() {
        let cal = AxisCalibration::new(0, 1000).with_center(500);
        let xform = stick_xform().with_scale(2.0);
        // Half travel saturates with a 2x scale.
        assert_eq!(transform(1000, &xform, Some(&cal)), 32767);
        assert_eq!(transform(750, &xform, Some(&cal)), 32767);
        assert_eq!(transform(500, &xform, Some(&cal)), 0);
    }

    #[test]
    fn test_degenerate_calibration_span() {
        let cal = AxisCalibration {
            observed_min: 500,
            observed_max: 500,
            center: 500,
            deadzone_radius: 0,
        };
        let xform = trigger_xform();
        let out = transform(500, &xform, Some(&cal));
        assert!((0..=255).contains(&out));
    }
}
