use crate::dps::{DpId, DpValue};
use crate::ha::values::{DeviceClass, StateClass};
use log::warn;

/// Number of decimal places kept after scaling.
pub const DEFAULT_PRECISION: i32 = 2;

/// Forward energy total, reverse energy total and active energy total.
const ENERGY_TOTAL_DPS: [DpId; 3] = [1, 23, 24];

/// Computes the value shown for a reading.
///
/// Numeric readings are multiplied by `scale` and rounded to [`DEFAULT_PRECISION`]
/// decimal places. Anything else, any reading without a scale, or a product that
/// is not representable passes through.
pub fn compute_display(raw: &DpValue, scale: Option<f64>) -> DpValue {
    let (Some(scale), Some(value)) = (scale, raw.as_f64()) else {
        return raw.clone();
    };
    let display = round_to(value * scale, DEFAULT_PRECISION);
    if !display.is_finite() {
        warn!("Scaling {value} by {scale} overflows, keeping the raw value");
        return raw.clone();
    }
    DpValue::Float(display)
}

/// Rounds half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn classify(device_class: Option<DeviceClass>, dp_id: DpId) -> Option<StateClass> {
    if device_class == Some(DeviceClass::Energy) || ENERGY_TOTAL_DPS.contains(&dp_id) {
        Some(StateClass::TotalIncreasing)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, compute_display, round_to};
    use crate::dps::DpValue;
    use crate::ha::values::{DeviceClass, StateClass};
    use proptest::prelude::*;

    #[test]
    fn test_compute_display() {
        let testcases = &[
            (DpValue::Int(100), Some(0.1), DpValue::Float(10.0)),
            (DpValue::Float(123.456), Some(1.0), DpValue::Float(123.46)),
            (DpValue::Int(2_305), Some(0.01), DpValue::Float(23.05)),
            (DpValue::Int(-15), Some(-2.0), DpValue::Float(30.0)),
            (DpValue::Int(100), None, DpValue::Int(100)),
            (DpValue::Float(0.333), None, DpValue::Float(0.333)),
            (
                DpValue::String("open".to_owned()),
                Some(0.1),
                DpValue::String("open".to_owned()),
            ),
            (DpValue::Bool(true), Some(10.0), DpValue::Bool(true)),
            (DpValue::Float(1e308), Some(1e6), DpValue::Float(1e308)),
            (DpValue::Float(-1e307), Some(1e3), DpValue::Float(-1e307)),
        ];
        for (raw, scale, expected) in testcases {
            assert_eq!(compute_display(raw, *scale), *expected, "{raw:?} * {scale:?}");
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
        assert_eq!(round_to(1234.5, 0), 1235.0);
    }

    #[test]
    fn test_classify() {
        let energy = Some(StateClass::TotalIncreasing);
        assert_eq!(classify(Some(DeviceClass::Energy), 5), energy);
        assert_eq!(classify(Some(DeviceClass::Energy), 1), energy);
        assert_eq!(classify(None, 1), energy);
        assert_eq!(classify(None, 23), energy);
        assert_eq!(classify(None, 24), energy);
        assert_eq!(classify(Some(DeviceClass::Power), 24), energy);
        assert_eq!(classify(None, 5), None);
        assert_eq!(classify(Some(DeviceClass::Voltage), 20), None);
    }

    proptest! {
        #[test]
        fn scaled_numbers_are_rounded(raw in -1e6f64..1e6, scale in -1e6f64..1e6) {
            let expected = DpValue::Float(round_to(raw * scale, 2));
            prop_assert_eq!(compute_display(&DpValue::Float(raw), Some(scale)), expected);
        }

        #[test]
        fn scaled_integers_match_floats(raw in -1_000_000i64..1_000_000, scale in -1e6f64..1e6) {
            prop_assert_eq!(
                compute_display(&DpValue::Int(raw), Some(scale)),
                compute_display(&DpValue::Float(raw as f64), Some(scale)),
            );
        }

        #[test]
        fn text_is_never_scaled(raw in "\\PC*", scale in proptest::option::of(-1e6f64..1e6)) {
            let raw = DpValue::String(raw);
            prop_assert_eq!(compute_display(&raw, scale), raw);
        }

        #[test]
        fn booleans_are_never_scaled(raw in any::<bool>(), scale in proptest::option::of(-1e6f64..1e6)) {
            let raw = DpValue::Bool(raw);
            prop_assert_eq!(compute_display(&raw, scale), raw);
        }

        #[test]
        fn unscaled_numbers_pass_through(raw in any::<i64>()) {
            prop_assert_eq!(compute_display(&DpValue::Int(raw), None), DpValue::Int(raw));
        }

        #[test]
        fn energy_class_always_total_increasing(dp_id in any::<u32>()) {
            prop_assert_eq!(
                classify(Some(DeviceClass::Energy), dp_id),
                Some(StateClass::TotalIncreasing),
            );
        }
    }
}
