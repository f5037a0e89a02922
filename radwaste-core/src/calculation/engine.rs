//! Closed-form decay and exposure formulas.
//!
//! Every function here is pure: results depend only on the arguments, so the
//! engine can be called from any number of threads without coordination.

use crate::{
    error::{Problem, RadwasteError, ValidationErrors},
    reference::IsotopeTable,
};
use chrono::{DateTime, Duration, Utc};
use radwaste_schemas::{
    calculation::{Calculation, CalculationResult, HalfLifePrediction},
    measurement::{MeasurementField, MeasurementInput},
};
use std::f64::consts::LN_2;

pub const BQ_PER_MBQ: f64 = 1.0e6;
pub const FORECAST_HALF_LIVES: u32 = 10;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

fn ensure_finite(value: f64, quantity: &'static str) -> Result<f64, RadwasteError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RadwasteError::NonFiniteValue(quantity))
    }
}

/// `initial_activity * exp(-ln 2 / half_life_hours * elapsed_hours)`.
///
/// Negative `elapsed_hours` projects backwards in time.
pub fn decayed_activity(
    initial_activity: f64,
    half_life_hours: f64,
    elapsed_hours: f64,
) -> Result<f64, RadwasteError> {
    if !half_life_hours.is_finite() || half_life_hours <= 0.0 {
        return Err(RadwasteError::InvalidHalfLife(half_life_hours));
    }
    ensure_finite(initial_activity, "initial activity")?;
    ensure_finite(elapsed_hours, "elapsed time")?;

    let decay_constant = LN_2 / half_life_hours;
    ensure_finite(initial_activity * (-decay_constant * elapsed_hours).exp(), "decayed activity")
}

/// Dose rate in µSv/hr at `distance_m` from a point source of `activity_mbq`.
pub fn exposure_rate(activity_mbq: f64, gamma_constant: f64, distance_m: f64) -> Result<f64, RadwasteError> {
    if !distance_m.is_finite() || distance_m <= 0.0 {
        return Err(RadwasteError::InvalidDistance(distance_m));
    }
    ensure_finite(activity_mbq, "activity")?;
    ensure_finite(gamma_constant, "gamma constant")?;

    ensure_finite(activity_mbq * gamma_constant / distance_m.powi(2), "exposure rate")
}

/// Inverse of [`exposure_rate`]: the activity in MBq that explains `dose_rate` at `distance_m`.
pub fn derive_activity_from_dose(dose_rate: f64, distance_m: f64, gamma_constant: f64) -> Result<f64, RadwasteError> {
    if !gamma_constant.is_finite() || gamma_constant <= 0.0 {
        return Err(RadwasteError::InvalidGammaConstant(gamma_constant));
    }
    ensure_finite(dose_rate, "dose rate")?;
    ensure_finite(distance_m, "distance")?;

    ensure_finite(dose_rate * distance_m.powi(2) / gamma_constant, "activity")
}

/// Exact fraction of the initial activity left after `half_life_index` half-lives, in percent.
pub fn percent_remaining(half_life_index: u32) -> f64 {
    100.0 / 2f64.powi(half_life_index as i32)
}

/// Signed hours from `from` to `to`, at millisecond resolution.
pub fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

fn offset_by_hours(start: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    start.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// Rejects a measurement with any non-positive, non-finite or blank field.
pub fn validate(input: &MeasurementInput) -> Result<(), RadwasteError> {
    let mut errors = ValidationErrors::new();
    if input.isotope_id.trim().is_empty() {
        errors.push(MeasurementField::IsotopeId, Problem::Missing);
    }
    errors.check_positive(MeasurementField::GammaConstant, Some(input.gamma_constant));
    errors.check_positive(MeasurementField::DistanceM, Some(input.distance_m));
    errors.check_positive(MeasurementField::DoseRate, Some(input.dose_rate));
    errors.check_positive(MeasurementField::MassG, Some(input.mass_g));
    errors.into_result()
}

/// Converts one measurement into activity, density, the target-time projection and
/// the ten half-life forecast.
///
/// # Errors
///
/// `Validation` when any numeric field is not strictly positive, `UnknownIsotope` when
/// the isotope is not in `table`, and the formula errors for degenerate catalogue data.
pub fn compute_result(input: &MeasurementInput, table: &IsotopeTable) -> Result<Calculation, RadwasteError> {
    validate(input)?;

    let activity_mbq = derive_activity_from_dose(input.dose_rate, input.distance_m, input.gamma_constant)?;
    let activity_bq = activity_mbq * BQ_PER_MBQ;
    let density = ensure_finite(activity_bq / input.mass_g, "density")?;

    let elapsed = elapsed_hours(input.measured_at, input.target_at);

    let isotope = table.lookup(&input.isotope_id)?;
    let half_life = isotope.half_life_hours;

    let target_activity_mbq = decayed_activity(activity_mbq, half_life, elapsed)?;
    let target_activity_bq = target_activity_mbq * BQ_PER_MBQ;
    let target_density = ensure_finite(target_activity_bq / input.mass_g, "target density")?;

    let mut forecast = Vec::with_capacity(FORECAST_HALF_LIVES as usize);
    for i in 1..=FORECAST_HALF_LIVES {
        let hours = half_life * f64::from(i);
        let activity_i = decayed_activity(activity_mbq, half_life, hours)?;
        let activity_i_bq = activity_i * BQ_PER_MBQ;
        let predicted_at = offset_by_hours(input.measured_at, hours);
        if predicted_at.is_none() {
            log::warn!("Forecast time for half-life {} of {} is out of range", i, isotope.display_name);
        }
        forecast.push(HalfLifePrediction {
            half_life_index: i,
            predicted_at,
            activity_mbq: activity_i,
            activity_bq: activity_i_bq,
            density_bq_per_gram: activity_i_bq / input.mass_g,
            exposure_rate_at_distance: exposure_rate(activity_i, input.gamma_constant, input.distance_m)?,
            percent_remaining: percent_remaining(i),
        });
    }

    log::debug!(
        "Computed {} sample: {:.4e} MBq at measurement, {:.4e} MBq after {:.3} h",
        isotope.display_name,
        activity_mbq,
        target_activity_mbq,
        elapsed
    );

    Ok(Calculation {
        result: CalculationResult {
            activity_mbq_at_measurement: activity_mbq,
            activity_bq_at_measurement: activity_bq,
            density_bq_per_gram: density,
            activity_mbq_at_target: target_activity_mbq,
            activity_bq_at_target: target_activity_bq,
            density_at_target: target_density,
            elapsed_hours: elapsed,
        },
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use radwaste_schemas::isotope::IsotopeSpec;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1e-300)
    }

    fn f18_input(target_offset_ms: i64) -> MeasurementInput {
        let measured_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        MeasurementInput {
            isotope_id: "f18".to_string(),
            gamma_constant: 0.188,
            distance_m: 0.3,
            dose_rate: 0.08,
            mass_g: 1000.0,
            measured_at,
            target_at: measured_at + Duration::milliseconds(target_offset_ms),
        }
    }

    #[test]
    fn zero_elapsed_returns_initial_activity_exactly() {
        assert_eq!(decayed_activity(123.456, 6.0, 0.0).unwrap(), 123.456);
    }

    #[test]
    fn back_projection_doubles_activity() {
        let a = decayed_activity(10.0, 6.0, -6.0).unwrap();
        assert!(close(a, 20.0), "got {a}");
    }

    #[test]
    fn non_positive_half_life_is_rejected() {
        assert!(matches!(decayed_activity(1.0, 0.0, 1.0), Err(RadwasteError::InvalidHalfLife(h)) if h == 0.0));
        assert!(matches!(decayed_activity(1.0, -3.0, 1.0), Err(RadwasteError::InvalidHalfLife(_))));
        assert!(matches!(decayed_activity(1.0, f64::NAN, 1.0), Err(RadwasteError::InvalidHalfLife(_))));
    }

    #[test]
    fn overflowing_back_projection_is_rejected() {
        let result = decayed_activity(1.0, 0.001, -1.0e6);
        assert!(matches!(result, Err(RadwasteError::NonFiniteValue(_))));
    }

    #[test]
    fn non_positive_distance_is_rejected() {
        assert!(matches!(exposure_rate(1.0, 0.188, 0.0), Err(RadwasteError::InvalidDistance(_))));
        assert!(matches!(exposure_rate(1.0, 0.188, -1.0), Err(RadwasteError::InvalidDistance(_))));
    }

    #[test]
    fn non_positive_gamma_is_rejected() {
        assert!(matches!(
            derive_activity_from_dose(0.08, 0.3, 0.0),
            Err(RadwasteError::InvalidGammaConstant(_))
        ));
    }

    #[test]
    fn percent_remaining_is_exact() {
        assert_eq!(percent_remaining(1), 50.0);
        assert_eq!(percent_remaining(10), 0.09765625);
    }

    #[test]
    fn elapsed_hours_is_signed() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(elapsed_hours(a, b), 1.5);
        assert_eq!(elapsed_hours(b, a), -1.5);
    }

    #[test]
    fn f18_example_without_elapsed_time() {
        let calc = compute_result(&f18_input(0), &IsotopeTable::builtin()).unwrap();
        let r = &calc.result;
        assert!(close(r.activity_mbq_at_measurement, 0.08 * 0.09 / 0.188));
        assert!((r.activity_mbq_at_measurement - 0.03830).abs() < 1e-5);
        assert!((r.density_bq_per_gram - 38.30).abs() < 0.01);
        assert_eq!(r.elapsed_hours, 0.0);
        assert_eq!(r.activity_mbq_at_target, r.activity_mbq_at_measurement);
        assert_eq!(r.density_at_target, r.density_bq_per_gram);
    }

    #[test]
    fn f18_example_after_one_half_life() {
        let calc = compute_result(&f18_input(6_588_000), &IsotopeTable::builtin()).unwrap();
        let r = &calc.result;
        assert!(close(r.elapsed_hours, 1.83));
        assert!((r.activity_mbq_at_target - 0.01915).abs() < 1e-5);
        assert!(close(r.activity_mbq_at_target, r.activity_mbq_at_measurement / 2.0));
        assert!(close(r.activity_bq_at_target, r.activity_mbq_at_target * 1e6));
    }

    #[test]
    fn target_before_measurement_projects_backwards() {
        let calc = compute_result(&f18_input(-6_588_000), &IsotopeTable::builtin()).unwrap();
        let r = &calc.result;
        assert!(r.elapsed_hours < 0.0);
        assert!(close(r.activity_mbq_at_target, r.activity_mbq_at_measurement * 2.0));
    }

    #[test]
    fn forecast_has_ten_rows_on_half_life_grid() {
        let input = f18_input(0);
        let calc = compute_result(&input, &IsotopeTable::builtin()).unwrap();
        assert_eq!(calc.forecast.len(), 10);
        let a0 = calc.result.activity_mbq_at_measurement;
        for (n, row) in calc.forecast.iter().enumerate() {
            let i = n as u32 + 1;
            assert_eq!(row.half_life_index, i);
            assert_eq!(row.percent_remaining, 100.0 / 2f64.powi(i as i32));
            assert!(close(row.activity_mbq, a0 / 2f64.powi(i as i32)));
            assert!(close(row.activity_bq, row.activity_mbq * 1e6));
            assert!(close(row.density_bq_per_gram, row.activity_bq / 1000.0));
            assert!(close(row.exposure_rate_at_distance, row.activity_mbq * 0.188 / 0.09));
            let expected_ms = (1.83 * f64::from(i) * 3_600_000.0).round() as i64;
            let predicted_at = row.predicted_at.unwrap();
            assert_eq!((predicted_at - input.measured_at).num_milliseconds(), expected_ms);
        }
        // First forecast row reproduces the measured dose rate halved.
        assert!(close(calc.forecast[0].exposure_rate_at_distance, 0.04));
    }

    #[test]
    fn unrepresentable_forecast_times_keep_the_results() {
        let mut table = IsotopeTable::builtin();
        table
            .extend(vec![IsotopeSpec::new("u238x", "U-238x", 0.01, 4.0e8)])
            .unwrap();
        let mut input = f18_input(0);
        input.isotope_id = "u238x".to_string();
        input.gamma_constant = 0.01;

        let calc = compute_result(&input, &table).unwrap();
        assert!(close(calc.result.activity_mbq_at_measurement, 0.08 * 0.09 / 0.01));
        assert_eq!(calc.forecast.len(), 10);
        assert!(calc.forecast[0].predicted_at.is_some());
        assert!(calc.forecast[9].predicted_at.is_none());
        assert!(close(calc.forecast[9].activity_mbq, calc.result.activity_mbq_at_measurement / 1024.0));
    }

    #[test]
    fn all_invalid_fields_are_reported_together() {
        let mut input = f18_input(0);
        input.dose_rate = -1.0;
        input.distance_m = 0.0;
        input.gamma_constant = f64::NAN;
        input.mass_g = 0.0;
        match compute_result(&input, &IsotopeTable::builtin()) {
            Err(RadwasteError::Validation(errors)) => {
                assert_eq!(
                    errors.fields(),
                    vec![
                        MeasurementField::GammaConstant,
                        MeasurementField::DistanceM,
                        MeasurementField::DoseRate,
                        MeasurementField::MassG,
                    ]
                );
                assert_eq!(errors.violations()[0].problem, crate::error::Problem::NotFinite);
                assert_eq!(errors.violations()[1].problem, crate::error::Problem::NotPositive);
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn unknown_isotope_is_reported_after_validation() {
        let mut input = f18_input(0);
        input.isotope_id = "xx99".to_string();
        assert!(matches!(
            compute_result(&input, &IsotopeTable::builtin()),
            Err(RadwasteError::UnknownIsotope(id)) if id == "xx99"
        ));
    }

    proptest! {
        #[test]
        fn one_half_life_halves_activity(a in 1e-6f64..1e9, h in 1e-3f64..1e5) {
            let decayed = decayed_activity(a, h, h).unwrap();
            prop_assert!(close(decayed, a / 2.0), "{} vs {}", decayed, a / 2.0);
        }

        #[test]
        fn integer_half_lives_follow_powers_of_two(a in 1e-6f64..1e9, h in 1e-3f64..1e5, i in 1u32..=10) {
            let decayed = decayed_activity(a, h, f64::from(i) * h).unwrap();
            prop_assert!(close(decayed, a / 2f64.powi(i as i32)));
        }

        #[test]
        fn zero_elapsed_is_identity(a in 1e-6f64..1e9, h in 1e-3f64..1e5) {
            prop_assert_eq!(decayed_activity(a, h, 0.0).unwrap(), a);
        }

        #[test]
        fn one_half_life_earlier_doubles_activity(a in 1e-6f64..1e9, h in 1e-3f64..1e5) {
            prop_assert!(close(decayed_activity(a, h, -h).unwrap(), 2.0 * a));
        }

        #[test]
        fn dose_inversion_recovers_activity(a in 1e-6f64..1e6, g in 1e-4f64..10.0, d in 1e-2f64..100.0) {
            let dose = exposure_rate(a, g, d).unwrap();
            let recovered = derive_activity_from_dose(dose, d, g).unwrap();
            prop_assert!(close(recovered, a), "{} vs {}", recovered, a);
        }

        #[test]
        fn percent_remaining_ignores_input_magnitude(dose in 1e-6f64..1e6, mass in 1e-3f64..1e6) {
            let mut input = f18_input(0);
            input.dose_rate = dose;
            input.mass_g = mass;
            let calc = compute_result(&input, &IsotopeTable::builtin()).unwrap();
            for row in &calc.forecast {
                prop_assert_eq!(row.percent_remaining, percent_remaining(row.half_life_index));
            }
        }

        #[test]
        fn non_positive_mass_never_yields_nan(mass in -1e6f64..=0.0) {
            let mut input = f18_input(0);
            input.mass_g = mass;
            match compute_result(&input, &IsotopeTable::builtin()) {
                Err(RadwasteError::Validation(errors)) => {
                    prop_assert_eq!(errors.fields(), vec![MeasurementField::MassG]);
                }
                other => prop_assert!(false, "expected Validation, got {:?}", other),
            }
        }
    }
}
