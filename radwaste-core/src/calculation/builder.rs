use crate::error::{Problem, RadwasteError, ValidationErrors};
use chrono::{DateTime, Utc};
use radwaste_schemas::{
    isotope::IsotopeSpec,
    measurement::{MeasurementField, MeasurementInput},
};

/// A fluent builder for assembling a validated `MeasurementInput`.
///
/// Fields may be supplied in any order; `build` reports every missing or invalid
/// field at once rather than stopping at the first.
#[derive(Debug, Default, Clone)]
pub struct MeasurementBuilder {
    isotope_id: Option<String>,
    isotope_gamma: Option<f64>,
    gamma_constant: Option<f64>,
    distance_m: Option<f64>,
    dose_rate: Option<f64>,
    mass_g: Option<f64>,
    measured_at: Option<DateTime<Utc>>,
    target_at: Option<DateTime<Utc>>,
}

impl MeasurementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the isotope. Its gamma constant is used unless one is set explicitly.
    pub fn with_isotope(mut self, isotope: &IsotopeSpec) -> Self {
        self.isotope_id = Some(isotope.isotope_id.clone());
        self.isotope_gamma = Some(isotope.gamma_constant);
        self
    }

    /// Selects the isotope by id only, leaving the gamma constant to the caller.
    pub fn with_isotope_id(mut self, isotope_id: &str) -> Self {
        self.isotope_id = Some(isotope_id.to_string());
        self.isotope_gamma = None;
        self
    }

    /// Overrides the isotope's catalogue gamma constant (µSv·m²·MBq⁻¹·hr⁻¹).
    pub fn with_gamma_constant(mut self, gamma_constant: f64) -> Self {
        self.gamma_constant = Some(gamma_constant);
        self
    }

    pub fn with_distance_m(mut self, distance_m: f64) -> Self {
        self.distance_m = Some(distance_m);
        self
    }

    /// Measured dose rate in µSv/hr.
    pub fn with_dose_rate(mut self, dose_rate: f64) -> Self {
        self.dose_rate = Some(dose_rate);
        self
    }

    pub fn with_mass_g(mut self, mass_g: f64) -> Self {
        self.mass_g = Some(mass_g);
        self
    }

    pub fn measured_at(mut self, at: DateTime<Utc>) -> Self {
        self.measured_at = Some(at);
        self
    }

    pub fn target_at(mut self, at: DateTime<Utc>) -> Self {
        self.target_at = Some(at);
        self
    }

    /// Consumes the builder and returns the measurement.
    ///
    /// # Errors
    ///
    /// Returns `RadwasteError::Validation` listing every field that is missing,
    /// non-finite or not strictly positive.
    pub fn build(self) -> Result<MeasurementInput, RadwasteError> {
        let mut errors = ValidationErrors::new();
        let gamma_constant = self.gamma_constant.or(self.isotope_gamma);

        let isotope_id = self.isotope_id.filter(|id| !id.trim().is_empty());
        if isotope_id.is_none() {
            errors.push(MeasurementField::IsotopeId, Problem::Missing);
        }
        errors.check_positive(MeasurementField::GammaConstant, gamma_constant);
        errors.check_positive(MeasurementField::DistanceM, self.distance_m);
        errors.check_positive(MeasurementField::DoseRate, self.dose_rate);
        errors.check_positive(MeasurementField::MassG, self.mass_g);
        if self.measured_at.is_none() {
            errors.push(MeasurementField::MeasuredAt, Problem::Missing);
        }
        if self.target_at.is_none() {
            errors.push(MeasurementField::TargetAt, Problem::Missing);
        }

        match (
            isotope_id,
            gamma_constant,
            self.distance_m,
            self.dose_rate,
            self.mass_g,
            self.measured_at,
            self.target_at,
        ) {
            (
                Some(isotope_id),
                Some(gamma_constant),
                Some(distance_m),
                Some(dose_rate),
                Some(mass_g),
                Some(measured_at),
                Some(target_at),
            ) if errors.is_empty() => Ok(MeasurementInput {
                isotope_id,
                gamma_constant,
                distance_m,
                dose_rate,
                mass_g,
                measured_at,
                target_at,
            }),
            _ => Err(RadwasteError::Validation(errors)),
        }
    }
}
