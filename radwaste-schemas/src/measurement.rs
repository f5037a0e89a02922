use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single dose-rate measurement of a waste sample, ready for the engine.
///
/// `gamma_constant`, `distance_m`, `dose_rate` and `mass_g` must be finite and
/// strictly positive. `target_at` may precede `measured_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementInput {
    pub isotope_id: String,
    /// µSv·m²·MBq⁻¹·hr⁻¹
    pub gamma_constant: f64,
    pub distance_m: f64,
    /// µSv/hr
    pub dose_rate: f64,
    pub mass_g: f64,
    pub measured_at: DateTime<Utc>,
    pub target_at: DateTime<Utc>,
}

/// The input fields a measurement can be rejected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementField {
    IsotopeId,
    GammaConstant,
    DistanceM,
    DoseRate,
    MassG,
    MeasuredAt,
    TargetAt,
    HalfLifeHours,
}

impl MeasurementField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementField::IsotopeId => "isotope_id",
            MeasurementField::GammaConstant => "gamma_constant",
            MeasurementField::DistanceM => "distance_m",
            MeasurementField::DoseRate => "dose_rate",
            MeasurementField::MassG => "mass_g",
            MeasurementField::MeasuredAt => "measured_at",
            MeasurementField::TargetAt => "target_at",
            MeasurementField::HalfLifeHours => "half_life_hours",
        }
    }
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
