use serde::{Deserialize, Serialize};

/// Reference data for a single gamma-emitting isotope.
///
/// Entries are looked up by `isotope_id` and never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotopeSpec {
    /// A short, machine-readable identifier (e.g., "f18").
    pub isotope_id: String,
    /// A human-readable name for reports (e.g., "F-18").
    pub display_name: String,
    /// Dose-rate conversion factor in µSv·m²·MBq⁻¹·hr⁻¹.
    pub gamma_constant: f64,
    /// Physical half-life in hours.
    pub half_life_hours: f64,
}

impl IsotopeSpec {
    pub fn new(isotope_id: &str, display_name: &str, gamma_constant: f64, half_life_hours: f64) -> Self {
        Self {
            isotope_id: isotope_id.to_string(),
            display_name: display_name.to_string(),
            gamma_constant,
            half_life_hours,
        }
    }
}
