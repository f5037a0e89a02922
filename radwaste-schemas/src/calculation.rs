use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity and density derived from one measurement, plus the projection to the target time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub activity_mbq_at_measurement: f64,
    pub activity_bq_at_measurement: f64,
    pub density_bq_per_gram: f64,
    pub activity_mbq_at_target: f64,
    pub activity_bq_at_target: f64,
    pub density_at_target: f64,
    /// Signed; negative when the target precedes the measurement.
    pub elapsed_hours: f64,
}

/// One row of the ten half-life forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfLifePrediction {
    /// 1-based count of elapsed half-lives.
    pub half_life_index: u32,
    /// `None` when the instant lies beyond the representable calendar range.
    pub predicted_at: Option<DateTime<Utc>>,
    pub activity_mbq: f64,
    pub activity_bq: f64,
    pub density_bq_per_gram: f64,
    /// µSv/hr at the distance the sample was measured from.
    pub exposure_rate_at_distance: f64,
    pub percent_remaining: f64,
}

/// Everything the engine produces for one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub result: CalculationResult,
    pub forecast: Vec<HalfLifePrediction>,
}
