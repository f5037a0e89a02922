use crate::{
    calculation::{CalculationResult, HalfLifePrediction},
    measurement::MeasurementInput,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a stored calculation, derived from its creation time in milliseconds.
pub type RecordId = i64;

/// The isotope data as it was when the record was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotopeSnapshot {
    pub isotope_id: String,
    pub display_name: String,
    pub half_life_hours: f64,
}

/// An append-only log entry for one successful calculation.
///
/// Records are never edited after creation. Copies held in the personal and the
/// shared list are independent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub sample_label: String,
    pub isotope: IsotopeSnapshot,
    pub input: MeasurementInput,
    pub result: CalculationResult,
    pub forecast: Vec<HalfLifePrediction>,
}
