//! Assembly of the immutable record stored for each successful calculation.

use chrono::{DateTime, Utc};
use radwaste_schemas::{
    calculation::Calculation,
    history::{HistoryRecord, IsotopeSnapshot, RecordId},
    isotope::IsotopeSpec,
    measurement::MeasurementInput,
};

pub const DEFAULT_SAMPLE_LABEL: &str = "Sample";

/// Next record id: the creation time in milliseconds, kept strictly above `newest`
/// so ids stay distinct when several records are created within one millisecond.
pub fn next_record_id(created_at: DateTime<Utc>, newest: Option<RecordId>) -> RecordId {
    let millis = created_at.timestamp_millis();
    match newest {
        Some(newest) if newest >= millis => newest + 1,
        _ => millis,
    }
}

/// Builds the history entry for one calculation. A blank `sample_label` falls back to `default_label`.
#[allow(clippy::too_many_arguments)]
pub fn assemble_record(
    id: RecordId,
    created_by: &str,
    created_at: DateTime<Utc>,
    sample_label: Option<&str>,
    default_label: &str,
    isotope: &IsotopeSpec,
    input: &MeasurementInput,
    calculation: &Calculation,
) -> HistoryRecord {
    let sample_label = sample_label
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or(default_label)
        .to_string();

    HistoryRecord {
        id,
        created_at,
        created_by: created_by.to_string(),
        sample_label,
        isotope: IsotopeSnapshot {
            isotope_id: isotope.isotope_id.clone(),
            display_name: isotope.display_name.clone(),
            half_life_hours: isotope.half_life_hours,
        },
        input: input.clone(),
        result: calculation.result.clone(),
        forecast: calculation.forecast.clone(),
    }
}
