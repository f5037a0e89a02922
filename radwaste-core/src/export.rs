//! CSV rendering of calculation history.

use crate::error::RadwasteError;
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use radwaste_schemas::{calculation::HalfLifePrediction, history::HistoryRecord};
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M";
pub const FORECAST_TITLE: &str = "10 Half-Life Forecast:";
/// Written in place of a forecast time that cannot be represented.
pub const NOT_AVAILABLE: &str = "N/A";

const RECORD_HEADER: [&str; 14] = [
    "Timestamp",
    "Username",
    "Sample",
    "Isotope",
    "Gamma",
    "Distance (m)",
    "Dose Rate (µSv/hr)",
    "Mass (g)",
    "Measured At",
    "Target At",
    "Initial Activity (MBq)",
    "Initial Density (Bq/g)",
    "Target Activity (MBq)",
    "Target Density (Bq/g)",
];

const FORECAST_HEADER: [&str; 7] = [
    "Half-Life #",
    "Time",
    "Activity (MBq)",
    "Activity (Bq)",
    "Density (Bq/g)",
    "Dose Rate (µSv/hr)",
    "% Remaining",
];

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Emit the ten-row forecast sub-table after each record.
    pub include_forecast: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { include_forecast: true }
    }
}

/// Scientific notation with `digits` decimals and an explicitly signed exponent, e.g. `3.83e-2`, `1.20e+4`.
/// Exact decimal ties round away from zero (`1.125` gives `1.13e+0`).
pub fn to_exponential(value: f64, digits: usize) -> String {
    let exact = format!("{:.1100e}", value);
    let mantissa_fraction = exact
        .split_once('.')
        .and_then(|(_, rest)| rest.split_once('e'))
        .map_or("", |(fraction, _)| fraction);
    let value = round_ties_away_from_zero(value, mantissa_fraction, digits);

    let formatted = format!("{:.*e}", digits, value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
        _ => formatted,
    }
}

/// Fixed-point with `digits` decimals. Exact decimal ties round away from zero (`0.78125` gives `0.7813`).
pub fn to_fixed(value: f64, digits: usize) -> String {
    // 1074 fractional digits hold any f64 exactly.
    let exact = format!("{:.1074}", value);
    let fraction = exact.split_once('.').map_or("", |(_, fraction)| fraction);
    let value = round_ties_away_from_zero(value, fraction, digits);
    format!("{:.*}", digits, value)
}

/// `std` formatting breaks exact ties to even. When the exact digits after position `digits`
/// are `5000...`, step `value` one ulp away from zero so the tie rounds outward.
fn round_ties_away_from_zero(value: f64, exact_fraction: &str, digits: usize) -> f64 {
    let mut rest = exact_fraction.bytes().skip(digits);
    let is_tie = rest.next() == Some(b'5') && rest.all(|b| b == b'0');
    if is_tie && value.is_finite() && value != 0.0 {
        f64::from_bits(value.to_bits() + 1)
    } else {
        value
    }
}

pub fn format_datetime(at: &DateTime<Utc>) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

/// Text columns are always quoted, with embedded quotes doubled. Numeric columns are written bare.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Writes `records`, in the given order, as CSV to `out`.
pub fn export_history<W: io::Write>(
    records: &[HistoryRecord],
    out: W,
    options: ExportOptions,
) -> Result<(), RadwasteError> {
    write_history(records, out, options, "<writer>")
}

pub fn export_history_to_string(records: &[HistoryRecord], options: ExportOptions) -> Result<String, RadwasteError> {
    let mut buffer = Vec::new();
    export_history(records, &mut buffer, options)?;
    // Every field is built from UTF-8 strings.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn export_history_to_path<P: AsRef<Path>>(
    records: &[HistoryRecord],
    path: P,
    options: ExportOptions,
) -> Result<(), RadwasteError> {
    let path_str = path.as_ref().display().to_string();
    let file = fs::File::create(path.as_ref()).map_err(|e| RadwasteError::FileIO(path_str.clone(), e))?;
    write_history(records, io::BufWriter::new(file), options, &path_str)?;
    log::info!("Exported {} records to '{}'", records.len(), path_str);
    Ok(())
}

fn write_history<W: io::Write>(
    records: &[HistoryRecord],
    mut out: W,
    options: ExportOptions,
    destination: &str,
) -> Result<(), RadwasteError> {
    let io_err = |e: io::Error| RadwasteError::FileIO(destination.to_string(), e);

    write_section(&mut out, [RECORD_HEADER], destination)?;

    for record in records {
        write_section(&mut out, [record_row(record)], destination)?;

        if options.include_forecast && !record.forecast.is_empty() {
            writeln!(out).map_err(io_err)?;
            writeln!(out, "{}", FORECAST_TITLE).map_err(io_err)?;
            write_section(&mut out, [FORECAST_HEADER.map(String::from)], destination)?;
            write_section(&mut out, record.forecast.iter().map(forecast_row), destination)?;
            writeln!(out).map_err(io_err)?;
        }
    }

    out.flush().map_err(io_err)
}

/// Writes `rows` through a short-lived CSV writer and flushes it, leaving `out` free for raw lines.
fn write_section<W, R, T>(out: &mut W, rows: impl IntoIterator<Item = R>, destination: &str) -> Result<(), RadwasteError>
where
    W: io::Write,
    R: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| RadwasteError::CsvError(destination.to_string(), e))?;
    }
    writer
        .flush()
        .map_err(|e| RadwasteError::FileIO(destination.to_string(), e))
}

fn record_row(record: &HistoryRecord) -> [String; 14] {
    [
        quoted(&record.created_at.format(TIMESTAMP_FORMAT).to_string()),
        quoted(&record.created_by),
        quoted(&record.sample_label),
        quoted(&record.isotope.display_name),
        record.input.gamma_constant.to_string(),
        record.input.distance_m.to_string(),
        record.input.dose_rate.to_string(),
        record.input.mass_g.to_string(),
        quoted(&format_datetime(&record.input.measured_at)),
        quoted(&format_datetime(&record.input.target_at)),
        to_exponential(record.result.activity_mbq_at_measurement, 2),
        to_fixed(record.result.density_bq_per_gram, 4),
        to_exponential(record.result.activity_mbq_at_target, 2),
        to_fixed(record.result.density_at_target, 4),
    ]
}

fn forecast_row(row: &HalfLifePrediction) -> [String; 7] {
    let predicted_at = row
        .predicted_at
        .as_ref()
        .map_or_else(|| NOT_AVAILABLE.to_string(), format_datetime);
    [
        row.half_life_index.to_string(),
        quoted(&predicted_at),
        to_exponential(row.activity_mbq, 2),
        to_exponential(row.activity_bq, 2),
        to_fixed(row.density_bq_per_gram, 4),
        to_fixed(row.exposure_rate_at_distance, 6),
        format!("{}%", to_fixed(row.percent_remaining, 4)),
    ]
}
