use crate::config::AppConfig;
use crate::plotting;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use radwaste_core::{
    compute_result,
    export::{self, format_datetime, to_exponential, to_fixed, ExportOptions},
    history::assemble_record,
    storage::{HistoryRepository, KeyValueStore},
    IsotopeTable, MeasurementBuilder,
};
use radwaste_schemas::{
    history::{HistoryRecord, RecordId},
    isotope::IsotopeSpec,
};
use std::path::{Path, PathBuf};

/// Everything the user supplied for one calculation, before validation.
#[derive(Debug, Clone)]
pub struct CalculationRequest {
    pub username: String,
    pub isotope_id: String,
    pub gamma_constant: Option<f64>,
    pub distance_m: f64,
    pub dose_rate: f64,
    pub mass_g: f64,
    pub measured_at: DateTime<Utc>,
    pub target_at: DateTime<Utc>,
    pub sample_label: Option<String>,
    pub plot_path: Option<PathBuf>,
    pub save: bool,
}

/// Which history list an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    Personal,
    Shared,
}

pub fn list_isotopes(table: &IsotopeTable) {
    println!("\n--- Isotope Reference Table ---");
    println!("{:<8} {:<10} {:>22} {:>16}", "ID", "Isotope", "Gamma (µSv·m²/MBq·h)", "Half-life (h)");
    for spec in table.iter() {
        println!(
            "{:<8} {:<10} {:>22} {:>16}",
            spec.isotope_id, spec.display_name, spec.gamma_constant, spec.half_life_hours
        );
    }
}

/// Runs the engine for one request, prints the report and stores the record in both history lists.
pub fn run_calculation<S: KeyValueStore>(
    request: &CalculationRequest,
    config: &AppConfig,
    table: &IsotopeTable,
    repo: &mut HistoryRepository<S>,
) -> Result<HistoryRecord> {
    // An unknown isotope surfaces from the engine, after field validation.
    let mut builder = match table.lookup(&request.isotope_id) {
        Ok(isotope) => MeasurementBuilder::new().with_isotope(isotope),
        Err(_) => MeasurementBuilder::new().with_isotope_id(&request.isotope_id),
    }
    .with_distance_m(request.distance_m)
    .with_dose_rate(request.dose_rate)
    .with_mass_g(request.mass_g)
    .measured_at(request.measured_at)
    .target_at(request.target_at);
    if let Some(gamma) = request.gamma_constant {
        builder = builder.with_gamma_constant(gamma);
    }
    let input = builder.build()?;
    let calculation = compute_result(&input, table)?;
    let isotope = table.lookup(&input.isotope_id)?;

    let created_at = Utc::now();
    let id = repo.next_id(&request.username, created_at)?;
    let record = assemble_record(
        id,
        &request.username,
        created_at,
        request.sample_label.as_deref(),
        &config.default_sample_label,
        isotope,
        &input,
        &calculation,
    );

    print_result(&record, isotope);

    if request.save {
        repo.record(record.clone())?;
        println!("\nSaved record {} to personal and shared history.", record.id);
    } else {
        log::info!("Record {} not saved (--no-save)", record.id);
    }

    // The chart is a by-product; the record stands even when it cannot be drawn.
    if let Some(path) = &request.plot_path {
        match plotting::plot_decay_forecast(path, &record) {
            Ok(()) => println!("\nDecay chart saved to {:?}", path),
            Err(e) => {
                log::warn!("Failed to render decay chart to {:?}: {:#}", path, e);
                println!("\nDecay chart could not be written to {:?}: {}", path, e);
            }
        }
    }
    Ok(record)
}

fn print_result(record: &HistoryRecord, isotope: &IsotopeSpec) {
    let result = &record.result;
    println!("\n--- Calculation Result: {} ---", record.sample_label);
    println!(
        "Isotope: {} (T½ = {} h, γ = {})",
        isotope.display_name, isotope.half_life_hours, record.input.gamma_constant
    );
    println!(
        "Activity at measurement: {} MBq ({} Bq)",
        to_exponential(result.activity_mbq_at_measurement, 2),
        to_exponential(result.activity_bq_at_measurement, 2)
    );
    println!("Density at measurement:  {} Bq/g", to_fixed(result.density_bq_per_gram, 4));

    // Nothing to project when the target is the measurement time.
    if result.elapsed_hours != 0.0 {
        println!(
            "\nAt target time {} ({:+.2} h):",
            format_datetime(&record.input.target_at),
            result.elapsed_hours
        );
        println!(
            "Activity at target:      {} MBq ({} Bq)",
            to_exponential(result.activity_mbq_at_target, 2),
            to_exponential(result.activity_bq_at_target, 2)
        );
        println!("Density at target:       {} Bq/g", to_fixed(result.density_at_target, 4));
    }

    println!(
        "\n--- 10 Half-Life Forecast (T½ = {} h, distance {} m) ---",
        isotope.half_life_hours, record.input.distance_m
    );
    println!(
        "{:>4} {:<17} {:>10} {:>10} {:>14} {:>14} {:>10}",
        "T½", "Time", "MBq", "Bq", "Bq/g", "µSv/hr", "Remaining"
    );
    for row in &record.forecast {
        println!(
            "{:>4} {:<17} {:>10} {:>10} {:>14} {:>14} {:>9}%",
            row.half_life_index,
            row.predicted_at
                .as_ref()
                .map_or_else(|| export::NOT_AVAILABLE.to_string(), format_datetime),
            to_exponential(row.activity_mbq, 2),
            to_exponential(row.activity_bq, 2),
            to_fixed(row.density_bq_per_gram, 4),
            to_fixed(row.exposure_rate_at_distance, 6),
            to_fixed(row.percent_remaining, 4)
        );
    }
}

fn load_scope<S: KeyValueStore>(
    repo: &HistoryRepository<S>,
    username: &str,
    scope: HistoryScope,
) -> Result<Vec<HistoryRecord>> {
    Ok(match scope {
        HistoryScope::Personal => repo.personal(username)?,
        HistoryScope::Shared => repo.shared()?,
    })
}

pub fn show_history<S: KeyValueStore>(
    repo: &HistoryRepository<S>,
    username: &str,
    scope: HistoryScope,
    as_json: bool,
) -> Result<()> {
    let records = load_scope(repo, username, scope)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    match scope {
        HistoryScope::Personal => println!("\n--- Personal History: {} ({} entries) ---", username, records.len()),
        HistoryScope::Shared => println!("\n--- Shared History, all users ({} entries) ---", records.len()),
    }
    if records.is_empty() {
        println!("No calculations recorded yet.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{:>14}  {}  {:<10} {:<16} {:<8} {:>10} MBq {:>12} Bq/g",
            record.id,
            format_datetime(&record.created_at),
            record.created_by,
            record.sample_label,
            record.isotope.display_name,
            to_exponential(record.result.activity_mbq_at_measurement, 2),
            to_fixed(record.result.density_bq_per_gram, 4)
        );
    }
    Ok(())
}

pub fn delete_record<S: KeyValueStore>(
    repo: &mut HistoryRepository<S>,
    username: &str,
    id: RecordId,
    scope: HistoryScope,
) -> Result<()> {
    let removed = match scope {
        HistoryScope::Personal => repo.delete_personal(username, id)?,
        HistoryScope::Shared => repo.delete_shared(id)?,
    };
    if !removed {
        bail!("No record with id {} in the {:?} history", id, scope);
    }
    println!("Deleted record {} from the {:?} history.", id, scope);
    Ok(())
}

pub fn export_records<S: KeyValueStore>(
    repo: &HistoryRepository<S>,
    username: &str,
    scope: HistoryScope,
    out: &Path,
    options: ExportOptions,
) -> Result<usize> {
    let records = load_scope(repo, username, scope)?;
    if records.is_empty() {
        bail!("Nothing to export: the {:?} history is empty", scope);
    }
    export::export_history_to_path(&records, out, options)?;
    println!("Exported {} records to {:?}", records.len(), out);
    Ok(records.len())
}

pub fn plot_record<S: KeyValueStore>(
    repo: &HistoryRepository<S>,
    username: &str,
    id: RecordId,
    scope: HistoryScope,
    out: &Path,
) -> Result<()> {
    let records = load_scope(repo, username, scope)?;
    let record = records
        .iter()
        .find(|r| r.id == id)
        .with_context(|| format!("No record with id {} in the {:?} history", id, scope))?;
    plotting::plot_decay_forecast(out, record)?;
    println!("Decay chart saved to {:?}", out);
    Ok(())
}
