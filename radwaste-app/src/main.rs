use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use radwaste_core::{
    export::ExportOptions,
    storage::{HistoryRepository, JsonFileStore},
};
use std::path::PathBuf;
use workflow::{CalculationRequest, HistoryScope};

mod config;
mod plotting;
mod workflow;

/// Activity density and decay forecasts for radioactive waste samples.
#[derive(Debug, Parser)]
#[command(name = "radwaste", version, about)]
struct Cli {
    /// Configuration file (defaults to ./radwaste.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// History store file, overriding the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log debug diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the isotope reference table.
    Isotopes,
    /// Compute activity, density and the half-life forecast from a dose-rate measurement.
    Calculate(CalculateArgs),
    /// Show stored calculations.
    History {
        #[arg(long)]
        user: String,
        /// Show the shared list of all users instead of the personal one.
        #[arg(long)]
        shared: bool,
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove a record from one history list.
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        shared: bool,
    },
    /// Write a history list to a CSV file.
    Export {
        #[arg(long)]
        user: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        shared: bool,
        /// Omit the ten half-life sub-table under each record.
        #[arg(long)]
        no_forecast: bool,
    },
    /// Render the decay chart of a stored record.
    Plot {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        shared: bool,
    },
}

#[derive(Debug, Args)]
struct CalculateArgs {
    #[arg(long)]
    user: String,
    /// Isotope id from the reference table (e.g. f18).
    #[arg(long)]
    isotope: String,
    /// Measured dose rate in µSv/hr.
    #[arg(long, allow_negative_numbers = true)]
    dose_rate: f64,
    /// Measurement distance in metres.
    #[arg(long, allow_negative_numbers = true)]
    distance: f64,
    /// Sample mass in grams.
    #[arg(long, allow_negative_numbers = true)]
    mass: f64,
    /// Gamma constant override in µSv·m²/(MBq·hr); defaults to the isotope's value.
    #[arg(long, allow_negative_numbers = true)]
    gamma: Option<f64>,
    /// Measurement time (RFC 3339 or YYYY-MM-DDTHH:MM); defaults to now.
    #[arg(long)]
    measured_at: Option<String>,
    /// Time to project the activity to; defaults to now.
    #[arg(long)]
    target_at: Option<String>,
    #[arg(long)]
    sample: Option<String>,
    /// Also render the decay chart to this PNG file.
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Print the result without recording it in history.
    #[arg(long)]
    no_save: bool,
}

fn scope(shared: bool) -> HistoryScope {
    if shared {
        HistoryScope::Shared
    } else {
        HistoryScope::Personal
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = config::AppConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    let table = config.isotope_table()?;

    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("Failed to open history store {:?}", config.store_path))?;
    log::debug!("Using history store {:?}", store.path());
    let mut repo = HistoryRepository::new(store);

    match cli.command {
        Command::Isotopes => workflow::list_isotopes(&table),
        Command::Calculate(args) => {
            let now = Utc::now();
            let parse = |value: Option<&str>| match value {
                Some(s) => config.time_policy.parse_timestamp(s),
                None => Ok(now),
            };
            let request = CalculationRequest {
                username: args.user,
                isotope_id: args.isotope,
                gamma_constant: args.gamma,
                distance_m: args.distance,
                dose_rate: args.dose_rate,
                mass_g: args.mass,
                measured_at: parse(args.measured_at.as_deref())?,
                target_at: parse(args.target_at.as_deref())?,
                sample_label: args.sample,
                plot_path: args.plot,
                save: !args.no_save,
            };
            workflow::run_calculation(&request, &config, &table, &mut repo)?;
        }
        Command::History { user, shared, json } => workflow::show_history(&repo, &user, scope(shared), json)?,
        Command::Delete { user, id, shared } => workflow::delete_record(&mut repo, &user, id, scope(shared))?,
        Command::Export { user, out, shared, no_forecast } => {
            let options = ExportOptions { include_forecast: !no_forecast };
            workflow::export_records(&repo, &user, scope(shared), &out, options)?;
        }
        Command::Plot { user, id, out, shared } => workflow::plot_record(&repo, &user, id, scope(shared), &out)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_measurements_parse_and_reach_validation() {
        let cli = Cli::try_parse_from([
            "radwaste", "calculate", "--user", "alice", "--isotope", "f18", "--dose-rate", "-0.5", "--distance",
            "-1", "--mass", "-2", "--gamma", "-0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Calculate(args) => {
                assert_eq!(args.dose_rate, -0.5);
                assert_eq!(args.distance, -1.0);
                assert_eq!(args.mass, -2.0);
                assert_eq!(args.gamma, Some(-0.1));
            }
            other => panic!("expected calculate, got {:?}", other),
        }
    }
}
