// Glidepath command line host
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use glidepath_lib::commands::{self, CommandResult};
use glidepath_lib::config::AppConfig;
use glidepath_lib::state;

#[derive(Parser, Debug)]
#[command(author, version, about = "Flight log store and landing event detector", long_about = None)]
struct Cli {
    /// Database file (defaults to the app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file (defaults to config.json in the app data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a flight recorder CSV log
    Load {
        csv: PathBuf,

        /// Flight name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// List loaded flights
    Flights,
    /// Show the columns of a flight
    Columns { flight: String },
    /// Print attribute series of a flight
    Series {
        flight: String,

        #[arg(required = true)]
        attributes: Vec<String>,

        /// Also print the series normalized into [0, 1]
        #[arg(long, action = ArgAction::SetTrue)]
        normalized: bool,
    },
    /// Detect and store the landing events of a flight
    Detect {
        flight: String,

        /// Print the timeline of found events instead of the event set
        #[arg(long, action = ArgAction::SetTrue)]
        timeline: bool,
    },
    /// Print the event definitions and detector thresholds
    Definitions {
        /// Bottom of the display scale for the reference bands
        #[arg(long, requires = "scale_max", allow_hyphen_values = true)]
        scale_min: Option<f64>,

        /// Top of the display scale for the reference bands
        #[arg(long, requires = "scale_min", allow_hyphen_values = true)]
        scale_max: Option<f64>,
    },
    /// Delete a flight and its data
    Delete { flight: String },
}

fn print_json<T: Serialize>(value: &T) -> CommandResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> CommandResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    if let Command::Definitions {
        scale_min,
        scale_max,
    } = cli.command
    {
        let scale = scale_min.zip(scale_max);
        return print_json(&commands::get_event_definitions(&config, scale));
    }

    let db_path = cli.db.or_else(|| config.storage.db_path.clone());
    let db = state::init_db(db_path.as_deref())?;

    match cli.command {
        Command::Load { csv, name } => {
            let summary = commands::load_flight(&db, &config, &csv, name.as_deref()).await?;
            print_json(&summary)
        }
        Command::Flights => print_json(&commands::list_flights(&db)?),
        Command::Columns { flight } => print_json(&commands::get_flight_columns(&db, &flight)?),
        Command::Series {
            flight,
            attributes,
            normalized,
        } => {
            let attributes: Vec<&str> = attributes.iter().map(String::as_str).collect();
            if normalized {
                print_json(&commands::get_normalized_series(
                    &db,
                    &config,
                    &flight,
                    &attributes,
                )?)
            } else {
                print_json(&commands::get_series(&db, &flight, &attributes)?)
            }
        }
        Command::Detect { flight, timeline } => {
            let events = commands::detect_events(&db, &config, &flight)?;
            if timeline {
                print_json(&glidepath_lib::events::EventTimeline::from_events(&events))
            } else {
                print_json(&events)
            }
        }
        Command::Delete { flight } => {
            let deleted = commands::delete_flight(&db, &flight)?;
            print_json(&serde_json::json!({ "flight": flight, "deleted": deleted }))
        }
        Command::Definitions { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e.message());
            ExitCode::FAILURE
        }
    }
}
