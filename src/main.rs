use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};

use covid_alert_service::alert::{ConsoleNotifier, Notifier, WebhookNotifier};
use covid_alert_service::config::{TrackerConfig, DEFAULT_CONFIG_PATH};
use covid_alert_service::cycle::{run_cycle, CycleStatus};
use covid_alert_service::ingest::covidtracking::{CovidTrackingClient, Endpoint};
use covid_alert_service::logging::{self, Component};
use covid_alert_service::model::TrackerError;
use covid_alert_service::regions;
use covid_alert_service::report;
use covid_alert_service::store::{PostgresStore, SnapshotStore};

#[derive(Parser)]
#[command(name = "covid-alert")]
#[command(about = "Simple tool to get COVID-19 data and alert on rising case counts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file; environment variables override it
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one upstream report as a table of raw and normalized columns
    Report {
        /// One of: states_current, states_daily, states_info, us_current,
        /// us_daily, counties, tracker_urls
        report_type: String,
    },

    /// Run one poll-compare-store-notify cycle
    Cycle,

    /// Create the snapshot tables and indexes
    CreateTables,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match TrackerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    let level = config.log_level().unwrap_or(logging::LogLevel::Info);
    logging::init_logger(level, config.log.file.as_deref(), config.log.timestamps);

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(command: Commands, config: &TrackerConfig) -> Result<ExitCode, TrackerError> {
    match command {
        Commands::Report { report_type } => {
            let endpoint: Endpoint = match report_type.parse() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    println!("{}", e);
                    return Ok(ExitCode::from(1));
                }
            };
            let client = CovidTrackingClient::new(&config.base_url, config.request_timeout())?;
            let text = report::render_report(&client, endpoint, &config.normalizer()?, Utc::now())?;
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Cycle => {
            for code in regions::unknown_codes(&config.regions) {
                logging::warn(Component::Cycle, Some(code), "Configured region is not a known region code");
            }
            if config.recipients.is_empty() {
                logging::warn(Component::Notify, None, "No recipients configured; alerts will not be sent");
            }

            let client = CovidTrackingClient::new(&config.base_url, config.request_timeout())?;
            let mut store = PostgresStore::connect(config.require_database_url()?)?;
            let notifier: Box<dyn Notifier> = match &config.notify.webhook_url {
                Some(url) => Box::new(WebhookNotifier::new(url, config.request_timeout())?),
                None => Box::new(ConsoleNotifier),
            };

            let report = run_cycle(
                &client,
                &mut store,
                notifier.as_ref(),
                &config.normalizer()?,
                &config.cycle_settings(),
                Utc::now(),
            );

            Ok(match report.status() {
                CycleStatus::Success => ExitCode::SUCCESS,
                CycleStatus::PartialFailure => ExitCode::from(1),
            })
        }

        Commands::CreateTables => {
            let mut store = PostgresStore::connect(config.require_database_url()?)?;
            store.ensure_schema()?;
            logging::info(Component::Store, None, "Tables us_current and states_current are ready.");
            Ok(ExitCode::SUCCESS)
        }
    }
}
