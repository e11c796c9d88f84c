use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use weatherlink_core::{
    Config, Credentials, MalformedPolicy, Mode, Normalizer, WeatherLinkApi, client_from_config,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherlink", version, about = "WeatherLink v2 CLI")]
pub struct Cli {
    /// Serve canned demo responses instead of calling the live API.
    #[arg(long, global = true)]
    pub demo: bool,

    /// More log output; repeat for more detail. RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store API credentials and a default station.
    Configure,

    /// Check that the API accepts the configured credentials.
    Check,

    /// List the stations visible to the API key.
    Stations,

    /// List sensors, or show one sensor in detail.
    Sensors {
        /// Logical sensor id to describe.
        #[arg(long)]
        lsid: Option<i64>,

        /// Group the listing by sensor type.
        #[arg(long, conflicts_with = "lsid")]
        by_type: bool,
    },

    /// Show current conditions as a table.
    Current {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Show historic data as a table.
    Historic {
        /// How far back to fetch; the API serves at most 24 hours per request.
        #[arg(long, default_value_t = 24)]
        hours: i64,

        /// Sort rows by timestamp across sensors.
        #[arg(long)]
        sort: bool,

        #[command(flatten)]
        table: TableArgs,
    },
}

#[derive(Debug, clap::Args)]
pub struct TableArgs {
    /// Station id; defaults to the configured station, then the first station.
    #[arg(long)]
    station: Option<i64>,

    /// Only include sensors of this type, e.g. 323 for AirLink.
    #[arg(long)]
    sensor_type: Option<i64>,

    /// Drop malformed sensor entries instead of failing.
    #[arg(long)]
    skip_malformed: bool,

    /// Print rows as JSON.
    #[arg(long)]
    json: bool,
}

impl TableArgs {
    fn normalizer(&self, station_id: i64) -> Normalizer {
        let mut normalizer = Normalizer::new().station_id(station_id);
        normalizer.sensor_type = self.sensor_type;
        if self.skip_malformed {
            normalizer = normalizer.on_malformed(MalformedPolicy::Skip);
        }
        normalizer
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        config.apply_env()?;

        if let Command::Configure = self.command {
            return configure(config);
        }

        let mode = if self.demo { Mode::Demo } else { config.default_mode()? };
        tracing::info!(%mode, "using WeatherLink client");
        let client = client_from_config(mode, &config)?;

        match self.command {
            Command::Configure => unreachable!("handled above"),
            Command::Check => {
                if client.test_connection().await {
                    println!("Connection successful ({mode} mode)");
                } else {
                    return Err(anyhow!("Connection failed; check your API key and secret"));
                }
            }
            Command::Stations => {
                let stations = client.stations().await?;
                output::print_stations(&stations);
            }
            Command::Sensors { lsid: Some(lsid), .. } => {
                let sensor = client.sensor(lsid).await?;
                output::print_sensor_detail(&sensor);
            }
            Command::Sensors { lsid: None, by_type } => {
                let sensors = client.sensors().await?;
                if by_type {
                    output::print_sensors_by_type(&sensors);
                } else {
                    output::print_sensors(&sensors);
                }
            }
            Command::Current { table } => {
                let station = resolve_station(client.as_ref(), &config, table.station).await?;
                let body = client.current(station).await?;
                let rows = table.normalizer(station).normalize(&body)?;
                output::print_table(&rows, table.json)?;
            }
            Command::Historic { hours, sort, table } => {
                let station = resolve_station(client.as_ref(), &config, table.station).await?;
                let body = client.historic_hours_back(station, hours).await?;
                let mut rows = table.normalizer(station).normalize(&body)?;
                if sort {
                    rows.sort_by_timestamp();
                }
                output::print_table(&rows, table.json)?;
            }
        }

        Ok(())
    }
}

/// `--station`, then the configured default, then the first listed station.
async fn resolve_station(
    client: &dyn WeatherLinkApi,
    config: &Config,
    explicit: Option<i64>,
) -> anyhow::Result<i64> {
    if let Some(id) = explicit.or(config.default_station_id) {
        return Ok(id);
    }

    let stations = client.stations().await.context("Failed to list stations")?;
    stations.first().map(|s| s.station_id).ok_or_else(|| {
        anyhow!("No stations are visible to this API key.\nHint: pass `--station <id>`.")
    })
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Text::new("WeatherLink API key:").prompt().context("Failed to read API key")?;
    let api_secret = Password::new("WeatherLink API secret:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API secret")?;

    let station = Text::new("Default station id (optional):")
        .prompt()
        .context("Failed to read station id")?;
    let station = station.trim();
    if !station.is_empty() {
        let id = station.parse().with_context(|| format!("'{station}' is not a station id"))?;
        config.default_station_id = Some(id);
    }

    config.set_credentials(Credentials {
        api_key: api_key.trim().to_string(),
        api_secret: api_secret.trim().to_string(),
    });
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}
