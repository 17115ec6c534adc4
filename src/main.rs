use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cropcast::{
    config::ServiceConfig,
    rules::{adjust_yield_for_damage, classify_wind_damage, parse_wind_speed},
    web,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Storm damage and crop yield estimates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Path to a YAML config file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(long)]
        port: Option<u16>,

        /// Override the storm archive CSV
        #[arg(long)]
        storm_path: Option<PathBuf>,

        /// Override the yield table CSV
        #[arg(long)]
        yield_path: Option<PathBuf>,
    },
    /// Print the crop damage bucket for a wind speed in km/h
    Damage {
        #[arg(allow_hyphen_values = true)]
        wind_kph: String,
    },
    /// Print the yield left after a percentage of damage
    Adjust {
        #[arg(allow_hyphen_values = true)]
        damage_percent: String,

        #[arg(long, default_value_t = 100.0)]
        base_yield: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            storm_path,
            yield_path,
        } => {
            let mut settings = match config {
                Some(path) => ServiceConfig::load(path)?,
                None => ServiceConfig::default(),
            };
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(path) = storm_path {
                settings.datasets.storm_path = path;
            }
            if let Some(path) = yield_path {
                settings.datasets.yield_path = path;
            }
            init_tracing(&settings.logging.level);
            web::run(settings).await
        }
        Command::Damage { wind_kph } => {
            let wind = parse_wind_speed(Some(&wind_kph))?;
            println!("{}", classify_wind_damage(wind));
            Ok(())
        }
        Command::Adjust {
            damage_percent,
            base_yield,
        } => {
            let adjusted = adjust_yield_for_damage(base_yield, &Value::String(damage_percent))?;
            println!("{adjusted:.2}");
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cropcast={level},tower_http=info,warn")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
