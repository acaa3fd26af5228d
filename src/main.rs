use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod extractor;
mod utils;

use extractor::{ExtractorError, MediaExtractor, MediaRecord};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the page to extract
    url: String,

    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_dir = format!("{}/mediagrab", xdg_config_home);
        let config_path = format!("{}/config.toml", config_dir);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_dir = format!("{}/.config/mediagrab", home.display());
        let config_path = format!("{}/config.toml", config_dir);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}

fn print_record(record: &MediaRecord) -> Result<()> {
    if let Some(duration) = record.duration {
        info!(
            "Extracted {} ({})",
            record.id,
            utils::format_duration(duration)
        );
    } else {
        info!("Extracted {}", record.id);
    }
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let config = if let Some(config_path) = get_config_path(&args) {
        config::Config::from_file(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path))?
    } else {
        config::Config::default()
    };

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Starting mediagrab...");

    let registry = MediaExtractor::new(&config)?;

    match registry.extract(&args.url).await {
        Ok(record) => print_record(&record)?,
        Err(ExtractorError::GeoRestricted { countries, record }) => {
            warn!(
                "Content is available in {} only; reporting gathered metadata",
                countries.join(", ")
            );
            print_record(&record)?;
        }
        Err(e) if e.is_expected() => {
            return Err(anyhow::anyhow!("{e}"));
        }
        Err(e) => {
            return Err(e).context("Extraction failed");
        }
    }

    Ok(())
}
