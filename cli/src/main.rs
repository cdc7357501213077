use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Error, Result};
use clap::{ArgAction, Parser};
use std::fs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, EnvFilter};
use url::Url;
use yfinance_data::{
    config::{Config, Tickers, DEFAULT_BASE_URL},
    registry::Preset,
    service::{Service, Summary},
    types::Period,
};

const LOG_FILE_PREFIX: &str = "yfinance-data";

/// CLI tool to download daily price history from Yahoo Finance
#[derive(Parser, Debug)]
struct Args {
    /// Built-in ticker registry to download.
    #[clap(short, long, default_value_t, value_parser = Preset::from_str)]
    preset: Preset,
    /// File path to a config file that maps tickers to file names. Replaces
    /// the preset's registry.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// The folder to save the downloaded data, one `$alias.csv` per ticker.
    /// Defaults to the preset's folder.
    #[clap(short, long)]
    output_dir: Option<PathBuf>,
    /// How much history to request.
    #[clap(long, default_value_t, value_parser = Period::from_str)]
    period: Period,
    /// Adjust prices for splits and dividends. Defaults to the preset's
    /// setting.
    #[clap(long, action = ArgAction::Set)]
    adjust: Option<bool>,
    #[clap(
        long,
        env = "YFINANCE_BASE_URL",
        default_value = DEFAULT_BASE_URL,
        value_parser = Url::parse
    )]
    base_url: Url,
    /// The folder for the daily rolling log file. Kept apart from the
    /// output folder so it only holds downloaded series.
    #[clap(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let file_appender = log_appender(&args.log_dir)?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .with(EnvFilter::from_default_env())
        .init();
    let config: Config = args.try_into()?;
    run(config, &mut io::stdout()).await?;
    Ok(())
}

fn log_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to open log folder: {:?}", log_dir))
}

async fn run<W: Write>(config: Config, out: &mut W) -> Result<Summary> {
    let output_dir = config.output_dir.clone();
    let service = Service::new(config)?;
    service
        .fetch_data(out)
        .await
        .with_context(|| format!("Failed to download into {:?}", output_dir))
}

impl TryFrom<Args> for Config {
    type Error = Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let mut config = Config::from_preset(args.preset, args.base_url);
        if let Some(path) = args.config {
            config.registry = parse_config(path)?.tickers;
        }
        if let Some(output_dir) = args.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(adjust) = args.adjust {
            config.adjust = adjust;
        }
        config.period = args.period;
        Ok(config)
    }
}

fn parse_config(path: PathBuf) -> Result<Tickers, Error> {
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;

    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");

    match extension {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| "Failed to parse YAML"),
        "toml" => {
            toml::from_str(&contents).with_context(|| "Failed to parse TOML")
        }
        "json" => serde_json::from_str(&contents)
            .with_context(|| "Failed to parse JSON"),
        _ => {
            bail!("Unknown extension")
        }
    }
}
