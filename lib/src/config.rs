use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

use crate::{
    registry::{Preset, Registry},
    types::Period,
};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Shape of a registry file (YAML, TOML or JSON).
#[derive(Deserialize, Clone)]
pub struct Tickers {
    /// Ticker to alias mapping, downloaded in the order listed.
    pub tickers: Registry,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Tickers to download and the file names to save them under.
    pub registry: Registry,
    /// The folder to save the results. Each ticker is written to
    /// `$output_dir/$alias.csv`.
    pub output_dir: PathBuf,
    /// How much history to request for every ticker.
    pub period: Period,
    /// Whether prices are adjusted for splits and dividends.
    pub adjust: bool,
    /// Root of the Yahoo Finance chart API.
    pub base_url: Url,
}

impl Config {
    pub fn from_preset(preset: Preset, base_url: Url) -> Self {
        Self {
            registry: preset.registry(),
            output_dir: preset.default_output_dir(),
            period: Period::Max,
            adjust: preset.adjust(),
            base_url,
        }
    }
}
