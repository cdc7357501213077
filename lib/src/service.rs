use std::{
    fs::{self as std_fs, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    client::Client,
    config::Config,
    error::{self, Error},
    provider::Provider,
    registry::Entry,
    types::{AdjustedRow, HistoryRequestBuilder, RawRow, Series},
};
use csv::WriterBuilder;
use displaydoc::Display;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one registry entry during a run.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// OK ({rows} rows)
    Ok { rows: usize },
    /// NO DATA
    NoData,
    /// ERROR: {0}
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerReport {
    pub ticker: String,
    pub alias: String,
    pub outcome: Outcome,
}

/// Per-ticker outcomes of a run, in registry order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub reports: Vec<TickerReport>,
}

impl Summary {
    pub fn ok(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Ok { .. }))
    }

    pub fn no_data(&self) -> usize {
        self.count(|o| matches!(o, Outcome::NoData))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Error(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct Service<P = Client> {
    provider: P,
    config: Config,
}

impl Service<Client> {
    pub fn new(config: Config) -> Result<Self, Error> {
        let client = Client::new(config.base_url.clone())?;
        Ok(Self::with_provider(config, client))
    }
}

impl<P: Provider> Service<P> {
    pub fn with_provider(config: Config, provider: P) -> Self {
        Self { provider, config }
    }

    /// Download every registry entry in order, writing progress lines to
    /// `out`. Per-ticker failures are reported and never stop the run; only
    /// failing to create the output directory or to write progress aborts.
    #[instrument(skip_all)]
    pub async fn fetch_data<W: Write>(
        &self,
        out: &mut W,
    ) -> Result<Summary, Error> {
        info!(
            num_tickers = self.config.registry.len(),
            period = %self.config.period,
            adjust = self.config.adjust,
            output_dir = ?self.config.output_dir,
            "Starting to fetch data..."
        );
        fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(error::FileIo::CreateDir)?;

        writeln!(out, "Downloading {} tickers...\n", self.config.registry.len())
            .map_err(error::FileIo::Console)?;
        let mut summary = Summary::default();
        for entry in &self.config.registry {
            write!(out, "Downloading {}... ", entry.ticker)
                .and_then(|()| out.flush())
                .map_err(error::FileIo::Console)?;
            let outcome = match self.save_history_to_disk(entry).await {
                Ok(Some(rows)) => Outcome::Ok { rows },
                Ok(None) => Outcome::NoData,
                Err(e) => {
                    error!(
                        error = %e,
                        ticker = %entry.ticker,
                        "Encountered an error when processing a ticker"
                    );
                    Outcome::Error(e.to_string())
                }
            };
            writeln!(out, "{outcome}").map_err(error::FileIo::Console)?;
            summary.reports.push(TickerReport {
                ticker: entry.ticker.clone(),
                alias: entry.alias.clone(),
                outcome,
            });
        }
        writeln!(out, "\nDone!").map_err(error::FileIo::Console)?;

        info!(
            ok = summary.ok(),
            no_data = summary.no_data(),
            errors = summary.errors(),
            "Finished fetching data!"
        );
        Ok(summary)
    }

    /// Fetch one ticker and write it to `$output_dir/$alias.csv`. Returns
    /// the number of rows written, or `None` when the provider had no data.
    #[instrument(skip_all, fields(ticker = %entry.ticker))]
    async fn save_history_to_disk(
        &self,
        entry: &Entry,
    ) -> Result<Option<usize>, Error> {
        let request = HistoryRequestBuilder::default()
            .ticker(entry.ticker.as_str())
            .period(self.config.period)
            .adjust(self.config.adjust)
            .build()?;
        info!("Fetching data for ticker");
        let series = self.provider.fetch_history(&request).await?;
        if series.is_empty() {
            warn!("Got no results");
            return Ok(None);
        }
        let path = self.config.output_dir.join(format!("{}.csv", entry.alias));
        write_series(&series, &path)?;
        debug!(num_rows = series.len(), path = ?path, "Wrote series");
        Ok(Some(series.len()))
    }
}

/// Write to a sibling partial file and rename it over `path`, so `path`
/// is either left alone or fully replaced.
fn write_series(series: &Series, path: &Path) -> Result<(), error::FileIo> {
    let partial = partial_path(path);
    let result = write_csv(series, &partial)
        .and_then(|()| {
            std_fs::rename(&partial, path).map_err(error::FileIo::FileWrite)
        });
    if result.is_err() {
        if let Err(e) = std_fs::remove_file(&partial) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    error = %e,
                    path = ?partial,
                    "Failed to remove partial file"
                );
            }
        }
    }
    result
}

fn write_csv(series: &Series, path: &Path) -> Result<(), error::FileIo> {
    let file = File::create(path).map_err(error::FileIo::CreateFile)?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for bar in &series.bars {
        if series.adjusted {
            writer.serialize(AdjustedRow::from(bar))?;
        } else {
            writer.serialize(RawRow::from(bar))?;
        }
    }
    writer.flush().map_err(error::FileIo::FileWrite)?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
