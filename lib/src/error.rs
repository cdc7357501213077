use displaydoc::Display;
use thiserror::Error;

use crate::types::HistoryRequestBuilderError;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Init error: {0}
    Init(#[from] Init),
    /// Io: {0}
    File(#[from] FileIo),
    /// Error sending request: {0}
    SendRequest(reqwest::Error),
    /// Error reading response body: {0}
    ReadBody(reqwest::Error),
    /// Unexpected status code: {0}
    UnexpectedStatus(reqwest::StatusCode),
    /// Failed to deserialize response: {0}
    Serde(#[from] serde_json::Error),
    /// Yahoo Finance returned {code}: {description}
    Provider { code: String, description: String },
    /// Malformed chart response: {0}
    Malformed(String),
    /// Invalid history request: {0}
    InvalidRequest(#[from] HistoryRequestBuilderError),
}

#[derive(Debug, Display, Error)]
pub enum Init {
    /// Failed to initialize the client: {0}
    ClientInitialization(reqwest::Error),
    /// Invalid base URL: {0}
    InvalidBaseUrl(String),
}

#[derive(Debug, Display, Error)]
pub enum FileIo {
    /// Error writing CSV: {0}
    Csv(#[from] csv::Error),
    /// Error writing file: {0}
    FileWrite(std::io::Error),
    /// Error creating file: {0}
    CreateFile(std::io::Error),
    /// Error creating output directory: {0}
    CreateDir(std::io::Error),
    /// Error writing progress output: {0}
    Console(std::io::Error),
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum Registry {
    /// Ticker symbol must not be empty
    EmptyTicker,
    /// Alias {0:?} is not a valid file name
    InvalidAlias(String),
    /// Ticker {0} is listed more than once
    DuplicateTicker(String),
    /// Alias {0} is used by more than one ticker
    DuplicateAlias(String),
}
