//! Download full daily price history for a registry of Yahoo Finance tickers
//! and save each one as `$output_dir/$alias.csv`.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod service;
pub mod types;

pub use error::Error;
