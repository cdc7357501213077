use chrono::NaiveDate;
use derive_builder::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How far back to request history. Everything except `Max` is passed to
/// Yahoo as its `range` parameter.
#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
pub enum Period {
    #[serde(rename = "1d")]
    #[strum(serialize = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    #[strum(serialize = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    #[strum(serialize = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    #[strum(serialize = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    #[strum(serialize = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    #[strum(serialize = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    #[strum(serialize = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    #[strum(serialize = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    #[strum(serialize = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    #[strum(serialize = "ytd")]
    YearToDate,
    #[default]
    #[serde(rename = "max")]
    #[strum(serialize = "max")]
    Max,
}

#[derive(Builder, Debug, Clone)]
pub struct HistoryRequest<'a> {
    pub(crate) ticker: &'a str,
    #[builder(default)]
    pub(crate) period: Period,
    /// Normalize open/high/low/close for splits and dividends.
    #[builder(default)]
    pub(crate) adjust: bool,
}

impl HistoryRequest<'_> {
    pub fn ticker(&self) -> &str {
        self.ticker
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn adjust(&self) -> bool {
        self.adjust
    }
}

/// One trading day of a downloaded series.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    /// Always `None` once the series has been adjusted.
    pub adj_close: Option<Decimal>,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub ticker: String,
    /// Whether prices in `bars` are already split/dividend adjusted.
    pub adjusted: bool,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn empty(ticker: &str, adjusted: bool) -> Self {
        Self {
            ticker: ticker.to_string(),
            adjusted,
            bars: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// CSV row for an unadjusted series.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawRow {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub open: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub high: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub close: Option<Decimal>,
    #[serde(rename = "Adj Close", with = "rust_decimal::serde::str_option")]
    pub adj_close: Option<Decimal>,
    pub volume: Option<u64>,
}

/// CSV row for an adjusted series, which has no separate adjusted close.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AdjustedRow {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub open: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub high: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub close: Option<Decimal>,
    pub volume: Option<u64>,
}

impl From<&Bar> for RawRow {
    fn from(bar: &Bar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
        }
    }
}

impl From<&Bar> for AdjustedRow {
    fn from(bar: &Bar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: Meta,
    /// Unix seconds at the start of each bar. Missing when the range is empty.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    pub gmtoffset: i64,
    #[serde(alias = "exchangeTimezoneName", default)]
    pub exchange_timezone_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<Decimal>>,
    #[serde(default)]
    pub high: Vec<Option<Decimal>>,
    #[serde(default)]
    pub low: Vec<Option<Decimal>>,
    #[serde(default)]
    pub close: Vec<Option<Decimal>>,
    #[serde(default)]
    pub volume: Vec<Option<u64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<Decimal>>,
}
