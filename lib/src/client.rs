use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{self, Error},
    provider::Provider,
    types::{
        Bar, Chart, ChartError, ChartResponse, ChartResult, HistoryRequest,
        Period, Series,
    },
};

/// Yahoo's earliest `period1`, used to request the full history.
const MAX_PERIOD_START: i64 = -2_208_994_789;
const INTERVAL: &str = "1d";
const NOT_FOUND: &str = "Not Found";
/// Decimal places kept after scaling prices by the adjustment ratio.
const ADJUSTED_SCALE: u32 = 10;
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
);

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(base_url: Url) -> Result<Self, error::Init> {
        if base_url.cannot_be_a_base() {
            return Err(error::Init::InvalidBaseUrl(base_url.to_string()));
        }
        let headers = HeaderMap::from_iter([
            (header::USER_AGENT, HeaderValue::from_static(USER_AGENT)),
            (header::ACCEPT, HeaderValue::from_static("application/json")),
        ]);
        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(error::Init::ClientInitialization)?;
        Ok(Self { inner, base_url })
    }

    /// `{base}/v8/finance/chart/{ticker}` with the ticker as a single
    /// encoded path segment.
    pub fn chart_url(&self, request: &HistoryRequest<'_>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", request.ticker]);
        }
        {
            let mut query = url.query_pairs_mut();
            match request.period {
                Period::Max => {
                    let now = Utc::now().timestamp();
                    query
                        .append_pair("period1", &MAX_PERIOD_START.to_string())
                        .append_pair("period2", &now.to_string());
                }
                period => {
                    query.append_pair("range", &period.to_string());
                }
            }
            query
                .append_pair("interval", INTERVAL)
                .append_pair("includeAdjustedClose", "true")
                .append_pair("events", "div,splits");
        }
        url
    }

    #[instrument(skip_all, err, fields(ticker = %request.ticker))]
    pub async fn get_history(
        &self,
        request: &HistoryRequest<'_>,
    ) -> Result<Series, Error> {
        let url = self.chart_url(request);
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(Error::SendRequest)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::ReadBody)?;
        let chart: ChartResponse = match serde_json::from_str(&body) {
            Ok(chart) => chart,
            Err(_) if !status.is_success() => {
                return Err(Error::UnexpectedStatus(status))
            }
            Err(e) => return Err(Error::Serde(e)),
        };
        let series =
            parse_chart(request.ticker, status, chart.chart, request.adjust)?;
        debug!(status = %status, num_rows = series.len(), "Got response");
        Ok(series)
    }
}

impl Provider for Client {
    fn fetch_history<'a>(
        &'a self,
        request: &'a HistoryRequest<'a>,
    ) -> BoxFuture<'a, Result<Series, Error>> {
        self.get_history(request).boxed()
    }
}

fn parse_chart(
    ticker: &str,
    status: StatusCode,
    chart: Chart,
    adjust: bool,
) -> Result<Series, Error> {
    let Chart { result, error } = chart;
    if let Some(ChartError { code, description }) = error {
        if code == NOT_FOUND {
            debug!(%description, "Symbol not found");
            return Ok(Series::empty(ticker, adjust));
        }
        return Err(Error::Provider { code, description });
    }
    if !status.is_success() {
        return Err(Error::UnexpectedStatus(status));
    }
    let result = result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| Error::Malformed("no result and no error".into()))?;
    to_series(ticker, result, adjust)
}

fn to_series(
    ticker: &str,
    result: ChartResult,
    adjust: bool,
) -> Result<Series, Error> {
    let ChartResult {
        meta,
        timestamp,
        indicators,
    } = result;
    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    debug!(
        timezone = ?meta.exchange_timezone_name,
        num_timestamps = timestamp.len(),
        "Parsing chart"
    );

    let mut bars = Vec::with_capacity(timestamp.len());
    for (i, ts) in timestamp.into_iter().enumerate() {
        let at = |values: &[Option<Decimal>]| values.get(i).copied().flatten();
        let open = at(&quote.open);
        let high = at(&quote.high);
        let low = at(&quote.low);
        let close = at(&quote.close);
        let volume = quote.volume.get(i).copied().flatten();
        // placeholder rows for non-trading days
        if open.is_none()
            && high.is_none()
            && low.is_none()
            && close.is_none()
            && volume.is_none()
        {
            continue;
        }
        let date = ts
            .checked_add(meta.gmtoffset)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                Error::Malformed(format!("invalid timestamp: {ts}"))
            })?
            .date_naive();
        let bar = Bar {
            date,
            open,
            high,
            low,
            close,
            adj_close: at(&adj_closes),
            volume,
        };
        bars.push(if adjust { adjust_bar(bar) } else { bar });
    }

    Ok(Series {
        ticker: ticker.to_string(),
        adjusted: adjust,
        bars,
    })
}

/// Scale open/high/low by `adj_close / close` and replace close with the
/// adjusted close. Bars without a usable ratio keep their raw prices.
fn adjust_bar(bar: Bar) -> Bar {
    let ratio = match (bar.adj_close, bar.close) {
        (Some(adj_close), Some(close)) => adj_close.checked_div(close),
        _ => None,
    };
    let scale = |value: Option<Decimal>| match ratio {
        Some(ratio) => value
            .and_then(|v| v.checked_mul(ratio))
            .map(|v| v.round_dp(ADJUSTED_SCALE).normalize()),
        None => value,
    };
    Bar {
        open: scale(bar.open),
        high: scale(bar.high),
        low: scale(bar.low),
        close: bar.adj_close.or(bar.close),
        adj_close: None,
        ..bar
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use mockito::Matcher;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::types::HistoryRequestBuilder;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn chart_body() -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "AAPL",
                        "gmtoffset": -14400,
                        "exchangeTimezoneName": "America/New_York"
                    },
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {
                        "quote": [{
                            "open": [187.15, null, 182.15],
                            "high": [188.44, null, 183.09],
                            "low": [183.89, null, 180.88],
                            "close": [185.64, null, 181.91],
                            "volume": [82488700, null, 71983600]
                        }],
                        "adjclose": [{ "adjclose": [92.82, null, 90.955] }]
                    }
                }],
                "error": null
            }
        })
    }

    fn client_for(server: &mockito::ServerGuard) -> Client {
        Client::new(Url::parse(&server.url()).unwrap()).unwrap()
    }

    #[test]
    fn chart_url_encodes_ticker_and_period() {
        let client =
            Client::new(Url::parse("https://example.com/").unwrap()).unwrap();
        let request = HistoryRequestBuilder::default()
            .ticker("BF/B")
            .period(Period::FiveYears)
            .build()
            .unwrap();
        let url = client.chart_url(&request);
        assert_eq!(url.path(), "/v8/finance/chart/BF%2FB");
        let query: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("range".into(), "5y".into())));
        assert!(query.contains(&("interval".into(), "1d".into())));
        assert!(!query.iter().any(|(k, _)| k == "period1"));
    }

    #[test]
    fn chart_url_requests_full_history_for_max() {
        let client =
            Client::new(Url::parse("https://example.com").unwrap()).unwrap();
        let request = HistoryRequestBuilder::default()
            .ticker("GC=F")
            .build()
            .unwrap();
        let url = client.chart_url(&request);
        let query: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("period1".into(), "-2208994789".into())));
        assert!(query.iter().any(|(k, _)| k == "period2"));
        assert!(!query.iter().any(|(k, _)| k == "range"));
    }

    #[test]
    fn rejects_cannot_be_a_base_url() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            Client::new(url),
            Err(error::Init::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn parses_raw_history() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v8/finance/chart/AAPL")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("interval".into(), "1d".into()),
                Matcher::UrlEncoded("period1".into(), "-2208994789".into()),
                Matcher::UrlEncoded(
                    "includeAdjustedClose".into(),
                    "true".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chart_body().to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("AAPL")
            .build()
            .unwrap();

        let series = client.get_history(&request).await.unwrap();

        mock.assert_async().await;
        assert!(!series.adjusted);
        assert_eq!(series.len(), 2);
        let first = &series.bars[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.open, Some(dec("187.15")));
        assert_eq!(first.close, Some(dec("185.64")));
        assert_eq!(first.adj_close, Some(dec("92.82")));
        assert_eq!(first.volume, Some(82_488_700));
        assert_eq!(
            series.bars[1].date,
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
        );
    }

    #[tokio::test]
    async fn adjusts_prices_when_requested() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "timestamp": [1704153600],
                    "indicators": {
                        "quote": [{
                            "open": [20], "high": [30], "low": [10],
                            "close": [20], "volume": [1000]
                        }],
                        "adjclose": [{ "adjclose": [10] }]
                    }
                }],
                "error": null
            }
        });
        server
            .mock("GET", "/v8/finance/chart/BTC-USD")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("BTC-USD")
            .adjust(true)
            .build()
            .unwrap();

        let series = client.get_history(&request).await.unwrap();

        assert!(series.adjusted);
        let bar = &series.bars[0];
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bar.open, Some(dec("10")));
        assert_eq!(bar.high, Some(dec("15")));
        assert_eq!(bar.low, Some(dec("5")));
        assert_eq!(bar.close, Some(dec("10")));
        assert_eq!(bar.adj_close, None);
        assert_eq!(bar.volume, Some(1000));
    }

    #[tokio::test]
    async fn not_found_is_an_empty_series() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "chart": {
                "result": null,
                "error": {
                    "code": "Not Found",
                    "description": "No data found, symbol may be delisted"
                }
            }
        });
        server
            .mock("GET", "/v8/finance/chart/ZZZZ")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(body.to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("ZZZZ")
            .build()
            .unwrap();

        let series = client.get_history(&request).await.unwrap();

        assert!(series.is_empty());
        assert_eq!(series.ticker, "ZZZZ");
    }

    #[tokio::test]
    async fn missing_timestamps_is_an_empty_series() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "indicators": { "quote": [{}] }
                }],
                "error": null
            }
        });
        server
            .mock("GET", "/v8/finance/chart/SOL-USD")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("SOL-USD")
            .build()
            .unwrap();

        assert!(client.get_history(&request).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "chart": {
                "result": null,
                "error": {
                    "code": "Bad Request",
                    "description": "Invalid input"
                }
            }
        });
        server
            .mock("GET", "/v8/finance/chart/AAPL")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(body.to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("AAPL")
            .build()
            .unwrap();

        let err = client.get_history(&request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Yahoo Finance returned Bad Request: Invalid input"
        );
    }

    #[tokio::test]
    async fn non_json_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v8/finance/chart/AAPL")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("Too Many Requests")
            .create_async()
            .await;
        let client = client_for(&server);
        let request = HistoryRequestBuilder::default()
            .ticker("AAPL")
            .build()
            .unwrap();

        let err = client.get_history(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedStatus(StatusCode::TOO_MANY_REQUESTS)
        ));
    }

    #[test]
    fn adjust_keeps_raw_prices_without_ratio() {
        let bar = Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Some(dec("1.5")),
            high: Some(dec("2")),
            low: Some(dec("1")),
            close: Some(Decimal::ZERO),
            adj_close: None,
            volume: None,
        };
        let adjusted = adjust_bar(bar.clone());
        assert_eq!(adjusted.open, bar.open);
        assert_eq!(adjusted.close, Some(Decimal::ZERO));
        assert_eq!(adjusted.adj_close, None);
    }
}
