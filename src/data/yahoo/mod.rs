/*!
[Yahoo Finance](https://finance.yahoo.com/)-specific data fetching code.

Daily bars come from the v8 chart API, one request per ticker. The tickers are joined on the
union of their dates into a two-level `(field, ticker)` table, the same shape a multi-ticker
yfinance download has.
*/
use super::{ColumnLabels, MarketData, RawTable};
use crate::error::FetchError;
use crate::util::DATE_FORMAT;
use crate::CpuFloat;
use chrono::{DateTime, NaiveDate};
use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// The fields of each ticker in a Yahoo table, in column order
pub const FIELDS: [&str; 6] = ["Adj Close", "Close", "High", "Low", "Open", "Volume"];

/// The chart API endpoint
pub const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// One ticker's daily bars, keyed by date, valued in [`FIELDS`] order
type Bars = BTreeMap<NaiveDate, [CpuFloat; 6]>;

/// Download daily bars from Yahoo Finance
#[derive(Debug, Clone)]
pub struct YahooSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooSource {
    /// Create a source talking to the public chart API
    pub fn new() -> Result<YahooSource, FetchError> {
        YahooSource::with_base_url(CHART_URL)
    }

    /// Create a source talking to another chart endpoint, e.g. a mirror
    pub fn with_base_url(base_url: &str) -> Result<YahooSource, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|source| FetchError::Http {
                ticker: String::new(),
                source,
            })?;
        Ok(YahooSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a ticker. `end` is exclusive.
    pub fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).map_or(0, |t| t.and_utc().timestamp());
        let end_ts = end.and_hms_opt(0, 0, 0).map_or(0, |t| t.and_utc().timestamp());
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&includeAdjustedClose=true",
            self.base_url, ticker, start_ts, end_ts
        )
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Bars, FetchError> {
        let url = self.chart_url(ticker, start, end);
        debug!("GET {}", url);
        let http_error = |source| FetchError::Http {
            ticker: ticker.to_string(),
            source,
        };
        let resp = self.client.get(&url).send().map_err(http_error)?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::SymbolNotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                ticker: ticker.to_string(),
                status,
            });
        }
        let chart: ChartResponse = resp.json().map_err(http_error)?;
        let bars = parse_chart(ticker, chart)?;
        info!("Fetched {} daily bars for {}", bars.len(), ticker);
        Ok(bars)
    }
}

/// Turn a chart response into bars, skipping days on which nothing at all was reported
fn parse_chart(ticker: &str, resp: ChartResponse) -> Result<Bars, FetchError> {
    let format_error = |reason: &str| FetchError::Format {
        ticker: ticker.to_string(),
        reason: reason.to_string(),
    };
    let data = match resp.chart.result {
        Some(result) => result
            .into_iter()
            .next()
            .ok_or_else(|| format_error("result array is empty"))?,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => {
                    FetchError::SymbolNotFound(ticker.to_string())
                }
                Some(err) => format_error(&format!("{}: {}", err.code, err.description)),
                None => format_error("empty result with no error"),
            })
        }
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |values: &Vec<Option<f64>>, i: usize| values.get(i).copied().flatten();
    let mut bars = Bars::new();
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| format_error(&format!("invalid timestamp {}", ts)))?;
        let fields = [
            at(&adj_closes, i),
            at(&quote.close, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.open, i),
            at(&quote.volume, i),
        ];
        if fields.iter().all(Option::is_none) {
            continue;
        }
        bars.insert(date, fields.map(|v| v.unwrap_or(CpuFloat::NAN)));
    }
    if bars.is_empty() {
        return Err(FetchError::SymbolNotFound(ticker.to_string()));
    }
    Ok(bars)
}

/// Join per-ticker bars into one two-level table over the union of their dates
fn join_bars(bars: &[(String, Bars)]) -> RawTable {
    let dates: BTreeSet<NaiveDate> = bars.iter().flat_map(|(_, b)| b.keys().copied()).collect();
    let mut labels = Vec::with_capacity(FIELDS.len() * bars.len());
    let mut columns = Vec::with_capacity(FIELDS.len() * bars.len());
    for (field_ix, field) in FIELDS.iter().enumerate() {
        for (ticker, ticker_bars) in bars {
            labels.push((field.to_string(), ticker.clone()));
            columns.push(
                dates
                    .iter()
                    .map(|date| ticker_bars.get(date).map_or(CpuFloat::NAN, |b| b[field_ix]))
                    .collect(),
            );
        }
    }
    RawTable {
        index: dates
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect(),
        labels: ColumnLabels::TwoLevel(labels),
        columns,
    }
}

impl MarketData for YahooSource {
    fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        if tickers.is_empty() {
            return Err(FetchError::InvalidRequest("no tickers requested".into()));
        }
        let mut sorted: Vec<&String> = tickers.iter().collect();
        sorted.sort();
        sorted.dedup();
        let bars = sorted
            .into_iter()
            .map(|ticker| Ok((ticker.clone(), self.fetch(ticker, start, end)?)))
            .collect::<Result<Vec<_>, FetchError>>()?;
        Ok(join_bars(&bars))
    }
}
