use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    models::{
        bar::{DailyBar, normalize_series},
        window::DateWindow,
    },
    providers::{
        ClientBuildSnafu, InvalidBaseUrlSnafu, MarketDataSource, ProviderInitError, SourceError,
        yahoo_chart::{
            params::ChartParams,
            response::{ChartEnvelope, Quote},
        },
    },
};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) price-sync/0.1";

/// Connection settings for [`YahooChartProvider`].
#[derive(Clone, Debug)]
pub struct YahooChartConfig {
    /// Endpoint prefix; the symbol is appended as the last path segment.
    pub base_url: String,
    /// Whole-request timeout, including reading the body.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for YahooChartConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

pub struct YahooChartProvider {
    client: Client,
    base_url: Url,
}

impl YahooChartProvider {
    /// Creates a provider against the public endpoint.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(YahooChartConfig::default())
    }

    /// Creates a provider with explicit settings (e.g. a local test server).
    pub fn with_config(cfg: YahooChartConfig) -> Result<Self, ProviderInitError> {
        let base_url = Url::parse(&cfg.base_url).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: cfg.base_url.clone(),
                message: e.to_string(),
            }
            .build()
        })?;
        if base_url.cannot_be_a_base() {
            return InvalidBaseUrlSnafu {
                url: cfg.base_url,
                message: "URL cannot carry path segments",
            }
            .fail();
        }

        let client = Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self { client, base_url })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::malformed(symbol, "base URL cannot carry a symbol"))?
            .pop_if_empty()
            .push(symbol);
        Ok(url)
    }
}

#[async_trait]
impl MarketDataSource for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo-chart"
    }

    async fn fetch(&self, symbol: &str, window: DateWindow) -> Result<Vec<DailyBar>, SourceError> {
        let url = self.chart_url(symbol)?;
        let params = ChartParams::daily(&window);
        debug!(symbol, %window, "requesting chart");

        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(symbol, describe_transport(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::unavailable(symbol, describe_transport(&e)))?;

        if !status.is_success() {
            return Err(classify_status(symbol, status, &body));
        }

        let envelope: ChartEnvelope = serde_json::from_str(&body)
            .map_err(|e| SourceError::malformed(symbol, format!("undecodable chart JSON: {e}")))?;

        bars_from_chart(symbol, &window, envelope)
    }
}

fn describe_transport(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

/// Maps a non-success HTTP status onto the source error taxonomy.
fn classify_status(symbol: &str, status: StatusCode, body: &str) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::empty(symbol),
        StatusCode::TOO_MANY_REQUESTS => SourceError::unavailable(symbol, "rate limited (HTTP 429)"),
        s if s.is_server_error() => SourceError::unavailable(symbol, format!("HTTP {s}")),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let detail = serde_json::from_str::<ChartEnvelope>(body)
                .ok()
                .and_then(|env| env.chart.error)
                .map(|err| format!("{}: {}", err.code, err.description))
                .unwrap_or_else(|| format!("HTTP {status}"));
            SourceError::malformed(symbol, detail)
        }
        s => SourceError::unavailable(symbol, format!("HTTP {s}")),
    }
}

/// Turns a decoded chart envelope into ordered bars inside `window`.
pub fn bars_from_chart(
    symbol: &str,
    window: &DateWindow,
    envelope: ChartEnvelope,
) -> Result<Vec<DailyBar>, SourceError> {
    let results = match (envelope.chart.result, envelope.chart.error) {
        (_, Some(err)) if err.code == "Not Found" => return Err(SourceError::empty(symbol)),
        (_, Some(err)) => {
            return Err(SourceError::malformed(
                symbol,
                format!("{}: {}", err.code, err.description),
            ));
        }
        (Some(results), None) => results,
        (None, None) => {
            return Err(SourceError::malformed(symbol, "empty result with no error"));
        }
    };

    let data = results
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::malformed(symbol, "result array is empty"))?;

    let Some(timestamps) = data.timestamp else {
        return Err(SourceError::empty(symbol));
    };

    let quote: Quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::malformed(symbol, "no quote block"))?;

    let offset = data.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let mut bars = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(ts.saturating_add(offset), 0).map(|dt| dt.date_naive())
        else {
            warn!(symbol, ts, "skipping row with invalid timestamp");
            continue;
        };
        if !window.contains(date) {
            continue;
        }

        let volume = quote.volume.get(i).copied().flatten().and_then(|v| {
            let converted = i64::try_from(v).ok();
            if converted.is_none() {
                warn!(symbol, %date, v, "volume does not fit 64-bit signed, dropping it");
            }
            converted
        });

        let bar = DailyBar {
            date,
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            volume,
            indicator: None,
        }
        .sanitized();

        // holidays come back as all-null rows
        if bar.is_blank() {
            continue;
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(SourceError::empty(symbol));
    }
    Ok(normalize_series(bars))
}
