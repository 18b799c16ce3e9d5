//! HTTP Record Source
//!
//! Polls a JSON quote endpoint. Each response body is an array of quotes:
//!
//! ```json
//! [{"stock": "ABC", "timestamp": "2019-02-01 09:33:15.234000",
//!   "top_bid": {"price": 118.3, "size": 12},
//!   "top_ask": {"price": 119.1, "size": 40}}]
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::quote::{BookLevel, QuoteRecord, parse_timestamp};

/// Longest error body kept in [`SourceError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct WireLevel {
    price: Decimal,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct WireQuote {
    #[serde(default)]
    stock: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    top_bid: Option<WireLevel>,
    #[serde(default)]
    top_ask: Option<WireLevel>,
}

/// Record source backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: Client,
    url: String,
}

impl HttpRecordSource {
    /// Create a source polling `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint being polled.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        decode_batch(&text)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Decode a response body into records, in body order.
///
/// The batch is rejected as a whole if any entry lacks a usable identity.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] for invalid JSON and
/// [`SourceError::MalformedRecord`] for the first entry with an empty
/// stock or an unparseable timestamp.
pub fn decode_batch(body: &str) -> Result<Vec<QuoteRecord>, SourceError> {
    let wire: Vec<WireQuote> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;

    wire.into_iter()
        .enumerate()
        .map(|(index, quote)| into_record(index, quote))
        .collect()
}

fn into_record(index: usize, quote: WireQuote) -> Result<QuoteRecord, SourceError> {
    let stock = quote
        .stock
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| SourceError::MalformedRecord {
            index,
            reason: "missing stock".to_string(),
        })?;

    let raw_timestamp = quote.timestamp.ok_or_else(|| SourceError::MalformedRecord {
        index,
        reason: "missing timestamp".to_string(),
    })?;
    let timestamp =
        parse_timestamp(&raw_timestamp).ok_or_else(|| SourceError::MalformedRecord {
            index,
            reason: format!("unparseable timestamp {raw_timestamp:?}"),
        })?;

    let mut record = QuoteRecord::new(stock, timestamp);
    if let Some(bid) = quote.top_bid {
        record = record.with_top_bid(BookLevel::new(bid.price, bid.size));
    }
    if let Some(ask) = quote.top_ask {
        record = record.with_top_ask(BookLevel::new(ask.price, ask.size));
    }
    if let Some(mid) = record.mid_price() {
        record = record.with_price(mid);
    }
    Ok(record)
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
