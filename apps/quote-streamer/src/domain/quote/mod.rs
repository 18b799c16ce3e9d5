//! Quote Records
//!
//! The atomic unit of the stream: one timestamped observation for one
//! instrument. Only `stock` and `timestamp` carry meaning for the
//! pipeline; the book levels and price ride along untouched.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Symbol
// =============================================================================

/// Instrument identifier (ticker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the symbol is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Quote Record
// =============================================================================

/// One side of the top of book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Quoted price.
    pub price: Decimal,
    /// Quoted size.
    pub size: u64,
}

impl BookLevel {
    /// Create a new book level.
    #[must_use]
    pub const fn new(price: Decimal, size: u64) -> Self {
        Self { price, size }
    }
}

/// Identity of an observation: two records with equal keys are the same
/// observation regardless of their payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    /// Instrument.
    pub stock: Symbol,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
}

/// A single timestamped quote observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Instrument the quote belongs to.
    pub stock: Symbol,
    /// Observation time.
    pub timestamp: DateTime<Utc>,
    /// Best bid at the time of observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_bid: Option<BookLevel>,
    /// Best ask at the time of observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_ask: Option<BookLevel>,
    /// Reference price supplied by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl QuoteRecord {
    /// Create a record with no payload.
    #[must_use]
    pub fn new(stock: impl Into<Symbol>, timestamp: DateTime<Utc>) -> Self {
        Self {
            stock: stock.into(),
            timestamp,
            top_bid: None,
            top_ask: None,
            price: None,
        }
    }

    /// Attach a reference price.
    #[must_use]
    pub const fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Attach the best bid.
    #[must_use]
    pub const fn with_top_bid(mut self, level: BookLevel) -> Self {
        self.top_bid = Some(level);
        self
    }

    /// Attach the best ask.
    #[must_use]
    pub const fn with_top_ask(mut self, level: BookLevel) -> Self {
        self.top_ask = Some(level);
        self
    }

    /// The identity used for deduplication.
    #[must_use]
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            stock: self.stock.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Borrowed identity, for lookups that must not allocate.
    #[must_use]
    pub const fn key_ref(&self) -> (&Symbol, &DateTime<Utc>) {
        (&self.stock, &self.timestamp)
    }

    /// Midpoint of the top of book, when both sides are present.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.top_bid, self.top_ask) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// Formats accepted for naive (zone-less) timestamps, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a source timestamp.
///
/// Accepts RFC 3339 as well as the space-separated naive form emitted by
/// simple quote servers (`2019-02-01 09:33:15.234000`).
///
/// Identity is the parsed instant, so spellings of the same instant
/// (`2019-02-01 09:33:15`, `2019-02-01T09:33:15Z`) name one observation.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
