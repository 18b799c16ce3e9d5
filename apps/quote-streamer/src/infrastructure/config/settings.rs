//! Streamer Configuration Settings
//!
//! Configuration types for the quote streamer, loaded from environment
//! variables.

use std::time::Duration;

use crate::application::events::DEFAULT_EVENT_CAPACITY;
use crate::application::services::{BinderConfig, DEFAULT_CADENCE, SchedulerConfig};

/// Where quotes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Poll a JSON quote endpoint over HTTP.
    #[default]
    Http,
    /// Generate quotes locally.
    Simulated,
}

impl SourceKind {
    /// Parse a source kind, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "simulated" | "sim" => Some(Self::Simulated),
            _ => None,
        }
    }

    /// Get the source kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Simulated => "simulated",
        }
    }
}

/// Record source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Which source to poll.
    pub kind: SourceKind,
    /// Quote endpoint for the HTTP source.
    pub url: String,
    /// Request timeout for the HTTP source.
    pub http_timeout: Duration,
    /// Instruments produced by the simulated source.
    pub symbols: Vec<String>,
    /// Seed for a reproducible simulated feed.
    pub sim_seed: Option<u64>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            url: "http://localhost:8080/query?id=1".to_string(),
            http_timeout: Duration::from_millis(1_000),
            symbols: vec!["ABC".to_string(), "DEF".to_string()],
            sim_seed: None,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Control and health HTTP port.
    pub control_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { control_port: 8082 }
    }
}

/// Complete streamer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Interval between polls.
    pub cadence: Duration,
    /// Record source settings.
    pub source: SourceSettings,
    /// Server settings.
    pub server: ServerSettings,
    /// Capacity of the stream event channel.
    pub events_capacity: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_CADENCE,
            source: SourceSettings::default(),
            server: ServerSettings::default(),
            events_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl StreamerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to defaults. Set keys must parse.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or is out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cadence = parse_or("QUOTE_STREAM_CADENCE_MS", &lookup, defaults.cadence, |v| {
            v.parse::<u64>().ok().map(Duration::from_millis)
        })?;
        if cadence.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_STREAM_CADENCE_MS".to_string(),
                value: "0".to_string(),
            });
        }

        let kind = parse_or("QUOTE_STREAM_SOURCE", &lookup, defaults.source.kind, SourceKind::parse)?;

        let url = match lookup("QUOTE_STREAM_SOURCE_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("QUOTE_STREAM_SOURCE_URL".to_string()));
            }
            Some(url) => url,
            None => defaults.source.url,
        };

        let http_timeout = parse_or(
            "QUOTE_STREAM_HTTP_TIMEOUT_MS",
            &lookup,
            defaults.source.http_timeout,
            |v| v.parse::<u64>().ok().map(Duration::from_millis),
        )?;

        let symbols = match lookup("QUOTE_STREAM_SYMBOLS") {
            Some(raw) => {
                let symbols = parse_symbols(&raw);
                if symbols.is_empty() {
                    return Err(ConfigError::EmptyValue("QUOTE_STREAM_SYMBOLS".to_string()));
                }
                symbols
            }
            None => defaults.source.symbols,
        };

        let sim_seed = match lookup("QUOTE_STREAM_SIM_SEED") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "QUOTE_STREAM_SIM_SEED".to_string(),
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        let server = ServerSettings {
            control_port: parse_or(
                "QUOTE_STREAM_CONTROL_PORT",
                &lookup,
                defaults.server.control_port,
                |v| v.parse().ok(),
            )?,
        };

        let events_capacity = parse_or(
            "QUOTE_STREAM_SNAPSHOT_CAPACITY",
            &lookup,
            defaults.events_capacity,
            |v| v.parse::<usize>().ok().filter(|n| *n > 0),
        )?;

        Ok(Self {
            cadence,
            source: SourceSettings {
                kind,
                url,
                http_timeout,
                symbols,
                sim_seed,
            },
            server,
            events_capacity,
        })
    }

    /// Binder options derived from this configuration.
    #[must_use]
    pub const fn binder_config(&self) -> BinderConfig {
        BinderConfig {
            scheduler: SchedulerConfig::new(self.cadence),
            events_capacity: self.events_capacity,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_or<T, F, P>(key: &str, lookup: &F, default: T, parse: P) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).ok_or(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
