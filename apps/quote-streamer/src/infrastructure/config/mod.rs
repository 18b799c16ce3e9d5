//! Configuration Module
//!
//! Environment-driven configuration for the quote streamer.

mod settings;

pub use settings::{ConfigError, ServerSettings, SourceKind, SourceSettings, StreamerConfig};
