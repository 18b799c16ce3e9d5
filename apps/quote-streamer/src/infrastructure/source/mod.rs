//! Record Source Adapters
//!
//! Implementations of [`RecordSource`](crate::application::ports::RecordSource):
//!
//! - [`HttpRecordSource`]: polls a JSON quote endpoint
//! - [`SimulatedSource`]: generates a bounded random-walk feed offline

mod http;
mod simulated;

use std::sync::Arc;

use chrono::Utc;

pub use http::{HttpRecordSource, decode_batch};
pub use simulated::{SimulatedConfig, SimulatedSource, WalkBounds};

use crate::application::ports::{SharedRecordSource, SourceError};
use crate::domain::quote::Symbol;
use crate::infrastructure::config::{SourceKind, SourceSettings};

/// Build the record source selected by configuration.
///
/// # Errors
///
/// Returns [`SourceError::Transport`] if the HTTP client cannot be built.
pub fn from_settings(settings: &SourceSettings) -> Result<SharedRecordSource, SourceError> {
    match settings.kind {
        SourceKind::Http => Ok(Arc::new(HttpRecordSource::new(
            settings.url.clone(),
            settings.http_timeout,
        )?)),
        SourceKind::Simulated => {
            let config = SimulatedConfig {
                symbols: settings.symbols.iter().map(Symbol::new).collect(),
                seed: settings.sim_seed,
                ..SimulatedConfig::default()
            };
            Ok(Arc::new(SimulatedSource::new(config, Utc::now())))
        }
    }
}
