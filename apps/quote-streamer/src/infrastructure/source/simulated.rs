//! Simulated Record Source
//!
//! Offline quote feed. Prices and spreads follow a bounded random walk per
//! symbol; the feed clock moves forward a random step on every fresh batch.
//! Some calls replay the previous batch unchanged, which is what a real
//! quote server does when nothing traded between polls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::quote::{BookLevel, QuoteRecord, Symbol};

/// Walk parameters: lower bound, upper bound, largest single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkBounds {
    /// Smallest value the walk produces.
    pub min: f64,
    /// Largest value the walk produces.
    pub max: f64,
    /// Largest change per step.
    pub step: f64,
}

impl WalkBounds {
    /// Create walk bounds.
    #[must_use]
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }
}

/// Simulated feed settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedConfig {
    /// Instruments to quote.
    pub symbols: Vec<Symbol>,
    /// Seed for a reproducible feed. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Price walk.
    pub price: WalkBounds,
    /// Spread walk.
    pub spread: WalkBounds,
    /// Chance that a call replays the previous batch.
    pub repeat_probability: f64,
    /// Largest clock advance between fresh batches.
    pub max_clock_step: Duration,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            symbols: vec![Symbol::new("ABC"), Symbol::new("DEF")],
            seed: None,
            price: WalkBounds::new(60.0, 150.0, 1.0),
            spread: WalkBounds::new(2.0, 6.0, 0.1),
            repeat_probability: 0.25,
            max_clock_step: Duration::from_millis(500),
        }
    }
}

/// Reflecting random walk confined to `[min, max]`.
#[derive(Debug, Clone)]
struct BoundedWalk {
    bounds: WalkBounds,
    position: f64,
}

impl BoundedWalk {
    fn new(bounds: WalkBounds, rng: &mut StdRng) -> Self {
        let range = (bounds.max - bounds.min).max(f64::EPSILON);
        Self {
            bounds,
            position: rng.random_range(0.0..range * 2.0),
        }
    }

    fn advance(&mut self, rng: &mut StdRng) -> f64 {
        let range = (self.bounds.max - self.bounds.min).max(f64::EPSILON);
        if self.bounds.step > 0.0 {
            self.position += rng.random_range(-self.bounds.step..=self.bounds.step);
        }
        (self.position.rem_euclid(range * 2.0) - range).abs() + self.bounds.min
    }
}

#[derive(Debug)]
struct SymbolState {
    symbol: Symbol,
    price: BoundedWalk,
    spread: BoundedWalk,
}

#[derive(Debug)]
struct FeedState {
    rng: StdRng,
    clock: DateTime<Utc>,
    symbols: Vec<SymbolState>,
    last_batch: Vec<QuoteRecord>,
}

/// Record source generating quotes locally.
#[derive(Debug)]
pub struct SimulatedSource {
    repeat_probability: f64,
    max_clock_step_ms: i64,
    state: Mutex<FeedState>,
}

impl SimulatedSource {
    /// Create a simulated source starting its clock at `start`.
    #[must_use]
    pub fn new(config: SimulatedConfig, start: DateTime<Utc>) -> Self {
        let mut rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let symbols = config
            .symbols
            .into_iter()
            .map(|symbol| SymbolState {
                symbol,
                price: BoundedWalk::new(config.price, &mut rng),
                spread: BoundedWalk::new(config.spread, &mut rng),
            })
            .collect();

        let max_clock_step_ms =
            i64::try_from(config.max_clock_step.as_millis()).unwrap_or(i64::MAX).max(1);

        Self {
            repeat_probability: config.repeat_probability.clamp(0.0, 1.0),
            max_clock_step_ms,
            state: Mutex::new(FeedState {
                rng,
                clock: start,
                symbols,
                last_batch: Vec::new(),
            }),
        }
    }

    /// Produce the next batch synchronously.
    #[must_use]
    pub fn next_batch(&self) -> Vec<QuoteRecord> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.last_batch.is_empty() && state.rng.random_bool(self.repeat_probability) {
            return state.last_batch.clone();
        }

        let step = state.rng.random_range(1..=self.max_clock_step_ms);
        state.clock += TimeDelta::milliseconds(step);

        let batch: Vec<QuoteRecord> = state
            .symbols
            .iter_mut()
            .map(|sym| {
                let mid = sym.price.advance(&mut state.rng);
                let spread = sym.spread.advance(&mut state.rng);
                let bid_size = state.rng.random_range(1..=200);
                let ask_size = state.rng.random_range(1..=200);
                QuoteRecord::new(sym.symbol.clone(), state.clock)
                    .with_top_bid(BookLevel::new(to_price(mid - spread / 2.0), bid_size))
                    .with_top_ask(BookLevel::new(to_price(mid + spread / 2.0), ask_size))
                    .with_price(to_price(mid))
            })
            .collect();

        state.last_batch.clone_from(&batch);
        batch
    }
}

#[async_trait]
impl RecordSource for SimulatedSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        Ok(self.next_batch())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default().round_dp(2)
}
