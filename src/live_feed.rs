//! Demo live price feed.
//!
//! One task draws a random symbol and price on every tick and broadcasts it to
//! all WebSocket subscribers. With a seed the sequence of (symbol, price) is
//! reproducible, which the tests rely on.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Symbols quoted by the demo feed.
pub const DEMO_SYMBOLS: [&str; 5] = ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"];

/// Buffered ticks per subscriber before a slow client starts skipping.
const CHANNEL_CAPACITY: usize = 64;

/// Configuration for the tick generator.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    pub symbols: Vec<String>,
    pub interval: Duration,
    /// Price range in cents, half-open: `[min_cents, max_cents)`.
    pub min_cents: i64,
    pub max_cents: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            seed: None,
            symbols: DEMO_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            interval: Duration::from_millis(3000),
            min_cents: 10_000,
            max_cents: 20_000,
        }
    }
}

/// One price update as sent over the socket.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceTick {
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol: String,
    /// Two decimal places; serialized as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

pub const TICK_KIND: &str = "liveStockUpdate";

/// Deterministic (symbol, price) stream. Same seed ⇒ same sequence.
pub struct TickGenerator {
    rng: StdRng,
    config: FeedConfig,
}

impl TickGenerator {
    pub fn new(config: FeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, config }
    }

    /// Next tick, stamped with the current time.
    pub fn next_tick(&mut self) -> PriceTick {
        let symbol = if self.config.symbols.is_empty() {
            DEMO_SYMBOLS[0].to_string()
        } else {
            let i = self.rng.gen_range(0..self.config.symbols.len());
            self.config.symbols[i].clone()
        };
        let max = self.config.max_cents.max(self.config.min_cents + 1);
        let cents = self.rng.gen_range(self.config.min_cents..max);
        PriceTick {
            kind: TICK_KIND.to_string(),
            symbol,
            price: Decimal::new(cents, 2),
            timestamp: Utc::now(),
        }
    }
}

/// Handle for subscribing to the running feed. Cheap to clone.
#[derive(Clone)]
pub struct LiveFeed {
    tx: broadcast::Sender<PriceTick>,
}

impl LiveFeed {
    pub fn subscribe(&self) -> broadcast::Receiver<PriceTick> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Starts the generator task. It stops when `shutdown` flips to `true`.
pub fn spawn_feed(config: FeedConfig, mut shutdown: watch::Receiver<bool>) -> (LiveFeed, JoinHandle<()>) {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    let feed = LiveFeed { tx: tx.clone() };
    let interval = config.interval;
    let handle = tokio::spawn(async move {
        let mut generator = TickGenerator::new(config);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("live feed started interval_ms={}", interval.as_millis());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let tick = generator.next_tick();
                    // Err only means nobody is listening right now.
                    if let Ok(n) = tx.send(tick.clone()) {
                        debug!("tick symbol={} price={} subscribers={}", tick.symbol, tick.price, n);
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
        info!("live feed stopped");
    });
    (feed, handle)
}
