//! Mock Price Sampler
//! Mission: Keep the price store populated without a market data feed
//!
//! Every tick of the interval draws one price per symbol (base price with
//! uniform ±5% jitter, whole rupees) and appends the batch in one unit of work.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::models::PriceTick;
use crate::store::PriceStore;

/// Base price used for a symbol without its own entry.
pub const FALLBACK_BASE_PRICE: Decimal = dec!(1000);

/// Maximum jitter in basis points (±5%).
const JITTER_BPS: i64 = 500;

pub const DEFAULT_SYMBOLS: &[&str] = &[
    "RELIANCE", "TCS", "INFY", "HDFC", "ICICI", "ADANI", "AXIS", "KOTAK", "MAHINDRA", "CISCO",
    "WIPRO", "LT", "BAJAJ", "BHARTI", "VEDANTA",
];

pub fn base_price(symbol: &str) -> Decimal {
    match symbol {
        "RELIANCE" => dec!(2600),
        "TCS" => dec!(3300),
        "INFY" => dec!(1500),
        "HDFC" => dec!(2500),
        "ADANI" => dec!(2000),
        "AXIS" => dec!(700),
        "KOTAK" => dec!(1800),
        "MAHINDRA" => dec!(900),
        "CISCO" => dec!(4500),
        "WIPRO" => dec!(400),
        "LT" => dec!(1800),
        "BAJAJ" => dec!(3500),
        "BHARTI" => dec!(700),
        "VEDANTA" => dec!(300),
        _ => FALLBACK_BASE_PRICE,
    }
}

/// `base` moved by a uniform draw in ±5%, rounded half away from zero to whole rupees.
pub fn jittered_price<R: Rng>(base: Decimal, rng: &mut R) -> Decimal {
    let bps = Decimal::from(10_000 + rng.gen_range(-JITTER_BPS..=JITTER_BPS));
    (base * bps / dec!(10000)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone)]
pub struct PriceSampler {
    prices: PriceStore,
    symbols: Vec<String>,
    every: Duration,
}

impl PriceSampler {
    pub fn new(prices: PriceStore, every: Duration) -> Self {
        Self {
            prices,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            every,
        }
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn sample<R: Rng>(&self, rng: &mut R, fetched_at: DateTime<Utc>) -> Vec<PriceTick> {
        self.symbols
            .iter()
            .map(|symbol| PriceTick {
                stock_symbol: symbol.clone(),
                price_inr: jittered_price(base_price(symbol), rng),
                fetched_at,
            })
            .collect()
    }

    /// Draw one batch and append it.
    pub fn sample_once(&self) -> LedgerResult<usize> {
        let mut rng = StdRng::from_entropy();
        let ticks = self.sample(&mut rng, Utc::now());
        self.prices.append_batch(&ticks)
    }

    /// Sample immediately, then once per interval, forever.
    pub async fn run(self) {
        info!(
            "📈 Starting mock price sampler ({} symbols, every {}s)",
            self.symbols.len(),
            self.every.as_secs()
        );
        let mut ticker = interval(self.every);

        loop {
            ticker.tick().await;

            let sampler = self.clone();
            match tokio::task::spawn_blocking(move || sampler.sample_once()).await {
                Ok(Ok(count)) => debug!(ticks = count, "Mock prices appended"),
                Ok(Err(e)) => warn!("⚠️  Mock price append failed (non-critical): {}", e),
                Err(e) => warn!("⚠️  Mock price task aborted: {}", e),
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use tempfile::NamedTempFile;

    fn create_test_sampler() -> (PriceSampler, PriceStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Store::open(temp_file.path().to_str().unwrap()).unwrap();
        let prices = PriceStore::new(store);
        let sampler = PriceSampler::new(prices.clone(), Duration::from_secs(3600));
        (sampler, prices, temp_file)
    }

    #[test]
    fn test_jitter_stays_within_five_percent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let price = jittered_price(dec!(2600), &mut rng);
            assert!(price >= dec!(2470) && price <= dec!(2730), "price {}", price);
            assert_eq!(price, price.trunc());
        }
    }

    #[test]
    fn test_unknown_symbol_uses_fallback_base() {
        assert_eq!(base_price("TCS"), dec!(3300));
        assert_eq!(base_price("ICICI"), FALLBACK_BASE_PRICE);
        assert_eq!(base_price("SOMETHING"), FALLBACK_BASE_PRICE);
    }

    #[test]
    fn test_sample_emits_one_tick_per_symbol() {
        let (sampler, _prices, _temp) = create_test_sampler();
        let sampler = sampler.with_symbols(vec!["TCS".into(), "VEDANTA".into()]);
        let now = Utc::now();

        let ticks = sampler.sample(&mut StdRng::seed_from_u64(1), now);
        assert_eq!(ticks.len(), 2);
        assert!(ticks.iter().all(|t| t.fetched_at == now));
        assert_eq!(ticks[1].stock_symbol, "VEDANTA");
        assert!(ticks[1].price_inr >= dec!(285) && ticks[1].price_inr <= dec!(315));
    }

    #[test]
    fn test_sample_once_populates_every_default_symbol() {
        let (sampler, prices, _temp) = create_test_sampler();
        assert_eq!(sampler.sample_once().unwrap(), DEFAULT_SYMBOLS.len());

        for symbol in DEFAULT_SYMBOLS {
            assert!(prices.latest_price(symbol).is_ok(), "no price for {}", symbol);
        }
    }

    #[tokio::test]
    async fn test_spawned_sampler_samples_on_start() {
        let (sampler, prices, _temp) = create_test_sampler();
        let handle = sampler
            .with_symbols(vec!["INFY".into()])
            .spawn();

        let mut found = false;
        for _ in 0..50 {
            if prices.latest_price("INFY").is_ok() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(found);
    }
}
