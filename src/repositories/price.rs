use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{read, write, Store, StoreError};
use crate::models::price::RateSnapshot;
use crate::models::transactions::Currency;

const RATES_KEY: &str = "crypto_rates";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Price request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected price response: {0}")]
    Malformed(String),
}

impl From<RateError> for StoreError {
    fn from(e: RateError) -> Self {
        StoreError::ExternalUnavailable(e.to_string())
    }
}

#[derive(Clone)]
pub struct PriceRepository {
    coingecko_url: String,
    client: reqwest::Client,
    price_cache: Arc<RwLock<RateSnapshot>>,
    store: Store,
}

impl PriceRepository {
    /// Starts from the persisted rates, if any, so the cache can be ready
    /// before the first fetch completes.
    pub fn new(coingecko_url: String, store: Store) -> Result<Self, RateError> {
        let cached = match read::<RateSnapshot>(&store.rates, RATES_KEY) {
            Ok(Some(snapshot)) => {
                log::info!("Loaded cached rates from {:?}", snapshot.updated_at);
                snapshot
            }
            Ok(None) => RateSnapshot::default(),
            Err(e) => {
                log::warn!("Ignoring cached rates: {}", e);
                RateSnapshot::default()
            }
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            coingecko_url,
            client,
            price_cache: Arc::new(RwLock::new(cached)),
            store,
        })
    }

    pub async fn snapshot(&self) -> RateSnapshot {
        self.price_cache.read().await.clone()
    }

    pub async fn get_rate(&self, currency: Currency) -> f64 {
        self.price_cache.read().await.rate(currency)
    }

    /// USDT is pegged, so its amount is returned as is.
    pub async fn convert_to_usd(&self, amount: f64, currency: Currency) -> f64 {
        match currency {
            Currency::Usdt => amount,
            _ => amount * self.get_rate(currency).await,
        }
    }

    /// `Loading...` until a fetch has succeeded at least once.
    pub async fn display_usd(&self, amount: f64, currency: Currency) -> String {
        if !self.price_cache.read().await.is_ready() {
            return "Loading...".to_string();
        }

        format_usd(self.convert_to_usd(amount, currency).await)
    }

    /// Fetches USD prices once. Currencies missing from the response keep
    /// their previous rate; a response with none of them is an error and
    /// leaves the cache untouched.
    pub async fn fetch_prices(&self) -> Result<RateSnapshot, RateError> {
        let ids: Vec<&str> = Currency::ALL.iter().map(|c| c.coingecko_id()).collect();
        let prices: serde_json::Value = self
            .client
            .get(format!("{}/api/v3/simple/price", self.coingecko_url))
            .query(&[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        log::debug!("Fetched prices from Coingecko: {:?}", prices);

        let fetched: Vec<(Currency, f64)> = Currency::ALL
            .iter()
            .filter_map(|c| {
                prices[c.coingecko_id()]["usd"]
                    .as_f64()
                    .filter(|rate| *rate > 0.0)
                    .map(|rate| (*c, rate))
            })
            .collect();

        if fetched.is_empty() {
            return Err(RateError::Malformed(prices.to_string()));
        }

        let snapshot = {
            let mut cache = self.price_cache.write().await;
            cache.rates.extend(fetched);
            cache.updated_at = Some(Utc::now());
            cache.clone()
        };

        if let Err(e) = write(&self.store.rates, RATES_KEY, &snapshot) {
            log::warn!("Could not persist rates: {}", e);
        }

        Ok(snapshot)
    }

    /// Fetches immediately, then every `interval`. Consecutive failures back
    /// off exponentially up to `max_backoff`. Stops when `cancel` fires.
    pub fn start_price_fetch_task(
        &self,
        interval: Duration,
        max_backoff: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let repository = self.clone();

        let handle = tokio::spawn(async move {
            let mut failures: u32 = 0;

            loop {
                let result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = repository.fetch_prices() => result,
                };

                let delay = match result {
                    Ok(_) => {
                        failures = 0;
                        log::info!("Fetched prices.");
                        interval
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        let delay = backoff_delay(interval, max_backoff, failures);
                        log::error!(
                            "Error updating price cache ({} in a row, next try in {:?}): {}",
                            failures,
                            delay,
                            e
                        );
                        delay
                    }
                };

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            log::info!("Price fetch task stopped");
        });

        log::info!("Price fetch task started");
        handle
    }
}

fn backoff_delay(interval: Duration, max_backoff: Duration, failures: u32) -> Duration {
    let doublings = failures.min(MAX_BACKOFF_DOUBLINGS);
    interval
        .saturating_mul(1u32 << doublings)
        .min(max_backoff)
        .max(interval)
}

/// Formats like `$1,234.56`; negative amounts get a leading minus.
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0.00".to_string();
    }

    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
