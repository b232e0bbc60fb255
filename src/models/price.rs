use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::transactions::Currency;

/// USD rates as last fetched, with the time of the fetch.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RateSnapshot {
    pub rates: BTreeMap<Currency, f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    pub fn is_ready(&self) -> bool {
        self.updated_at.is_some()
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.updated_at {
            Some(updated_at) => now - updated_at > max_age,
            None => true,
        }
    }

    pub fn rate(&self, currency: Currency) -> f64 {
        self.rates.get(&currency).copied().unwrap_or(0.0)
    }
}

/// What `/rates` reports: the snapshot plus whether it can be trusted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateStatus {
    #[serde(flatten)]
    pub snapshot: RateSnapshot,
    pub ready: bool,
    pub stale: bool,
}

impl RateStatus {
    pub fn new(snapshot: RateSnapshot, max_age: Duration, now: DateTime<Utc>) -> Self {
        RateStatus {
            ready: snapshot.is_ready(),
            stale: snapshot.is_stale(max_age, now),
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_follows_last_fetch() {
        let now = Utc::now();
        let never = RateSnapshot::default();
        assert!(!never.is_ready());
        assert!(never.is_stale(Duration::minutes(5), now));

        let fresh = RateSnapshot {
            rates: BTreeMap::from([(Currency::Btc, 60000.0)]),
            updated_at: Some(now - Duration::minutes(1)),
        };
        assert!(!fresh.is_stale(Duration::minutes(5), now));
        assert!(fresh.is_stale(Duration::seconds(30), now));
        assert_eq!(fresh.rate(Currency::Btc), 60000.0);
        assert_eq!(fresh.rate(Currency::Eth), 0.0);

        let status = RateStatus::new(fresh, Duration::minutes(5), now);
        assert!(status.ready);
        assert!(!status.stale);
    }
}
