use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Btc,
    Eth,
    Usdt,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Btc, Currency::Eth, Currency::Usdt];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Btc => "btc",
            Currency::Eth => "eth",
            Currency::Usdt => "usdt",
        }
    }

    /// Identifier used by the CoinGecko price API.
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            Currency::Btc => "bitcoin",
            Currency::Eth => "ethereum",
            Currency::Usdt => "tether",
        }
    }

    pub fn mock_wallet_address(&self) -> &'static str {
        match self {
            Currency::Btc => "1KMu1aYqv1N1Jn8YEqDYgAEYyVUnmieeQm",
            Currency::Eth | Currency::Usdt => "0x73265524c5f9390fa731d72a3565b034a7c2e254",
        }
    }

    pub fn starter_balance(&self) -> f64 {
        match self {
            Currency::Btc => 0.012345,
            Currency::Eth => 0.3456,
            Currency::Usdt => 123.45,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btc" => Ok(Currency::Btc),
            "eth" => Ok(Currency::Eth),
            "usdt" => Ok(Currency::Usdt),
            _ => Err(UnsupportedCurrency(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Receive,
    Send,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub currency: Currency,
    pub amount: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Receive => self.amount,
            TransactionKind::Send => -self.amount,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of checking a cached balance against its ledger.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reconciliation {
    pub currency: Currency,
    pub cached: f64,
    pub recomputed: f64,
}

impl Reconciliation {
    pub fn drift(&self) -> f64 {
        self.cached - self.recomputed
    }

    pub fn is_consistent(&self) -> bool {
        self.drift().abs() < 1e-9
    }
}
