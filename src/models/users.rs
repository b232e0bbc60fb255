use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::requests::{DepositRequest, WithdrawalRequest};
use super::transactions::{Currency, Transaction};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Verification {
    pub ssn: String,
    pub file_name: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub credential: Credential,
    pub phone: String,
    pub country: String,
    pub verified: bool,
    pub verification_pending: bool,
    pub verification: Option<Verification>,
    pub wallet: BTreeMap<Currency, String>,
    pub opening_balances: BTreeMap<Currency, f64>,
    pub balances: BTreeMap<Currency, f64>,
    pub transactions: BTreeMap<Currency, Vec<Transaction>>,
    #[serde(default)]
    pub deposit_requests: Vec<DepositRequest>,
    #[serde(default)]
    pub withdrawal_requests: Vec<WithdrawalRequest>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn balance(&self, currency: Currency) -> f64 {
        self.balances.get(&currency).copied().unwrap_or(0.0)
    }

    pub fn transactions(&self, currency: Currency) -> &[Transaction] {
        self.transactions
            .get(&currency)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Account as handed out to callers: the credential never leaves the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub verified: bool,
    pub verification_pending: bool,
    pub wallet: BTreeMap<Currency, String>,
    pub balances: BTreeMap<Currency, f64>,
    pub transactions: BTreeMap<Currency, Vec<Transaction>>,
    pub deposit_requests: Vec<DepositRequest>,
    pub withdrawal_requests: Vec<WithdrawalRequest>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            phone: account.phone,
            country: account.country,
            verified: account.verified,
            verification_pending: account.verification_pending,
            wallet: account.wallet,
            balances: account.balances,
            transactions: account.transactions,
            deposit_requests: account.deposit_requests,
            withdrawal_requests: account.withdrawal_requests,
            created_at: account.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerificationSubmission {
    pub ssn: String,
    pub file_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
