use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transactions::Currency;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => f.write_str("pending"),
            RequestStatus::Approved => f.write_str("approved"),
            RequestStatus::Rejected => f.write_str("rejected"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DepositRequest {
    pub id: String,
    pub method: String,
    pub amount: f64,
    /// Payment details specific to the method, e.g. a card reference.
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewDeposit {
    pub method: String,
    pub amount: f64,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BankDetails {
    pub account_name: String,
    pub bank_name: String,
    #[serde(default)]
    pub account_number: String,
}

/// Payout route of a withdrawal. Bank, PayPal and Cash App carry their
/// payment details; any other method is kept by name only.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "MethodFields", into = "MethodFields")]
pub enum WithdrawalMethod {
    Bank { account_details: BankDetails },
    Paypal { paypal_email: String },
    Cashapp { cashapp_tag: String },
    Other(String),
}

/// Flat wire shape: `method` plus whichever detail field belongs to it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct MethodFields {
    method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account_details: Option<BankDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paypal_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cashapp_tag: Option<String>,
}

impl TryFrom<MethodFields> for WithdrawalMethod {
    type Error = String;

    fn try_from(fields: MethodFields) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("{} withdrawal needs {}", fields.method, field);

        match fields.method.to_ascii_lowercase().as_str() {
            "" => Err("withdrawal method is required".to_string()),
            "bank" => fields
                .account_details
                .clone()
                .map(|account_details| WithdrawalMethod::Bank { account_details })
                .ok_or_else(|| missing("account_details")),
            "paypal" => fields
                .paypal_email
                .clone()
                .map(|paypal_email| WithdrawalMethod::Paypal { paypal_email })
                .ok_or_else(|| missing("paypal_email")),
            "cashapp" => fields
                .cashapp_tag
                .clone()
                .map(|cashapp_tag| WithdrawalMethod::Cashapp { cashapp_tag })
                .ok_or_else(|| missing("cashapp_tag")),
            _ => Ok(WithdrawalMethod::Other(fields.method.clone())),
        }
    }
}

impl From<WithdrawalMethod> for MethodFields {
    fn from(method: WithdrawalMethod) -> Self {
        match method {
            WithdrawalMethod::Bank { account_details } => MethodFields {
                method: "bank".to_string(),
                account_details: Some(account_details),
                ..Default::default()
            },
            WithdrawalMethod::Paypal { paypal_email } => MethodFields {
                method: "paypal".to_string(),
                paypal_email: Some(paypal_email),
                ..Default::default()
            },
            WithdrawalMethod::Cashapp { cashapp_tag } => MethodFields {
                method: "cashapp".to_string(),
                cashapp_tag: Some(cashapp_tag),
                ..Default::default()
            },
            WithdrawalMethod::Other(method) => MethodFields {
                method,
                ..Default::default()
            },
        }
    }
}

impl WithdrawalMethod {
    pub fn name(&self) -> &str {
        match self {
            WithdrawalMethod::Bank { .. } => "bank",
            WithdrawalMethod::Paypal { .. } => "paypal",
            WithdrawalMethod::Cashapp { .. } => "cashapp",
            WithdrawalMethod::Other(method) => method,
        }
    }

    /// Where the funds go, as shown to the admin.
    pub fn destination(&self) -> Option<String> {
        match self {
            WithdrawalMethod::Bank { account_details } => Some(format!(
                "{} ({})",
                account_details.account_name, account_details.bank_name
            )),
            WithdrawalMethod::Paypal { paypal_email } => Some(paypal_email.clone()),
            WithdrawalMethod::Cashapp { cashapp_tag } => Some(cashapp_tag.clone()),
            WithdrawalMethod::Other(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub amount: f64,
    pub currency: Currency,
    #[serde(flatten)]
    pub method: WithdrawalMethod,
    pub reference: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn summary(&self) -> String {
        let mut details = format!(
            "Withdrawal request: ${} via {}",
            self.amount,
            self.method.name()
        );
        if let Some(destination) = self.method.destination() {
            details.push_str(&format!(" to {}", destination));
        }
        if let Some(reference) = self.reference.as_deref().filter(|r| !r.is_empty()) {
            details.push_str(&format!(" (Note: {})", reference));
        }
        details
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    pub amount: f64,
    pub currency: Currency,
    #[serde(flatten)]
    pub method: WithdrawalMethod,
    pub reference: Option<String>,
}

/// A request joined with the account that owns it, for the admin listings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnedRequest<T> {
    #[serde(flatten)]
    pub request: T,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
}
