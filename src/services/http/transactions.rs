use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{dispatch, parse_currency, ApiError, Channels};
use crate::models::transactions::{NewTransaction, Reconciliation, Transaction};
use crate::services::transactions::TransactionServiceRequest;
use crate::utils;

const SERVICE: &str = "Transactions";

pub async fn balance(
    State(channels): State<Channels>,
    Path(currency): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let currency = parse_currency(&currency)?;
    let balance = dispatch(&channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::GetBalance { currency, response }
    })
    .await?;

    Ok(Json(json!({ "currency": currency, "balance": balance })))
}

pub async fn transactions(
    State(channels): State<Channels>,
    Path(currency): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let currency = parse_currency(&currency)?;
    let transactions = dispatch(&channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::GetTransactions { currency, response }
    })
    .await?;

    Ok(Json(transactions))
}

pub async fn add_transaction(
    State(channels): State<Channels>,
    Path(currency): Path<String>,
    Json(transaction): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let currency = parse_currency(&currency)?;
    let transaction = dispatch(&channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::AddTransaction {
            currency,
            transaction,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn reconcile(
    State(channels): State<Channels>,
    Path(currency): Path<String>,
) -> Result<Json<Reconciliation>, ApiError> {
    let currency = parse_currency(&currency)?;
    let reconciliation = dispatch(&channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::Reconcile { currency, response }
    })
    .await?;

    Ok(Json(reconciliation))
}

pub async fn random_address() -> Json<Value> {
    Json(json!({ "address": utils::random_btc_address() }))
}
