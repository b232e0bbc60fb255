use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, parse_currency, ApiError, Channels};
use crate::models::price::{RateSnapshot, RateStatus};
use crate::services::price::PriceRequest;

const SERVICE: &str = "Price";

#[derive(Deserialize)]
pub struct AmountQuery {
    amount: f64,
}

pub async fn status(State(channels): State<Channels>) -> Result<Json<RateStatus>, ApiError> {
    let status = dispatch(&channels.price, SERVICE, |response| PriceRequest::GetStatus {
        response,
    })
    .await?;

    Ok(Json(status))
}

pub async fn refresh(State(channels): State<Channels>) -> Result<Json<RateSnapshot>, ApiError> {
    let snapshot = dispatch(&channels.price, SERVICE, |response| PriceRequest::Refresh {
        response,
    })
    .await?;

    Ok(Json(snapshot))
}

pub async fn convert(
    State(channels): State<Channels>,
    Path(currency): Path<String>,
    Query(query): Query<AmountQuery>,
) -> Result<Json<Value>, ApiError> {
    let currency = parse_currency(&currency)?;

    let usd = dispatch(&channels.price, SERVICE, |response| PriceRequest::Convert {
        amount: query.amount,
        currency,
        response,
    })
    .await?;
    let display = dispatch(&channels.price, SERVICE, |response| PriceRequest::Display {
        amount: query.amount,
        currency,
        response,
    })
    .await?;

    Ok(Json(json!({
        "currency": currency,
        "amount": query.amount,
        "usd": usd,
        "display": display,
    })))
}
