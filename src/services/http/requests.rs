use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{dispatch, ApiError, Channels};
use crate::models::requests::{
    DepositRequest, NewDeposit, NewWithdrawal, OwnedRequest, WithdrawalRequest,
};
use crate::models::server::admin::StatusUpdate;
use crate::services::requests::QueueRequest;
use crate::services::ServiceError;

const SERVICE: &str = "RequestQueue";

fn unknown_request(id: &str) -> ApiError {
    ServiceError::NotFound(format!("Request {}", id)).into()
}

pub async fn add_deposit(
    State(channels): State<Channels>,
    Json(deposit): Json<NewDeposit>,
) -> Result<(StatusCode, Json<DepositRequest>), ApiError> {
    let request = dispatch(&channels.requests, SERVICE, |response| QueueRequest::Deposit {
        deposit,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn add_withdrawal(
    State(channels): State<Channels>,
    Json(withdrawal): Json<NewWithdrawal>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), ApiError> {
    let request = dispatch(&channels.requests, SERVICE, |response| {
        QueueRequest::Withdrawal {
            withdrawal,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn all_deposits(
    State(channels): State<Channels>,
) -> Result<Json<Vec<OwnedRequest<DepositRequest>>>, ApiError> {
    let requests = dispatch(&channels.requests, SERVICE, |response| {
        QueueRequest::AllDeposits { response }
    })
    .await?;

    Ok(Json(requests))
}

pub async fn all_withdrawals(
    State(channels): State<Channels>,
) -> Result<Json<Vec<OwnedRequest<WithdrawalRequest>>>, ApiError> {
    let requests = dispatch(&channels.requests, SERVICE, |response| {
        QueueRequest::AllWithdrawals { response }
    })
    .await?;

    Ok(Json(requests))
}

/// An unknown id changes nothing and answers 404.
pub async fn update_deposit_status(
    State(channels): State<Channels>,
    Path(request_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<DepositRequest>, ApiError> {
    let id = request_id.clone();
    let request = dispatch(&channels.requests, SERVICE, |response| {
        QueueRequest::UpdateDepositStatus {
            request_id,
            status: update.status,
            response,
        }
    })
    .await?;

    request.map(Json).ok_or_else(|| unknown_request(&id))
}

pub async fn update_withdrawal_status(
    State(channels): State<Channels>,
    Path(request_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let id = request_id.clone();
    let request = dispatch(&channels.requests, SERVICE, |response| {
        QueueRequest::UpdateWithdrawalStatus {
            request_id,
            status: update.status,
            response,
        }
    })
    .await?;

    request.map(Json).ok_or_else(|| unknown_request(&id))
}
