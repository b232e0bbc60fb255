use std::future::Future;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::branding::BrandingRequest;
use super::chat::ChatRequest;
use super::price::PriceRequest;
use super::requests::QueueRequest;
use super::transactions::TransactionServiceRequest;
use super::users::UserRequest;
use super::ServiceError;
use crate::models::transactions::Currency;

mod branding;
mod chat;
mod price;
mod requests;
mod transactions;
mod users;

#[derive(Clone)]
pub struct Channels {
    pub users: mpsc::Sender<UserRequest>,
    pub transactions: mpsc::Sender<TransactionServiceRequest>,
    pub requests: mpsc::Sender<QueueRequest>,
    pub chat: mpsc::Sender<ChatRequest>,
    pub price: mpsc::Sender<PriceRequest>,
    pub branding: mpsc::Sender<BrandingRequest>,
}

#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ExternalService(_, _) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Repository(_, _) | ServiceError::Communication(_, _) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                log::error!("Request failed: {}", self.0);
                "Internal server error.".to_string()
            }
            _ => self.0.to_string(),
        };

        (status, Json(json!({ "description": description }))).into_response()
    }
}

/// Sends one request to a service loop and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    build: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ApiError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    let result = response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    Ok(result?)
}

fn parse_currency(raw: &str) -> Result<Currency, ApiError> {
    raw.parse::<Currency>()
        .map_err(|e| ServiceError::ValidationFailed(e.to_string()).into())
}

fn router(channels: Channels) -> Router {
    Router::new()
        .route("/users", post(users::register).get(users::all_accounts))
        .route(
            "/session",
            post(users::login).get(users::current_user).delete(users::logout),
        )
        .route("/users/me", put(users::update_profile))
        .route("/users/me/password", put(users::change_password))
        .route("/users/me/verification", post(users::submit_verification))
        .route("/users/{id}/verification", put(users::set_verified))
        .route("/users/{id}/notifications", get(users::notifications))
        .route("/notifications/{id}/read", post(users::mark_notification_read))
        .route("/password-reset", post(users::send_reset))
        .route("/wallet/address", get(transactions::random_address))
        .route("/wallet/{currency}/balance", get(transactions::balance))
        .route(
            "/wallet/{currency}/transactions",
            get(transactions::transactions).post(transactions::add_transaction),
        )
        .route("/wallet/{currency}/reconcile", get(transactions::reconcile))
        .route(
            "/requests/deposits",
            post(requests::add_deposit).get(requests::all_deposits),
        )
        .route(
            "/requests/withdrawals",
            post(requests::add_withdrawal).get(requests::all_withdrawals),
        )
        .route("/requests/deposits/{id}/status", put(requests::update_deposit_status))
        .route(
            "/requests/withdrawals/{id}/status",
            put(requests::update_withdrawal_status),
        )
        .route(
            "/chat",
            get(chat::messages).post(chat::send).delete(chat::clear),
        )
        .route("/chat/read", post(chat::mark_read))
        .route(
            "/chat/meta/{conversation}",
            get(chat::conversation_meta).patch(chat::set_conversation_meta),
        )
        .route("/branding", get(branding::branding))
        .route("/branding/dark-mode", put(branding::set_dark_mode))
        .route(
            "/branding/{asset}",
            get(branding::asset).put(branding::set_asset),
        )
        .route("/rates", get(price::status))
        .route("/rates/refresh", post(price::refresh))
        .route("/rates/{currency}/usd", get(price::convert))
        .route("/health", get(|| async { "OK" }))
        .with_state(channels)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    address: &str,
    channels: Channels,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(channels))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
