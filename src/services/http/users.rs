use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{dispatch, ApiError, Channels};
use crate::models::chat::Notification;
use crate::models::server::admin::{ResetRequest, VerificationDecision};
use crate::models::users::{
    AccountView, Credentials, NewAccount, PasswordChange, ProfileUpdate, VerificationSubmission,
};
use crate::services::users::UserRequest;

const SERVICE: &str = "Users";

pub async fn register(
    State(channels): State<Channels>,
    Json(account): Json<NewAccount>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| UserRequest::Register {
        account,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn all_accounts(
    State(channels): State<Channels>,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    let accounts = dispatch(&channels.users, SERVICE, |response| {
        UserRequest::AllAccounts { response }
    })
    .await?;

    Ok(Json(accounts))
}

pub async fn login(
    State(channels): State<Channels>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AccountView>, ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| UserRequest::Login {
        credentials,
        response,
    })
    .await?;

    Ok(Json(account))
}

pub async fn current_user(
    State(channels): State<Channels>,
) -> Result<Json<Option<AccountView>>, ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| {
        UserRequest::CurrentUser { response }
    })
    .await?;

    Ok(Json(account))
}

pub async fn logout(State(channels): State<Channels>) -> Result<StatusCode, ApiError> {
    dispatch(&channels.users, SERVICE, |response| UserRequest::Logout { response }).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(channels): State<Channels>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<AccountView>, ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| {
        UserRequest::UpdateProfile { update, response }
    })
    .await?;

    Ok(Json(account))
}

pub async fn change_password(
    State(channels): State<Channels>,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    dispatch(&channels.users, SERVICE, |response| {
        UserRequest::ChangePassword { change, response }
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_verification(
    State(channels): State<Channels>,
    Json(submission): Json<VerificationSubmission>,
) -> Result<Json<AccountView>, ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| {
        UserRequest::SubmitVerification {
            submission,
            response,
        }
    })
    .await?;

    Ok(Json(account))
}

pub async fn set_verified(
    State(channels): State<Channels>,
    Path(id): Path<String>,
    Json(decision): Json<VerificationDecision>,
) -> Result<Json<AccountView>, ApiError> {
    let account = dispatch(&channels.users, SERVICE, |response| UserRequest::SetVerified {
        id,
        verified: decision.verified,
        response,
    })
    .await?;

    Ok(Json(account))
}

pub async fn send_reset(
    State(channels): State<Channels>,
    Json(reset): Json<ResetRequest>,
) -> Result<Json<Value>, ApiError> {
    let sent = dispatch(&channels.users, SERVICE, |response| UserRequest::SendReset {
        email: reset.email,
        response,
    })
    .await?;

    Ok(Json(json!({ "sent": sent })))
}

pub async fn notifications(
    State(channels): State<Channels>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = dispatch(&channels.users, SERVICE, |response| {
        UserRequest::GetNotifications { user_id, response }
    })
    .await?;

    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(channels): State<Channels>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    dispatch(&channels.users, SERVICE, |response| {
        UserRequest::MarkNotificationRead { id, response }
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
