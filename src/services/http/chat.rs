use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};

use super::{dispatch, ApiError, Channels};
use crate::models::chat::{ChatMessage, NewChatMessage};
use crate::models::server::admin::ReadFilter;
use crate::services::chat::ChatRequest;

const SERVICE: &str = "Chat";

pub async fn messages(State(channels): State<Channels>) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = dispatch(&channels.chat, SERVICE, |response| ChatRequest::Messages {
        response,
    })
    .await?;

    Ok(Json(messages))
}

pub async fn send(
    State(channels): State<Channels>,
    Json(message): Json<NewChatMessage>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = dispatch(&channels.chat, SERVICE, |response| ChatRequest::Send {
        message,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn clear(State(channels): State<Channels>) -> Result<StatusCode, ApiError> {
    dispatch(&channels.chat, SERVICE, |response| ChatRequest::Clear { response }).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_read(
    State(channels): State<Channels>,
    Json(filter): Json<ReadFilter>,
) -> Result<Json<Value>, ApiError> {
    let updated = dispatch(&channels.chat, SERVICE, |response| ChatRequest::MarkRead {
        user_id: filter.user_id,
        response,
    })
    .await?;

    Ok(Json(json!({ "updated": updated })))
}

pub async fn conversation_meta(
    State(channels): State<Channels>,
    Path(conversation): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let meta = dispatch(&channels.chat, SERVICE, |response| ChatRequest::GetMeta {
        conversation,
        response,
    })
    .await?;

    Ok(Json(meta))
}

pub async fn set_conversation_meta(
    State(channels): State<Channels>,
    Path(conversation): Path<String>,
    Json(meta): Json<Map<String, Value>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let meta = dispatch(&channels.chat, SERVICE, |response| ChatRequest::SetMeta {
        conversation,
        meta,
        response,
    })
    .await?;

    Ok(Json(meta))
}
