use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{dispatch, ApiError, Channels};
use crate::models::branding::{AssetUpload, Branding, BrandingAsset, DarkModeToggle};
use crate::services::branding::BrandingRequest;
use crate::services::ServiceError;

const SERVICE: &str = "Branding";

fn parse_asset(raw: &str) -> Result<BrandingAsset, ApiError> {
    raw.parse::<BrandingAsset>()
        .map_err(|e| ServiceError::NotFound(e.to_string()).into())
}

pub async fn branding(State(channels): State<Channels>) -> Result<Json<Branding>, ApiError> {
    let branding = dispatch(&channels.branding, SERVICE, |response| {
        BrandingRequest::GetBranding { response }
    })
    .await?;

    Ok(Json(branding))
}

pub async fn asset(
    State(channels): State<Channels>,
    Path(asset): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let asset = parse_asset(&asset)?;
    let data_url = dispatch(&channels.branding, SERVICE, |response| {
        BrandingRequest::GetAsset { asset, response }
    })
    .await?;

    Ok(Json(json!({ "asset": asset, "data_url": data_url })))
}

pub async fn set_asset(
    State(channels): State<Channels>,
    Path(asset): Path<String>,
    Json(upload): Json<AssetUpload>,
) -> Result<StatusCode, ApiError> {
    let asset = parse_asset(&asset)?;
    dispatch(&channels.branding, SERVICE, |response| BrandingRequest::SetAsset {
        asset,
        data_url: upload.data_url,
        response,
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_dark_mode(
    State(channels): State<Channels>,
    Json(toggle): Json<DarkModeToggle>,
) -> Result<StatusCode, ApiError> {
    dispatch(&channels.branding, SERVICE, |response| {
        BrandingRequest::SetDarkMode {
            enabled: toggle.enabled,
            response,
        }
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
