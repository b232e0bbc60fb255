use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Site images an admin can replace, stored as data URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandingAsset {
    Logo,
    Favicon,
}

impl BrandingAsset {
    pub fn key(&self) -> &'static str {
        match self {
            BrandingAsset::Logo => "custom_logo",
            BrandingAsset::Favicon => "custom_favicon",
        }
    }
}

impl fmt::Display for BrandingAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrandingAsset::Logo => f.write_str("logo"),
            BrandingAsset::Favicon => f.write_str("favicon"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown branding asset: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for BrandingAsset {
    type Err = UnknownAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "logo" => Ok(BrandingAsset::Logo),
            "favicon" => Ok(BrandingAsset::Favicon),
            _ => Err(UnknownAsset(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Branding {
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub dark_mode: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssetUpload {
    pub data_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DarkModeToggle {
    pub enabled: bool,
}
