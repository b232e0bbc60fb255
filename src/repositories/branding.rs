use super::{read, write, Store, StoreError};
use crate::models::branding::{Branding, BrandingAsset};

const DARK_MODE_KEY: &str = "dark_mode";

/// Custom logo and favicon plus the dark-mode preference. Each is a single
/// key, so plain overwrites are enough.
#[derive(Clone)]
pub struct BrandingRepository {
    store: Store,
}

impl BrandingRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn asset(&self, asset: BrandingAsset) -> Result<Option<String>, StoreError> {
        read(&self.store.branding, asset.key())
    }

    pub fn set_asset(&self, asset: BrandingAsset, data_url: String) -> Result<(), StoreError> {
        if !data_url.starts_with("data:") {
            return Err(StoreError::ValidationFailed(format!(
                "Custom {} must be a data URL",
                asset
            )));
        }

        write(&self.store.branding, asset.key(), &data_url)?;
        log::info!("Custom {} updated ({} bytes)", asset, data_url.len());
        Ok(())
    }

    pub fn dark_mode(&self) -> Result<bool, StoreError> {
        Ok(read(&self.store.branding, DARK_MODE_KEY)?.unwrap_or(false))
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<(), StoreError> {
        write(&self.store.branding, DARK_MODE_KEY, &enabled)
    }

    pub fn branding(&self) -> Result<Branding, StoreError> {
        Ok(Branding {
            logo: self.asset(BrandingAsset::Logo)?,
            favicon: self.asset(BrandingAsset::Favicon)?,
            dark_mode: self.dark_mode()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::create_test_store;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_assets_round_trip_and_persist() {
        let (store, _temp) = create_test_store();
        let repository = BrandingRepository::new(store.clone());

        assert_eq!(repository.branding().unwrap(), Branding::default());

        repository.set_asset(BrandingAsset::Logo, PNG.to_string()).unwrap();
        repository.set_dark_mode(true).unwrap();

        let reopened = BrandingRepository::new(store);
        assert_eq!(reopened.asset(BrandingAsset::Logo).unwrap().as_deref(), Some(PNG));
        assert!(reopened.asset(BrandingAsset::Favicon).unwrap().is_none());
        assert!(reopened.dark_mode().unwrap());
    }

    #[test]
    fn test_asset_must_be_data_url() {
        let (store, _temp) = create_test_store();
        let repository = BrandingRepository::new(store);

        let result = repository.set_asset(BrandingAsset::Favicon, "https://x/icon.png".to_string());
        assert!(matches!(result, Err(StoreError::ValidationFailed(_))));
        assert!(repository.asset(BrandingAsset::Favicon).unwrap().is_none());
    }
}
