use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::branding::{Branding, BrandingAsset};
use crate::repositories::branding::BrandingRepository;
use crate::repositories::{Store, StoreError};

type Response<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum BrandingRequest {
    GetBranding {
        response: Response<Branding>,
    },
    GetAsset {
        asset: BrandingAsset,
        response: Response<Option<String>>,
    },
    SetAsset {
        asset: BrandingAsset,
        data_url: String,
        response: Response<()>,
    },
    SetDarkMode {
        enabled: bool,
        response: Response<()>,
    },
}

#[derive(Clone)]
pub struct BrandingRequestHandler {
    repository: BrandingRepository,
}

impl BrandingRequestHandler {
    pub fn new(store: Store) -> Self {
        BrandingRequestHandler {
            repository: BrandingRepository::new(store),
        }
    }

    fn map_err(e: StoreError) -> ServiceError {
        ServiceError::from_store("Branding", e)
    }
}

#[async_trait]
impl RequestHandler<BrandingRequest> for BrandingRequestHandler {
    async fn handle_request(&self, request: BrandingRequest) {
        match request {
            BrandingRequest::GetBranding { response } => {
                let _ = response.send(self.repository.branding().map_err(Self::map_err));
            }
            BrandingRequest::GetAsset { asset, response } => {
                let _ = response.send(self.repository.asset(asset).map_err(Self::map_err));
            }
            BrandingRequest::SetAsset {
                asset,
                data_url,
                response,
            } => {
                let result = self.repository.set_asset(asset, data_url);
                let _ = response.send(result.map_err(Self::map_err));
            }
            BrandingRequest::SetDarkMode { enabled, response } => {
                let result = self.repository.set_dark_mode(enabled);
                let _ = response.send(result.map_err(Self::map_err));
            }
        }
    }
}

pub struct BrandingService;

impl BrandingService {
    pub fn new() -> Self {
        BrandingService {}
    }
}

#[async_trait]
impl Service<BrandingRequest, BrandingRequestHandler> for BrandingService {}
