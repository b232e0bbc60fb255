use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::price::{RateSnapshot, RateStatus};
use crate::models::transactions::Currency;
use crate::repositories::price::PriceRepository;

pub enum PriceRequest {
    GetStatus {
        response: oneshot::Sender<Result<RateStatus, ServiceError>>,
    },
    Convert {
        amount: f64,
        currency: Currency,
        response: oneshot::Sender<Result<f64, ServiceError>>,
    },
    Display {
        amount: f64,
        currency: Currency,
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
    Refresh {
        response: oneshot::Sender<Result<RateSnapshot, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct PriceRequestHandler {
    price_repository: PriceRepository,
    max_age: chrono::Duration,
}

impl PriceRequestHandler {
    /// Rates older than `max_age` are reported as stale.
    pub fn new(price_repository: PriceRepository, max_age: Duration) -> Self {
        PriceRequestHandler {
            price_repository,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
        }
    }
}

#[async_trait]
impl RequestHandler<PriceRequest> for PriceRequestHandler {
    async fn handle_request(&self, request: PriceRequest) {
        match request {
            PriceRequest::GetStatus { response } => {
                let snapshot = self.price_repository.snapshot().await;
                let _ = response.send(Ok(RateStatus::new(snapshot, self.max_age, Utc::now())));
            }
            PriceRequest::Convert {
                amount,
                currency,
                response,
            } => {
                let usd = self.price_repository.convert_to_usd(amount, currency).await;
                let _ = response.send(Ok(usd));
            }
            PriceRequest::Display {
                amount,
                currency,
                response,
            } => {
                let text = self.price_repository.display_usd(amount, currency).await;
                let _ = response.send(Ok(text));
            }
            PriceRequest::Refresh { response } => {
                let result = self.price_repository.fetch_prices().await.map_err(|e| {
                    log::error!("Manual rate refresh failed: {}", e);
                    ServiceError::ExternalService("CoinGecko".to_string(), e.to_string())
                });
                let _ = response.send(result);
            }
        }
    }
}

pub struct PriceService;

impl PriceService {
    pub fn new() -> Self {
        PriceService {}
    }
}

#[async_trait]
impl Service<PriceRequest, PriceRequestHandler> for PriceService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::create_test_store;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_refresh_failure_is_external_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let (store, _temp) = create_test_store();
        let handler = PriceRequestHandler::new(
            PriceRepository::new(mock_server.uri(), store).unwrap(),
            Duration::from_secs(300),
        );

        let (response, reply) = oneshot::channel();
        handler.handle_request(PriceRequest::Refresh { response }).await;
        assert!(matches!(
            reply.await.unwrap(),
            Err(ServiceError::ExternalService(_, _))
        ));

        let (response, reply) = oneshot::channel();
        handler
            .handle_request(PriceRequest::Display {
                amount: 1.0,
                currency: Currency::Btc,
                response,
            })
            .await;
        assert_eq!(reply.await.unwrap().unwrap(), "Loading...");

        let (response, reply) = oneshot::channel();
        handler.handle_request(PriceRequest::GetStatus { response }).await;
        let status = reply.await.unwrap().unwrap();
        assert!(!status.ready);
        assert!(status.stale);
    }
}
