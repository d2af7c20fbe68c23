use log::{error, warn};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Result, RouteError};
use crate::models::{PriceModifier, Vehicle};

/// Vehicle and pricing reference data needed to price a route.
pub trait ReferenceSource: Send + Sync {
    fn price_modifiers(&self) -> impl Future<Output = Result<Vec<PriceModifier>>> + Send;

    fn vehicle(&self, vehicle_id: Uuid) -> impl Future<Output = Result<Vehicle>> + Send;
}

/// Runs `operation` up to `attempts` times, sleeping `backoff` between tries,
/// as long as the failure is retryable.
pub async fn with_retry<T, F, Fut>(
    what: &str,
    attempts: u32,
    backoff: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what, attempt, attempts, e, backoff
                );
                attempt += 1;
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// HTTP client for the payment and car services.
#[derive(Debug, Clone)]
pub struct ReferenceClient {
    client: reqwest::Client,
    payment_service_url: String,
    car_service_url: String,
}

impl ReferenceClient {
    pub fn new(
        payment_service_url: impl Into<String>,
        car_service_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouteError::ReferenceDataUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            payment_service_url: payment_service_url.into().trim_end_matches('/').to_string(),
            car_service_url: car_service_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let unavailable = |e: reqwest::Error| {
            error!("Could not get {}: {}", what, e);
            RouteError::ReferenceDataUnavailable(format!("{}: {}", what, e))
        };

        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .json::<T>()
            .await
            .map_err(unavailable)
    }
}

impl ReferenceSource for ReferenceClient {
    async fn price_modifiers(&self) -> Result<Vec<PriceModifier>> {
        let request = self
            .client
            .get(format!("{}/getPrices", self.payment_service_url));
        self.get_json(request, "price modifiers from payment service")
            .await
    }

    async fn vehicle(&self, vehicle_id: Uuid) -> Result<Vehicle> {
        let request = self
            .client
            .get(format!("{}/vehicle", self.car_service_url))
            .query(&[("vehicleId", vehicle_id.to_string())]);
        self.get_json(request, &format!("vehicle {} from car service", vehicle_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let value = with_retry("flaky", 3, Duration::from_millis(1), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RouteError::ReferenceDataUnavailable("503".into()))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("down", 2, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RouteError::ReferenceDataUnavailable("refused".into()))
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), "ReferenceDataUnavailable");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn algorithmic_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("solve", 5, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RouteError::NoPath { start: 1, end: 2 })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_service_is_reference_data_unavailable() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let client =
            ReferenceClient::new("http://127.0.0.1:9", "http://127.0.0.1:9", Duration::from_millis(500))
                .unwrap();
        let err = client.vehicle(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "ReferenceDataUnavailable");
    }
}
