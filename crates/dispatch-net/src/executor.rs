//! Typed request executor
//!
//! `NetworkManager` sends a request, decodes the JSON body and maps every
//! failure to a `NetworkError`. Each attempt is rebuilt from scratch and passed
//! through the interceptor, so a replay after a token refresh picks up the new
//! access token. Callers never see the replay, only the final outcome.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, info_span, warn};

use crate::classify::{TransportFailure, classify};
use crate::coordinator::RetryDecision;
use crate::endpoint::Endpoint;
use crate::error::{NetworkError, Result};
use crate::interceptor::RequestInterceptor;
use crate::metrics;

/// Client for the dispatch API.
///
/// Holds one authenticated path (through the interceptor) and one plain path.
/// The plain path exists for calls that must not trigger a refresh, such as
/// the refresh call itself or login.
#[derive(Clone)]
pub struct NetworkManager {
    client: reqwest::Client,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
}

impl NetworkManager {
    pub fn new(client: reqwest::Client, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        Self {
            client,
            interceptor: Some(interceptor),
        }
    }

    /// Manager with no interceptor: no credentials, no refresh.
    pub fn unauthenticated(client: reqwest::Client) -> Self {
        Self {
            client,
            interceptor: None,
        }
    }

    /// Send an authenticated request and decode the JSON response body.
    pub async fn request<T, B>(
        &self,
        method: Method,
        endpoint: impl Endpoint,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self
            .execute(method, endpoint, body, self.interceptor.as_deref())
            .await?;
        decode(&bytes)
    }

    /// Authenticated `GET` decoding the JSON response body.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: impl Endpoint) -> Result<T> {
        self.request::<T, ()>(Method::GET, endpoint, None).await
    }

    /// Send an authenticated request whose response body is ignored.
    pub async fn send<B>(&self, method: Method, endpoint: impl Endpoint, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, endpoint, body, self.interceptor.as_deref())
            .await
            .map(|_| ())
    }

    /// Send a request that bypasses the interceptor and decode the response.
    pub async fn request_without_interceptor<T, B>(
        &self,
        method: Method,
        endpoint: impl Endpoint,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self.execute(method, endpoint, body, None).await?;
        decode(&bytes)
    }

    async fn execute<B>(
        &self,
        method: Method,
        endpoint: impl Endpoint,
        body: Option<&B>,
        interceptor: Option<&dyn RequestInterceptor>,
    ) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let url = endpoint.url();
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let span = info_span!("request", %request_id, %method, %url);

        let payload = match body {
            Some(body) => Some(serde_json::to_vec(body).map_err(|e| {
                NetworkError::Unknown(format!("failed to encode request body: {e}"))
            })?),
            None => None,
        };

        let result = self
            .run_attempts(&method, &url, payload, interceptor)
            .instrument(span)
            .await;
        metrics::record_request(result.as_ref().map(|_| ()));
        result
    }

    async fn run_attempts(
        &self,
        method: &Method,
        url: &str,
        payload: Option<Vec<u8>>,
        interceptor: Option<&dyn RequestInterceptor>,
    ) -> Result<Vec<u8>> {
        let mut retry_count = 0u32;

        loop {
            let mut request = self.build(method, url, payload.clone())?;
            if let Some(interceptor) = interceptor {
                interceptor.adapt(&mut request);
            }

            let attempt = request.try_clone().ok_or_else(|| {
                NetworkError::Unknown("request body cannot be replayed".into())
            })?;

            let (failure, status) = match self.client.execute(attempt).await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    return match response.bytes().await {
                        Ok(bytes) => {
                            debug!(status, retry_count, "request succeeded");
                            Ok(bytes.to_vec())
                        }
                        Err(e) => {
                            let error = classify(&TransportFailure::from(&e), None);
                            warn!(error = %error, "failed to read response body");
                            Err(error)
                        }
                    };
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    (TransportFailure::status(status), Some(status))
                }
                Err(e) => (TransportFailure::from(&e), None),
            };

            let error = classify(&failure, status);
            debug!(?status, retry_count, error = %error, "request attempt failed");

            let Some(interceptor) = interceptor else {
                return Err(error);
            };

            match interceptor
                .should_retry(&request, &error, status, retry_count)
                .await
            {
                RetryDecision::Retry => {
                    retry_count += 1;
                    debug!(retry_count, "replaying request");
                }
                RetryDecision::DoNotRetry => {
                    warn!(error = %error, "request failed after refresh round");
                    return Err(error);
                }
                RetryDecision::DoNotRetryWithError(error) => {
                    warn!(error = %error, "request failed");
                    return Err(error);
                }
            }
        }
    }

    fn build(&self, method: &Method, url: &str, payload: Option<Vec<u8>>) -> Result<reqwest::Request> {
        let mut builder = self.client.request(method.clone(), url);
        if let Some(payload) = payload {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }
        builder
            .build()
            .map_err(|e| NetworkError::Unknown(format!("invalid request: {e}")))
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(error = %e, "failed to decode response body");
        NetworkError::DecodingError
    })
}
