use crate::http::auth::AuthProvider;
use crate::http::errors::{BuildResult, ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::{Client, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Query parameters as owned pairs, in the order they should be signed.
pub type QueryParams = Vec<(&'static str, String)>;

struct AuthMiddleware {
    auth_provider: Arc<dyn AuthProvider>,
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.auth_provider
            .apply_auth(&mut req)
            .await
            .map_err(|e| reqwest_middleware::Error::Middleware(e.into()))?;

        next.run(req, extensions).await
    }
}

pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    auth_provider: Option<Arc<dyn AuthProvider>>,
}

impl HttpClientBuilder {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(10),
            max_retries: 2,
            auth_provider: None,
        }
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn auth_provider<T: AuthProvider + 'static>(mut self, provider: T) -> Self {
        self.auth_provider = Some(Arc::new(provider));
        self
    }

    pub fn build(self) -> BuildResult<TracedHttpClient> {
        let base_url = Url::parse(&self.base_url)?;
        let client = Client::builder().timeout(self.timeout).build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);

        // Retry is outermost so that each retry attempt is re-signed
        let mut builder = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy));

        if let Some(auth_provider) = self.auth_provider {
            builder = builder.with(AuthMiddleware { auth_provider });
        }

        Ok(TracedHttpClient {
            client: builder.build(),
            base_url,
        })
    }
}

#[derive(Clone)]
pub struct TracedHttpClient {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl TracedHttpClient {
    #[instrument(skip(self, query), fields(method = "GET", url = %path))]
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Response> {
        let url = self.build_url(path, query)?;
        debug!("Sending GET request to {}", url);

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    #[instrument(skip(self, body), fields(method = "POST", url = %path))]
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> ClientResult<Response> {
        let url = self.build_url(path, &[])?;
        debug!("Sending POST request to {}", url);

        let json_body = serde_json::to_string(body)?;

        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(json_body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self, query), fields(method = "DELETE", url = %path))]
    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Response> {
        let url = self.build_url(path, query)?;
        debug!("Sending DELETE request to {}", url);

        let response = self.client.delete(url).send().await?;
        self.handle_response(response).await
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("invalid path: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Map HTTP status to `ClientError`. Venue error payloads on 4xx keep their
    /// numeric code so callers can recognise "order already gone".
    async fn handle_response(&self, response: Response) -> ClientResult<Response> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                debug!("Request successful: {}", status);
                Ok(response)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let error_body = Self::extract_error_body(response).await;
                warn!("Unauthorized request: {} - {}", status, error_body);
                Err(ClientError::Unauthorized)
            }
            // 418 is Binance's "banned for repeated 429s"
            StatusCode::TOO_MANY_REQUESTS | StatusCode::IM_A_TEAPOT => {
                let error_body = Self::extract_error_body(response).await;
                warn!("Rate limited: {} - {}", status, error_body);
                Err(ClientError::RateLimited)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                let error_body = Self::extract_error_body(response).await;
                warn!("Request timeout: {} - {}", status, error_body);
                Err(ClientError::Timeout)
            }
            status if status.is_server_error() => {
                let error_body = Self::extract_error_body(response).await;
                warn!("Server error: {} - {}", status, error_body);
                Err(ClientError::ServerError(status.as_u16()))
            }
            _ => {
                let error_body = Self::extract_error_body(response).await;
                warn!("Request failed with status {}: {}", status, error_body);
                Err(ClientError::from_body(status.as_u16(), &error_body))
            }
        }
    }

    async fn extract_error_body(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }
}

// ──────────────────────────────────────────────────────────────────
// Response extension: JSON parsing with raw-body logging
// ──────────────────────────────────────────────────────────────────

/// Reads the body as text first, then deserializes. On parse failure the
/// full raw body is logged at ERROR level so venue payloads are never lost.
#[async_trait]
pub trait ResponseExt {
    async fn json_logged<T: DeserializeOwned>(self, context: &str) -> Result<T, ClientError>;

    async fn text_logged(self, context: &str) -> Result<(String, StatusCode), ClientError>;
}

/// Read the body, run a venue-specific error detector, then parse JSON.
///
/// Venues that reply 200 with an error envelope (Bybit `retCode != 0`) are
/// turned into [`ClientError::Api`] with the detected code.
pub async fn check_and_parse<T: DeserializeOwned>(
    resp: Response,
    context: &str,
    is_error: fn(&str) -> Option<(i64, String)>,
) -> Result<T, ClientError> {
    let (body, status) = resp.text_logged(context).await?;

    if let Some((code, message)) = is_error(&body) {
        warn!(
            context = context,
            status = %status,
            code = code,
            exchange_error = %message,
            "Exchange returned 200 with error payload"
        );
        return Err(ClientError::Api {
            status: status.as_u16(),
            code: Some(code),
            message,
        });
    }

    serde_json::from_str::<T>(&body).map_err(|e| {
        error!(
            context = context,
            status = %status,
            raw_body = %body,
            "JSON parse failed, raw response logged"
        );
        ClientError::InvalidResponse(format!("{context}: {e}"))
    })
}

#[async_trait]
impl ResponseExt for Response {
    async fn json_logged<T: DeserializeOwned>(self, context: &str) -> Result<T, ClientError> {
        let (body, status) = self.text_logged(context).await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            error!(
                context = context,
                status = %status,
                raw_body = %body,
                "JSON parse failed, raw response logged"
            );
            ClientError::InvalidResponse(format!("{context}: {e}"))
        })
    }

    async fn text_logged(self, context: &str) -> Result<(String, StatusCode), ClientError> {
        let status = self.status();
        let body = self
            .text()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{context}: read body: {e}")))?;
        Ok((body, status))
    }
}
