//! Bybit V5 request signing.

use async_trait::async_trait;
use sweeper_core::http::auth::{AuthProvider, apply_bybit_hmac_auth, now_ms};
use sweeper_core::http::errors::ClientError;
use sweeper_core::http::reqwest::Request;

#[derive(Debug, Clone)]
pub struct BybitHmacAuth {
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BybitHmacAuth {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            recv_window_ms: 5_000,
        }
    }

    pub fn with_recv_window_ms(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }
}

#[async_trait]
impl AuthProvider for BybitHmacAuth {
    async fn apply_auth(&self, request: &mut Request) -> Result<(), ClientError> {
        apply_bybit_hmac_auth(
            request,
            &self.api_key,
            &self.api_secret,
            self.recv_window_ms,
            now_ms()?,
        )
    }
}
