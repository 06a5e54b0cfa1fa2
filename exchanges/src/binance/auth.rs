use async_trait::async_trait;
use sweeper_core::http::auth::{AuthProvider, apply_binance_hmac_auth, now_ms};
use sweeper_core::http::errors::ClientError;
use sweeper_core::http::reqwest::Request;

#[derive(Debug, Clone)]
pub struct BinanceHmacAuth {
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BinanceHmacAuth {
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
impl AuthProvider for BinanceHmacAuth {
    async fn apply_auth(&self, request: &mut Request) -> Result<(), ClientError> {
        apply_binance_hmac_auth(
            request,
            &self.api_key,
            &self.api_secret,
            self.recv_window_ms,
            now_ms()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_core::http::reqwest::{Client, Url};

    #[tokio::test]
    async fn signs_query_and_sets_key_header() {
        let url = Url::parse("https://fapi.binance.com/fapi/v1/openOrders?symbol=BTCUSDT").unwrap();
        let mut request = Client::new().get(url).build().unwrap();

        BinanceHmacAuth::new("k".to_string(), "s".to_string())
            .with_recv_window_ms(10_000)
            .apply_auth(&mut request)
            .await
            .unwrap();

        let query = request.url().query().unwrap();
        assert!(query.starts_with("symbol=BTCUSDT&timestamp="));
        assert!(query.contains("&recvWindow=10000&signature="));
        assert_eq!(request.headers().get("x-mbx-apikey").unwrap(), "k");
    }
}
