//! Binance USDⓈ-M futures gateway

use async_trait::async_trait;
use serde::Deserialize;
use sweeper_core::config::types::ExchangeConfig;
use sweeper_core::http::{HttpClientBuilder, ResponseExt, TracedHttpClient};
use sweeper_core::normalize_symbol;
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{
    CancelRequest, Exchange, ExchangeOrder, ExchangePosition, ExecutionMode,
};
use tracing::{debug, warn};

use crate::binance::auth::BinanceHmacAuth;
use crate::binance::mappers::{algo_order_to_snapshot, order_to_snapshot, position_to_snapshot};
use crate::binance::types::{BinanceAlgoOrder, BinanceOrder, BinancePositionRisk};

const BINANCE_FUTURES_BASE_URL: &str = "https://fapi.binance.com";
const BINANCE_FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

fn default_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    2
}
fn default_recv_window() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    /// Custom base URL (for testing)
    pub base_url: Option<String>,
    #[serde(default)]
    pub testnet: bool,
    /// Merge the conditional (algo) order book into open-order reads.
    #[serde(default = "default_true")]
    pub include_algo_orders: bool,
}

impl ExchangeConfig for BinanceConfig {
    const EXCHANGE_NAME: &'static str = "binance";

    fn validate(&self, execution_mode: ExecutionMode) -> Vec<String> {
        let mut errors = Vec::new();
        if execution_mode == ExecutionMode::Live {
            if self.api_key.is_none() {
                errors.push("exchanges.binance.api_key is required in live mode".to_string());
            }
            if self.api_secret.is_none() {
                errors.push("exchanges.binance.api_secret is required in live mode".to_string());
            }
        }
        errors
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            api_key: None,
            api_secret: None,
            recv_window: default_recv_window(),
            base_url: None,
            testnet: false,
            include_algo_orders: true,
        }
    }
}

pub struct BinanceClient {
    config: BinanceConfig,
    public_client: TracedHttpClient,
    private_client: Option<TracedHttpClient>,
}

impl BinanceClient {
    pub fn new(config: BinanceConfig) -> anyhow::Result<Self> {
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if config.testnet {
                BINANCE_FUTURES_TESTNET_URL.to_string()
            } else {
                BINANCE_FUTURES_BASE_URL.to_string()
            }
        });

        let public_client = HttpClientBuilder::new(base_url.clone())
            .timeout(config.timeout_secs)
            .max_retries(config.max_retries)
            .build()?;

        let private_client = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => {
                let auth = BinanceHmacAuth::new(key.clone(), secret.clone())
                    .with_recv_window_ms(config.recv_window);
                Some(
                    HttpClientBuilder::new(base_url)
                        .timeout(config.timeout_secs)
                        .max_retries(config.max_retries)
                        .auth_provider(auth)
                        .build()?,
                )
            }
            _ => None,
        };

        Ok(Self {
            config,
            public_client,
            private_client,
        })
    }

    fn private_client(&self) -> Result<&TracedHttpClient, GatewayError> {
        self.private_client.as_ref().ok_or_else(|| {
            GatewayError::Other("Binance private client not configured (missing API keys)".into())
        })
    }

    /// Connectivity check against the public ping endpoint.
    pub async fn ping(&self) -> Result<(), GatewayError> {
        self.public_client.get("/fapi/v1/ping", &[]).await?;
        Ok(())
    }

    fn symbol_query(symbol: Option<&str>) -> Vec<(&'static str, String)> {
        symbol
            .map(|s| vec![("symbol", normalize_symbol(s))])
            .unwrap_or_default()
    }

    async fn fetch_regular_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let resp = self
            .private_client()?
            .get("/fapi/v1/openOrders", &Self::symbol_query(symbol))
            .await?;
        let raw: Vec<BinanceOrder> = resp.json_logged("Binance openOrders").await?;
        Ok(raw
            .iter()
            .filter_map(|o| {
                let mapped = order_to_snapshot(o);
                if mapped.is_none() {
                    warn!(order_id = o.order_id, status = %o.status, "Unmappable Binance order skipped");
                }
                mapped
            })
            .collect())
    }

    async fn fetch_algo_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let resp = self
            .private_client()?
            .get("/fapi/v1/openAlgoOrders", &Self::symbol_query(symbol))
            .await?;
        let raw: Vec<BinanceAlgoOrder> = resp.json_logged("Binance openAlgoOrders").await?;
        Ok(raw
            .iter()
            .filter_map(|o| {
                let mapped = algo_order_to_snapshot(o);
                if mapped.is_none() {
                    warn!(algo_id = o.algo_id, "Unmappable Binance algo order skipped");
                }
                mapped
            })
            .collect())
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let mut orders = self.fetch_regular_orders(symbol).await?;
        if self.config.include_algo_orders {
            orders.extend(self.fetch_algo_orders(symbol).await?);
        }
        debug!(count = orders.len(), symbol = ?symbol, "Binance open orders fetched");
        Ok(orders)
    }

    async fn fetch_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<ExchangeOrder, GatewayError> {
        let query = [
            ("symbol", normalize_symbol(symbol)),
            ("orderId", order_id.to_string()),
        ];
        let resp = self
            .private_client()?
            .get("/fapi/v1/order", &query)
            .await?;
        let raw: BinanceOrder = resp.json_logged("Binance order").await?;
        order_to_snapshot(&raw).ok_or_else(|| {
            GatewayError::Parse(format!("Binance order {order_id}: unmappable payload"))
        })
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        let resp = self
            .private_client()?
            .get("/fapi/v2/positionRisk", &[])
            .await?;
        let raw: Vec<BinancePositionRisk> = resp.json_logged("Binance positionRisk").await?;
        Ok(raw.iter().filter_map(position_to_snapshot).collect())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<(), GatewayError> {
        let client = self.private_client()?;
        if request.conditional {
            debug!(algo_id = %request.order_id, symbol = %request.symbol, "Cancelling Binance algo order");
            client
                .delete("/fapi/v1/algoOrder", &[("algoId", request.order_id.clone())])
                .await?;
        } else {
            debug!(order_id = %request.order_id, symbol = %request.symbol, "Cancelling Binance order");
            let query = [
                ("symbol", normalize_symbol(&request.symbol)),
                ("orderId", request.order_id.clone()),
            ];
            client.delete("/fapi/v1/order", &query).await?;
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let client = self.private_client()?;
        let query = [("symbol", normalize_symbol(symbol))];
        client.delete("/fapi/v1/allOpenOrders", &query).await?;
        if self.config.include_algo_orders {
            match client.delete("/fapi/v1/algoOpenOrders", &query).await {
                Ok(_) => {}
                Err(e) => {
                    let e = GatewayError::from(e);
                    if !e.is_order_gone() {
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }
}
