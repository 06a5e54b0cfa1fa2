//! Bybit V5 unified-account gateway

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sweeper_core::config::types::ExchangeConfig;
use sweeper_core::http::{HttpClientBuilder, TracedHttpClient, check_and_parse};
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{
    CancelRequest, Exchange, ExchangeOrder, ExchangePosition, ExecutionMode, PositionIndex,
};
use sweeper_core::{is_perpetual_swap, normalize_symbol};
use tracing::{debug, warn};

use crate::bybit::auth::BybitHmacAuth;
use crate::bybit::mappers::{bybit_error, order_to_snapshot, position_to_snapshot};
use crate::bybit::types::{
    BybitApiResponse, BybitCancelAllRequest, BybitCancelOrderRequest, BybitClearStopsRequest,
    BybitOrder, BybitPage, BybitPosition,
};

const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const BYBIT_TESTNET_URL: &str = "https://api-testnet.bybit.com";

fn default_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    2
}
fn default_recv_window() -> u64 {
    5000
}
fn default_category() -> String {
    "linear".to_string()
}
fn default_settle_coin() -> String {
    "USDT".to_string()
}
fn default_page_limit() -> u32 {
    50
}
fn default_max_pages() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct BybitConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    pub base_url: Option<String>,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default = "default_category")]
    pub category: String,
    /// Settle asset used for account-wide order and position reads.
    #[serde(default = "default_settle_coin")]
    pub settle_coin: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Hard stop on cursor pagination. Anything beyond is logged and dropped.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            api_key: None,
            api_secret: None,
            recv_window: default_recv_window(),
            base_url: None,
            testnet: false,
            category: default_category(),
            settle_coin: default_settle_coin(),
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl ExchangeConfig for BybitConfig {
    const EXCHANGE_NAME: &'static str = "bybit";

    fn validate(&self, execution_mode: ExecutionMode) -> Vec<String> {
        let mut errors = Vec::new();
        if execution_mode == ExecutionMode::Live {
            if self.api_key.is_none() {
                errors.push("exchanges.bybit.api_key is required in live mode".to_string());
            }
            if self.api_secret.is_none() {
                errors.push("exchanges.bybit.api_secret is required in live mode".to_string());
            }
        }
        if self.max_pages == 0 {
            errors.push("exchanges.bybit.max_pages must be at least 1".to_string());
        }
        errors
    }
}

pub struct BybitClient {
    config: BybitConfig,
    public_client: TracedHttpClient,
    private_client: Option<TracedHttpClient>,
}

impl BybitClient {
    pub fn new(config: BybitConfig) -> anyhow::Result<Self> {
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if config.testnet {
                BYBIT_TESTNET_URL.to_string()
            } else {
                BYBIT_BASE_URL.to_string()
            }
        });

        let public_client = HttpClientBuilder::new(base_url.clone())
            .timeout(config.timeout_secs)
            .max_retries(config.max_retries)
            .build()?;

        let private_client = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => {
                let auth = BybitHmacAuth::new(key.clone(), secret.clone())
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
            GatewayError::Other("Bybit private client not configured (missing API keys)".into())
        })
    }

    pub async fn ping(&self) -> Result<(), GatewayError> {
        let resp = self.public_client.get("/v5/market/time", &[]).await?;
        check_and_parse::<serde_json::Value>(resp, "Bybit server time", bybit_error).await?;
        Ok(())
    }

    /// Spot spellings go to the spot book, everything else to the configured
    /// derivatives category.
    fn category_for(&self, symbol: &str) -> &str {
        if symbol.contains('/') && !is_perpetual_swap(symbol) {
            "spot"
        } else {
            &self.config.category
        }
    }

    /// Follow `nextPageCursor` until it runs out or `max_pages` is reached.
    async fn read_pages<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        base_query: Vec<(&'static str, String)>,
        context: &str,
    ) -> Result<Vec<T>, GatewayError> {
        let client = self.private_client()?;
        let mut rows = Vec::new();
        let mut cursor = String::new();

        for page_no in 0..self.config.max_pages.max(1) {
            let mut query = base_query.clone();
            query.push(("limit", self.config.page_limit.to_string()));
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let resp = client.get(path, &query).await?;
            let page: BybitApiResponse<BybitPage<T>> =
                check_and_parse(resp, context, bybit_error).await?;
            rows.extend(page.result.list);
            cursor = page.result.next_page_cursor;

            if cursor.is_empty() {
                return Ok(rows);
            }
            debug!(context, page = page_no + 1, "Following Bybit page cursor");
        }

        warn!(
            context,
            max_pages = self.config.max_pages,
            rows = rows.len(),
            "Bybit pagination truncated, remaining pages not read"
        );
        Ok(rows)
    }

    fn scope_query(&self, symbol: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("category", self.config.category.clone())];
        match symbol {
            Some(s) => query.push(("symbol", normalize_symbol(s))),
            None => query.push(("settleCoin", self.config.settle_coin.clone())),
        }
        query
    }

    async fn post_checked<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<(), GatewayError> {
        let resp = self.private_client()?.post(path, body).await?;
        check_and_parse::<BybitApiResponse<serde_json::Value>>(resp, context, bybit_error).await?;
        Ok(())
    }
}

#[async_trait]
impl ExchangeGateway for BybitClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let raw: Vec<BybitOrder> = self
            .read_pages("/v5/order/realtime", self.scope_query(symbol), "Bybit open orders")
            .await?;
        let orders: Vec<ExchangeOrder> = raw
            .iter()
            .filter_map(|o| {
                let mapped = order_to_snapshot(o);
                if mapped.is_none() {
                    warn!(order_id = %o.order_id, status = %o.order_status, "Unmappable Bybit order skipped");
                }
                mapped
            })
            .collect();
        debug!(count = orders.len(), symbol = ?symbol, "Bybit open orders fetched");
        Ok(orders)
    }

    /// Realtime first, then history for orders that already left the book.
    async fn fetch_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<ExchangeOrder, GatewayError> {
        let client = self.private_client()?;
        let query = [
            ("category", self.category_for(symbol).to_string()),
            ("symbol", normalize_symbol(symbol)),
            ("orderId", order_id.to_string()),
        ];

        for path in ["/v5/order/realtime", "/v5/order/history"] {
            let resp = client.get(path, &query).await?;
            let page: BybitApiResponse<BybitPage<BybitOrder>> =
                check_and_parse(resp, "Bybit order lookup", bybit_error).await?;
            if let Some(found) = page.result.list.iter().find(|o| o.order_id == order_id) {
                return order_to_snapshot(found).ok_or_else(|| {
                    GatewayError::Parse(format!("Bybit order {order_id}: unmappable payload"))
                });
            }
        }

        Err(GatewayError::exchange(
            Some(110001),
            format!("order {order_id} not exists"),
        ))
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        let raw: Vec<BybitPosition> = self
            .read_pages("/v5/position/list", self.scope_query(None), "Bybit positions")
            .await?;
        Ok(raw.iter().filter_map(position_to_snapshot).collect())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<(), GatewayError> {
        let body = BybitCancelOrderRequest {
            category: self.category_for(&request.symbol),
            symbol: normalize_symbol(&request.symbol),
            order_id: &request.order_id,
            order_filter: request.conditional.then_some("StopOrder"),
        };
        debug!(
            order_id = %request.order_id,
            symbol = %body.symbol,
            conditional = request.conditional,
            "Cancelling Bybit order"
        );
        self.post_checked("/v5/order/cancel", &body, "Bybit cancel order")
            .await
    }

    async fn clear_position_stops(
        &self,
        symbol: &str,
        position_idx: PositionIndex,
    ) -> Result<(), GatewayError> {
        if !self.supports_position_stops(symbol) {
            return Err(GatewayError::Unsupported(format!(
                "position stops on non-perpetual {symbol}"
            )));
        }
        let body = BybitClearStopsRequest::new(
            &self.config.category,
            normalize_symbol(symbol),
            position_idx.as_u8(),
        );
        debug!(symbol = %body.symbol, position_idx = %position_idx, "Clearing Bybit position stops");
        self.post_checked("/v5/position/trading-stop", &body, "Bybit trading stop")
            .await
    }

    fn supports_position_stops(&self, symbol: &str) -> bool {
        is_perpetual_swap(symbol)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let body = BybitCancelAllRequest {
            category: self.category_for(symbol),
            symbol: normalize_symbol(symbol),
        };
        self.post_checked("/v5/order/cancel-all", &body, "Bybit cancel all")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::bybit as fixtures;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(mock_server: &MockServer) -> BybitClient {
        let config = BybitConfig {
            timeout_secs: 5,
            max_retries: 0,
            api_key: Some("test-key".to_string()),
            api_secret: Some("test-secret".to_string()),
            base_url: Some(mock_server.uri()),
            ..Default::default()
        };
        BybitClient::new(config).expect("Failed to create test client")
    }

    fn ok(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn open_orders_are_read_account_wide_by_settle_coin() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/order/realtime"))
            .and(query_param("category", "linear"))
            .and(query_param("settleCoin", "USDT"))
            .and(header_exists("x-bapi-sign"))
            .respond_with(ok(fixtures::open_orders_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let orders = test_client(&mock_server)
            .fetch_open_orders(None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders.iter().filter(|o| o.meta.conditional).count(), 1);
    }

    #[tokio::test]
    async fn pagination_follows_the_cursor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/order/realtime"))
            .and(query_param("cursor", "page-2"))
            .respond_with(ok(fixtures::open_orders_second_page_json()))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v5/order/realtime"))
            .respond_with(ok(fixtures::open_orders_first_page_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let orders = test_client(&mock_server)
            .fetch_open_orders(None)
            .await
            .unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn pagination_stops_at_max_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/order/realtime"))
            .respond_with(ok(fixtures::open_orders_first_page_json()))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = BybitClient::new(BybitConfig {
            max_retries: 0,
            api_key: Some("k".to_string()),
            api_secret: Some("s".to_string()),
            base_url: Some(mock_server.uri()),
            max_pages: 2,
            ..Default::default()
        })
        .unwrap();

        let orders = client.fetch_open_orders(None).await.unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn error_envelope_with_http_200_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/position/list"))
            .respond_with(ok(&fixtures::error_json(10006, "Too many visits!")))
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server).fetch_positions().await.unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn conditional_cancel_sets_stop_order_filter() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/order/cancel"))
            .and(body_partial_json(json!({
                "category": "linear",
                "symbol": "BTCUSDT",
                "orderId": "1f0a6b2e-0002",
                "orderFilter": "StopOrder"
            })))
            .respond_with(ok(fixtures::ok_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        test_client(&mock_server)
            .cancel_order(&CancelRequest {
                order_id: "1f0a6b2e-0002".to_string(),
                symbol: "BTC/USDT:USDT".to_string(),
                conditional: true,
                position_idx: Some(PositionIndex::OneWay),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_of_missing_order_is_gone() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/order/cancel"))
            .respond_with(ok(&fixtures::error_json(
                110001,
                "order not exists or too late to cancel",
            )))
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .cancel_order(&CancelRequest {
                order_id: "x".to_string(),
                symbol: "XRPUSDT".to_string(),
                conditional: false,
                position_idx: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_order_gone());
    }

    #[tokio::test]
    async fn clear_stops_zeroes_every_level_for_the_slot() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/position/trading-stop"))
            .and(body_partial_json(json!({
                "symbol": "ETHUSDT",
                "tpslMode": "Full",
                "takeProfit": "0",
                "stopLoss": "0",
                "trailingStop": "0",
                "positionIdx": 2
            })))
            .respond_with(ok(fixtures::ok_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        test_client(&mock_server)
            .clear_position_stops("ETHUSDT", PositionIndex::HedgeSell)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn clear_stops_not_modified_is_a_precondition() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/position/trading-stop"))
            .respond_with(ok(&fixtures::error_json(34040, "not modified")))
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .clear_position_stops("BTCUSDT", PositionIndex::OneWay)
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn spot_symbols_never_reach_trading_stop() {
        let mock_server = MockServer::start().await;
        let client = test_client(&mock_server);

        assert!(!client.supports_position_stops("BTC/USDT"));
        let err = client
            .clear_position_stops("BTC/USDT", PositionIndex::OneWay)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unsupported(_)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_falls_back_to_order_history() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/order/realtime"))
            .respond_with(ok(fixtures::empty_orders_json()))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v5/order/history"))
            .and(query_param("orderId", "1f0a6b2e-0009"))
            .respond_with(ok(fixtures::order_history_json()))
            .mount(&mock_server)
            .await;

        let order = test_client(&mock_server)
            .fetch_order("1f0a6b2e-0009", "XRPUSDT")
            .await
            .unwrap();
        assert!(order.status.is_terminal());
    }

    #[tokio::test]
    async fn lookup_of_unknown_order_is_gone() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ok(fixtures::empty_orders_json()))
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .fetch_order("nope", "XRPUSDT")
            .await
            .unwrap_err();
        assert!(err.is_order_gone());
    }

    #[tokio::test]
    async fn cancel_all_posts_symbol() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/order/cancel-all"))
            .and(body_partial_json(json!({"category": "linear", "symbol": "DOGEUSDT"})))
            .respond_with(ok(fixtures::ok_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        test_client(&mock_server)
            .cancel_all_orders("DOGEUSDT")
            .await
            .unwrap();
    }

    #[test]
    fn live_mode_requires_credentials() {
        assert_eq!(BybitConfig::default().validate(ExecutionMode::Live).len(), 2);
        assert!(BybitConfig::default().validate(ExecutionMode::Paper).is_empty());
    }
}
