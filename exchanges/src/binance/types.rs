//! Binance USDⓈ-M futures response types (only the fields the sweeper reads).

use serde::Deserialize;

/// Row of `GET /fapi/v1/openOrders` and `GET /fapi/v1/order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    pub orig_qty: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    #[serde(default)]
    pub stop_price: Option<String>,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub close_position: bool,
    #[serde(default)]
    pub position_side: Option<String>,
    pub time: i64,
}

/// Row of `GET /fapi/v1/openAlgoOrders`. Conditional orders live here since
/// Binance moved them to the algo service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceAlgoOrder {
    pub algo_id: i64,
    #[serde(default)]
    pub client_algo_id: Option<String>,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub position_side: Option<String>,
    pub order_type: String,
    pub quantity: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub trigger_price: Option<String>,
    pub algo_status: String,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub close_position: bool,
    pub create_time: i64,
}

/// Row of `GET /fapi/v2/positionRisk`. `position_amt` is signed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinancePositionRisk {
    pub symbol: String,
    pub position_amt: String,
    pub entry_price: String,
    #[serde(default)]
    pub mark_price: Option<String>,
    #[serde(default)]
    pub position_side: Option<String>,
}
