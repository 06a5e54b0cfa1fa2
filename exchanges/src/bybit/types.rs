//! Bybit V5 payloads.
//!
//! Every reply is wrapped in
//! `{"retCode": 0, "retMsg": "OK", "result": {...}, "time": 1234}` and
//! numbers arrive as strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitApiResponse<T> {
    pub ret_code: i64,
    pub ret_msg: String,
    pub result: T,
    #[serde(default)]
    pub time: u64,
}

/// Cursor-paginated `result` body shared by order and position lists.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitPage<T> {
    #[serde(default)]
    pub category: String,
    pub list: Vec<T>,
    #[serde(default)]
    pub next_page_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrder {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    #[serde(default)]
    pub price: String,
    pub qty: String,
    pub order_status: String,
    #[serde(default)]
    pub stop_order_type: String,
    #[serde(default)]
    pub trigger_price: String,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub close_on_trigger: bool,
    #[serde(default)]
    pub position_idx: u8,
    pub created_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitPosition {
    pub symbol: String,
    /// `Buy`, `Sell`, or empty for a flat slot.
    pub side: String,
    pub size: String,
    #[serde(default)]
    pub avg_price: String,
    #[serde(default)]
    pub mark_price: String,
    #[serde(default)]
    pub position_idx: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitCancelOrderRequest<'a> {
    pub category: &'a str,
    pub symbol: String,
    pub order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_filter: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitCancelAllRequest<'a> {
    pub category: &'a str,
    pub symbol: String,
}

/// Zeroes every position-level TP/SL/trailing level for one hedge slot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitClearStopsRequest<'a> {
    pub category: &'a str,
    pub symbol: String,
    pub tpsl_mode: &'a str,
    pub take_profit: &'a str,
    pub stop_loss: &'a str,
    pub trailing_stop: &'a str,
    pub position_idx: u8,
}

impl<'a> BybitClearStopsRequest<'a> {
    pub fn new(category: &'a str, symbol: String, position_idx: u8) -> Self {
        Self {
            category,
            symbol,
            tpsl_mode: "Full",
            take_profit: "0",
            stop_loss: "0",
            trailing_stop: "0",
            position_idx,
        }
    }
}
