use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CancelRequest, Exchange, ExchangeOrder, ExchangePosition, PositionIndex};

// ──────────────────────────────────────────────────────────────────
// Venue errors
// ──────────────────────────────────────────────────────────────────

/// Venue error codes meaning "the order is not there any more".
const GONE_CODES: &[i64] = &[
    -2011,  // Binance: unknown order sent
    -2013,  // Binance: order does not exist
    110001, // Bybit: order not exists or too late to cancel
    170213, // Bybit: order does not exist
];

const RATE_LIMIT_CODES: &[i64] = &[
    -1003, // Binance: too many requests
    -1015, // Binance: too many new orders
    10006, // Bybit: too many visits
    10018, // Bybit: exceeded ip rate limit
];

/// Replies that mean the call was valid but the venue refuses it for this
/// symbol or state. Retrying would get the same answer.
const PRECONDITION_CODES: &[i64] = &[
    -1121,  // Binance: invalid symbol
    -4164,  // Binance: order notional too small
    10001,  // Bybit: params error
    110043, // Bybit: set leverage not modified
    34040,  // Bybit: not modified
    10005,  // Bybit: permission denied
];

const GONE_PHRASES: &[&str] = &[
    "unknown order",
    "order not found",
    "not found",
    "does not exist",
    "order not exists",
    "too late to cancel",
    "already canceled",
    "already cancelled",
    "already filled",
    "already closed",
];

const RATE_LIMIT_PHRASES: &[&str] = &["too many", "rate limit", "too frequent"];

const PRECONDITION_PHRASES: &[&str] = &[
    "not modified",
    "not supported",
    "unsupported",
    "invalid symbol",
    "position idx not match",
    "position mode",
    "params error",
];

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limited")]
    RateLimited,
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("exchange error (code {code:?}): {message}")]
    Exchange { code: Option<i64>, message: String },
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("other: {0}")]
    Other(String),
}

impl GatewayError {
    pub fn exchange(code: Option<i64>, message: impl Into<String>) -> Self {
        GatewayError::Exchange {
            code,
            message: message.into(),
        }
    }

    fn matches(&self, codes: &[i64], phrases: &[&str]) -> bool {
        match self {
            GatewayError::Exchange { code, message } => {
                if code.is_some_and(|c| codes.contains(&c)) {
                    return true;
                }
                let lower = message.to_ascii_lowercase();
                phrases.iter().any(|p| lower.contains(p))
            }
            GatewayError::Other(message) => {
                let lower = message.to_ascii_lowercase();
                phrases.iter().any(|p| lower.contains(p))
            }
            _ => false,
        }
    }

    /// The order no longer exists on the venue. Cancelling it again is a
    /// success, not a failure.
    pub fn is_order_gone(&self) -> bool {
        self.matches(GONE_CODES, GONE_PHRASES)
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GatewayError::RateLimited)
            || self.matches(RATE_LIMIT_CODES, RATE_LIMIT_PHRASES)
    }

    /// Worth retrying with backoff. Rate limits are transient too but are
    /// handled by the throttle instead of the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_)) || self.is_rate_limit()
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, GatewayError::Unsupported(_))
            || self.matches(PRECONDITION_CODES, PRECONDITION_PHRASES)
    }
}

impl From<crate::http::ClientError> for GatewayError {
    fn from(err: crate::http::ClientError) -> Self {
        use crate::http::ClientError;
        match err {
            ClientError::RateLimited => GatewayError::RateLimited,
            ClientError::Timeout => GatewayError::Timeout,
            ClientError::Request(e) => GatewayError::Network(e),
            ClientError::ServerError(code) => {
                GatewayError::Network(format!("server error: {}", code))
            }
            ClientError::Api { code, message, .. } => {
                let err = GatewayError::Exchange { code, message };
                if err.is_rate_limit() {
                    GatewayError::RateLimited
                } else {
                    err
                }
            }
            ClientError::Serialization(e) | ClientError::InvalidResponse(e) => {
                GatewayError::Parse(e)
            }
            ClientError::InvalidUrl(e) => GatewayError::Other(e),
            ClientError::Unauthorized => GatewayError::Other("unauthorized".to_string()),
            ClientError::AuthError(e) => GatewayError::Other(format!("auth error: {}", e)),
        }
    }
}

// ──────────────────────────────────────────────────────────────────
// Venue operations consumed by the reconciler
// ──────────────────────────────────────────────────────────────────

/// Read and cancel operations against one venue account. Implementations
/// never place orders.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Open orders, regular and conditional, optionally for one symbol.
    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError>;

    async fn fetch_order(&self, order_id: &str, symbol: &str)
    -> Result<ExchangeOrder, GatewayError>;

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError>;

    async fn cancel_order(&self, request: &CancelRequest) -> Result<(), GatewayError>;

    async fn cancel_order_list(&self, list_id: &str, symbol: &str) -> Result<(), GatewayError> {
        let _ = (list_id, symbol);
        Err(GatewayError::Unsupported(format!(
            "{} has no order-list cancel",
            self.exchange()
        )))
    }

    /// Zero out the position-level TP/SL/trailing levels for one hedge index.
    async fn clear_position_stops(
        &self,
        symbol: &str,
        position_idx: PositionIndex,
    ) -> Result<(), GatewayError> {
        let _ = (symbol, position_idx);
        Err(GatewayError::Unsupported(format!(
            "{} has no position-level stop clearing",
            self.exchange()
        )))
    }

    /// Whether `clear_position_stops` may be called for `symbol`. Calling it
    /// on anything else is a hard rejection on the venue side.
    fn supports_position_stops(&self, symbol: &str) -> bool {
        let _ = symbol;
        false
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let _ = symbol;
        Err(GatewayError::Unsupported(format!(
            "{} has no cancel-all",
            self.exchange()
        )))
    }
}
