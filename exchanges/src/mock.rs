use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use sweeper_core::normalize_symbol;
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{
    CancelRequest, Exchange, ExchangeOrder, ExchangePosition, OrderStatus, PositionIndex,
};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct MockState {
    /// Order ids this session pretended to cancel.
    pub cancelled: HashSet<String>,
    pub cancel_calls: usize,
}

/// Wraps a real venue client for paper runs. Reads go to the venue, cancels
/// are only recorded, and orders "cancelled" here are hidden from later reads
/// so a cycle sees the effect of its own work.
pub struct MockExchange<T> {
    inner: T,
    state: Arc<RwLock<MockState>>,
}

impl<T> MockExchange<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    pub async fn get_state(&self) -> MockState {
        self.state.read().await.clone()
    }
}

impl<T: ExchangeGateway> MockExchange<T> {
    async fn visible(&self, orders: Vec<ExchangeOrder>) -> Vec<ExchangeOrder> {
        let state = self.state.read().await;
        orders
            .into_iter()
            .filter(|o| !state.cancelled.contains(&o.order_id))
            .collect()
    }

    /// Mark every visible order matching `pred` on `symbol` as cancelled.
    async fn cancel_matching(
        &self,
        symbol: &str,
        pred: impl Fn(&ExchangeOrder) -> bool,
    ) -> Result<usize, GatewayError> {
        let live = self.inner.fetch_open_orders(Some(symbol)).await?;
        let key = normalize_symbol(symbol);
        let mut state = self.state.write().await;
        state.cancel_calls += 1;
        let mut hit = 0;
        for order in live
            .iter()
            .filter(|o| normalize_symbol(&o.symbol) == key && pred(o))
        {
            if state.cancelled.insert(order.order_id.clone()) {
                hit += 1;
            }
        }
        Ok(hit)
    }
}

#[async_trait]
impl<T: ExchangeGateway> ExchangeGateway for MockExchange<T> {
    fn exchange(&self) -> Exchange {
        self.inner.exchange()
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let orders = self.inner.fetch_open_orders(symbol).await?;
        Ok(self.visible(orders).await)
    }

    async fn fetch_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<ExchangeOrder, GatewayError> {
        let mut order = self.inner.fetch_order(order_id, symbol).await?;
        if self.state.read().await.cancelled.contains(order_id) {
            order.status = OrderStatus::Canceled;
        }
        Ok(order)
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        self.inner.fetch_positions().await
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        state.cancel_calls += 1;
        if !state.cancelled.insert(request.order_id.clone()) {
            return Err(GatewayError::exchange(None, "order not found (paper)"));
        }
        info!(
            exchange = %self.inner.exchange(),
            order_id = %request.order_id,
            symbol = %request.symbol,
            "[PAPER] cancel recorded"
        );
        Ok(())
    }

    async fn cancel_order_list(&self, list_id: &str, symbol: &str) -> Result<(), GatewayError> {
        let hit = self
            .cancel_matching(symbol, |o| o.meta.order_list_id.as_deref() == Some(list_id))
            .await?;
        if hit == 0 {
            return Err(GatewayError::exchange(None, "order list not found (paper)"));
        }
        info!(list_id, symbol, legs = hit, "[PAPER] order list cancel recorded");
        Ok(())
    }

    async fn clear_position_stops(
        &self,
        symbol: &str,
        position_idx: PositionIndex,
    ) -> Result<(), GatewayError> {
        if !self.inner.supports_position_stops(symbol) {
            return self.inner.clear_position_stops(symbol, position_idx).await;
        }
        let hit = self
            .cancel_matching(symbol, |o| {
                o.is_tp_sl() && o.meta.position_idx.unwrap_or(PositionIndex::OneWay) == position_idx
            })
            .await?;
        if hit == 0 {
            return Err(GatewayError::exchange(None, "not modified (paper)"));
        }
        info!(symbol, position_idx = %position_idx, stops = hit, "[PAPER] position stops cleared");
        Ok(())
    }

    fn supports_position_stops(&self, symbol: &str) -> bool {
        self.inner.supports_position_stops(symbol)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let hit = self.cancel_matching(symbol, |_| true).await?;
        info!(symbol, orders = hit, "[PAPER] cancel-all recorded");
        Ok(())
    }
}
