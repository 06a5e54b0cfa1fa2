use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{
    CancelRequest, Exchange, ExchangeOrder, ExchangePosition, OrderKind, OrderMetadata, OrderSide,
    OrderStatus, PositionIndex, PositionSide, StopOrderType,
};
use sweeper_core::{is_perpetual_swap, normalize_symbol};

use crate::events::{EventKind, EventSink, EventSinkError, ReconEvent};

// ──────────────────────────────────────────────────────────────────
// Builders
// ──────────────────────────────────────────────────────────────────

/// Open limit buy created `age_secs` ago.
pub fn order(exchange: Exchange, id: &str, symbol: &str, age_secs: i64) -> ExchangeOrder {
    ExchangeOrder {
        exchange,
        order_id: id.to_string(),
        client_order_id: None,
        symbol: symbol.to_string(),
        side: OrderSide::Buy,
        kind: OrderKind::Limit,
        quantity: Decimal::ONE,
        price: Some(Decimal::ONE_HUNDRED),
        status: OrderStatus::New,
        created_at: Utc::now() - ChronoDuration::seconds(age_secs),
        meta: OrderMetadata::default(),
    }
}

pub fn reduce_only(exchange: Exchange, id: &str, symbol: &str, age_secs: i64) -> ExchangeOrder {
    let mut o = order(exchange, id, symbol, age_secs);
    o.side = OrderSide::Sell;
    o.meta.reduce_only = true;
    o
}

pub fn take_profit(exchange: Exchange, id: &str, symbol: &str, age_secs: i64) -> ExchangeOrder {
    let mut o = order(exchange, id, symbol, age_secs);
    o.side = OrderSide::Sell;
    o.kind = OrderKind::TakeProfitMarket;
    o.status = OrderStatus::Untriggered;
    o.price = None;
    o.meta.stop_order_type = Some(StopOrderType::TakeProfit);
    o.meta.trigger_price = Some(Decimal::from(120));
    o.meta.conditional = true;
    o
}

pub fn oco_leg(
    exchange: Exchange,
    id: &str,
    symbol: &str,
    list_id: &str,
    age_secs: i64,
) -> ExchangeOrder {
    let mut o = order(exchange, id, symbol, age_secs);
    o.meta.order_list_id = Some(list_id.to_string());
    o
}

pub fn position(exchange: Exchange, symbol: &str, size: i64) -> ExchangePosition {
    ExchangePosition {
        exchange,
        symbol: symbol.to_string(),
        side: PositionSide::Long,
        size: Decimal::from(size),
        entry_price: Decimal::ONE_HUNDRED,
        mark_price: None,
        position_idx: PositionIndex::OneWay,
    }
}

// ──────────────────────────────────────────────────────────────────
// ScriptedGateway
// ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub fetch_open_orders: usize,
    pub fetch_positions: usize,
    pub fetch_order: Vec<String>,
    pub cancel: Vec<CancelRequest>,
    pub cancel_list: Vec<String>,
    pub clear_stops: Vec<(String, PositionIndex)>,
    pub cancel_all: Vec<String>,
}

#[derive(Default)]
struct State {
    orders: Vec<ExchangeOrder>,
    positions: Vec<ExchangePosition>,
    order_reads: VecDeque<Result<Vec<ExchangeOrder>, GatewayError>>,
    position_reads: VecDeque<Vec<ExchangePosition>>,
    lookups: HashMap<String, OrderStatus>,
    cancel_errors: HashMap<String, VecDeque<GatewayError>>,
    cancel_all_error: Option<GatewayError>,
    calls: Calls,
}

/// In-memory venue. Reads come from scripted queues first, then from the
/// live order and position lists. Cancels remove orders from the live list;
/// cancelling an unknown id answers like Binance does.
pub struct ScriptedGateway {
    exchange: Exchange,
    state: Mutex<State>,
    read_delay: Option<Duration>,
    supports_lists: bool,
    supports_stops: bool,
}

impl ScriptedGateway {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange,
            state: Mutex::new(State::default()),
            read_delay: None,
            supports_lists: false,
            supports_stops: exchange == Exchange::Bybit,
        }
    }

    pub fn with_orders(self, orders: Vec<ExchangeOrder>) -> Self {
        self.state.lock().unwrap().orders = orders;
        self
    }

    pub fn with_positions(self, positions: Vec<ExchangePosition>) -> Self {
        self.state.lock().unwrap().positions = positions;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn with_order_lists(mut self) -> Self {
        self.supports_lists = true;
        self
    }

    pub fn without_position_stops(mut self) -> Self {
        self.supports_stops = false;
        self
    }

    /// Next open-order reads, in order, before the live list is used.
    pub fn script_order_read(&self, read: Result<Vec<ExchangeOrder>, GatewayError>) {
        self.state.lock().unwrap().order_reads.push_back(read);
    }

    pub fn script_position_read(&self, positions: Vec<ExchangePosition>) {
        self.state.lock().unwrap().position_reads.push_back(positions);
    }

    pub fn set_positions(&self, positions: Vec<ExchangePosition>) {
        self.state.lock().unwrap().positions = positions;
    }

    pub fn set_lookup(&self, order_id: &str, status: OrderStatus) {
        self.state
            .lock()
            .unwrap()
            .lookups
            .insert(order_id.to_string(), status);
    }

    pub fn fail_cancel(&self, order_id: &str, error: GatewayError) {
        self.state
            .lock()
            .unwrap()
            .cancel_errors
            .entry(order_id.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn fail_cancel_all(&self, error: GatewayError) {
        self.state.lock().unwrap().cancel_all_error = Some(error);
    }

    pub fn open_orders(&self) -> Vec<ExchangeOrder> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    async fn delay(&self) {
        if let Some(d) = self.read_delay {
            tokio::time::sleep(d).await;
        }
    }
}

pub fn unknown_order() -> GatewayError {
    GatewayError::exchange(Some(-2011), "Unknown order sent.")
}

pub fn not_modified() -> GatewayError {
    GatewayError::exchange(Some(34040), "not modified")
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.fetch_open_orders += 1;
        if let Some(read) = state.order_reads.pop_front() {
            return read;
        }
        let wanted = symbol.map(normalize_symbol);
        Ok(state
            .orders
            .iter()
            .filter(|o| {
                wanted
                    .as_ref()
                    .is_none_or(|w| &normalize_symbol(&o.symbol) == w)
            })
            .cloned()
            .collect())
    }

    async fn fetch_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<ExchangeOrder, GatewayError> {
        let _ = symbol;
        let mut state = self.state.lock().unwrap();
        state.calls.fetch_order.push(order_id.to_string());
        let status = state.lookups.get(order_id).copied();
        let Some(mut found) = state.orders.iter().find(|o| o.order_id == order_id).cloned() else {
            return Err(unknown_order());
        };
        if let Some(status) = status {
            found.status = status;
        }
        Ok(found)
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.fetch_positions += 1;
        if let Some(read) = state.position_reads.pop_front() {
            return Ok(read);
        }
        Ok(state.positions.clone())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.cancel.push(request.clone());
        if let Some(err) = state
            .cancel_errors
            .get_mut(&request.order_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let before = state.orders.len();
        state.orders.retain(|o| o.order_id != request.order_id);
        if state.orders.len() == before {
            return Err(unknown_order());
        }
        Ok(())
    }

    async fn cancel_order_list(&self, list_id: &str, symbol: &str) -> Result<(), GatewayError> {
        let _ = symbol;
        if !self.supports_lists {
            return Err(GatewayError::Unsupported("no order lists".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.calls.cancel_list.push(list_id.to_string());
        let before = state.orders.len();
        state
            .orders
            .retain(|o| o.meta.order_list_id.as_deref() != Some(list_id));
        if state.orders.len() == before {
            return Err(unknown_order());
        }
        Ok(())
    }

    async fn clear_position_stops(
        &self,
        symbol: &str,
        position_idx: PositionIndex,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .clear_stops
            .push((symbol.to_string(), position_idx));
        let key = normalize_symbol(symbol);
        let before = state.orders.len();
        state.orders.retain(|o| {
            let owned = o.meta.position_idx.unwrap_or(PositionIndex::OneWay) == position_idx;
            !(normalize_symbol(&o.symbol) == key && o.is_tp_sl() && owned)
        });
        if state.orders.len() == before {
            return Err(not_modified());
        }
        Ok(())
    }

    fn supports_position_stops(&self, symbol: &str) -> bool {
        self.supports_stops && is_perpetual_swap(symbol)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.cancel_all.push(symbol.to_string());
        if let Some(err) = state.cancel_all_error.take() {
            return Err(err);
        }
        let key = normalize_symbol(symbol);
        state.orders.retain(|o| normalize_symbol(&o.symbol) != key);
        Ok(())
    }
}

// ──────────────────────────────────────────────────────────────────
// RecordingEventSink
// ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ReconEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<ReconEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<ReconEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: ReconEvent) -> Result<(), EventSinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
