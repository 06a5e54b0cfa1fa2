//! Venue adapters implementing [`sweeper_core::ExchangeGateway`].

pub mod binance;
pub mod bybit;
pub mod mock;

#[cfg(test)]
pub(crate) mod fixtures;

pub use binance::{BinanceClient, BinanceConfig};
pub use bybit::{BybitClient, BybitConfig};
pub use mock::MockExchange;
