//! The trading system's own record of open positions.
//!
//! The reconciler only reads it, apart from closing positions the venue no
//! longer reports.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;
use sweeper_core::normalize_symbol;
use sweeper_core::types::{Exchange, LocalPosition};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid position file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no local position for {0}")]
    NotFound(String),
}

#[async_trait]
pub trait LocalPositionBook: Send + Sync {
    async fn positions(&self, exchange: Exchange) -> Result<Vec<LocalPosition>, BookError>;

    /// Close every leg of a position the venue no longer reports. P&L is
    /// unknown here, so callers pass zero.
    async fn mark_closed(
        &self,
        exchange: Exchange,
        symbol: &str,
        realized_pnl: Decimal,
    ) -> Result<(), BookError>;
}

/// In-memory book. A symbol may hold several legs (hedge mode).
#[derive(Debug, Default)]
pub struct InMemoryPositionBook {
    positions: RwLock<Vec<LocalPosition>>,
    closed: RwLock<Vec<(Exchange, String, Decimal)>>,
}

impl InMemoryPositionBook {
    pub fn new(positions: impl IntoIterator<Item = LocalPosition>) -> Self {
        Self {
            positions: RwLock::new(positions.into_iter().collect()),
            closed: RwLock::new(Vec::new()),
        }
    }

    /// Every `mark_closed` call, in order.
    pub async fn closed(&self) -> Vec<(Exchange, String, Decimal)> {
        self.closed.read().await.clone()
    }
}

#[async_trait]
impl LocalPositionBook for InMemoryPositionBook {
    async fn positions(&self, exchange: Exchange) -> Result<Vec<LocalPosition>, BookError> {
        let mut out: Vec<LocalPosition> = self
            .positions
            .read()
            .await
            .iter()
            .filter(|p| p.exchange == exchange)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(out)
    }

    async fn mark_closed(
        &self,
        exchange: Exchange,
        symbol: &str,
        realized_pnl: Decimal,
    ) -> Result<(), BookError> {
        let wanted = normalize_symbol(symbol);
        {
            let mut positions = self.positions.write().await;
            let before = positions.len();
            positions.retain(|p| !(p.exchange == exchange && normalize_symbol(&p.symbol) == wanted));
            if positions.len() == before {
                return Err(BookError::NotFound(symbol.to_string()));
            }
        }
        self.closed
            .write()
            .await
            .push((exchange, symbol.to_string(), realized_pnl));
        Ok(())
    }
}

/// Book backed by a JSON array of positions maintained by the trading
/// system. Re-read on every call; closes rewrite the file.
#[derive(Debug)]
pub struct JsonFilePositionBook {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFilePositionBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<LocalPosition>, BookError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LocalPositionBook for JsonFilePositionBook {
    async fn positions(&self, exchange: Exchange) -> Result<Vec<LocalPosition>, BookError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|p| p.exchange == exchange)
            .collect())
    }

    async fn mark_closed(
        &self,
        exchange: Exchange,
        symbol: &str,
        realized_pnl: Decimal,
    ) -> Result<(), BookError> {
        let _guard = self.write_lock.lock().await;
        let wanted = normalize_symbol(symbol);
        let mut all = self.read_all().await?;
        let before = all.len();
        all.retain(|p| !(p.exchange == exchange && normalize_symbol(&p.symbol) == wanted));
        if all.len() == before {
            return Err(BookError::NotFound(symbol.to_string()));
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&all)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::info!(
            exchange = %exchange,
            symbol = symbol,
            realized_pnl = %realized_pnl,
            path = %self.path.display(),
            "Local position marked closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sweeper_core::types::PositionSide;

    fn pos(exchange: Exchange, symbol: &str) -> LocalPosition {
        LocalPosition {
            exchange,
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            quantity: dec!(1),
            entry_price: dec!(100),
        }
    }

    #[tokio::test]
    async fn in_memory_filters_by_exchange_and_closes_by_normalized_symbol() {
        let book = InMemoryPositionBook::new([
            pos(Exchange::Bybit, "BTC/USDT:USDT"),
            pos(Exchange::Binance, "ETHUSDT"),
        ]);
        assert_eq!(book.positions(Exchange::Bybit).await.unwrap().len(), 1);

        book.mark_closed(Exchange::Bybit, "BTCUSDT", Decimal::ZERO)
            .await
            .unwrap();
        assert!(book.positions(Exchange::Bybit).await.unwrap().is_empty());
        assert_eq!(book.closed().await.len(), 1);
        assert!(matches!(
            book.mark_closed(Exchange::Bybit, "BTCUSDT", Decimal::ZERO).await,
            Err(BookError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_close_drops_every_leg_of_the_symbol() {
        let mut short = pos(Exchange::Bybit, "BTCUSDT");
        short.side = PositionSide::Short;
        let book = InMemoryPositionBook::new([
            pos(Exchange::Bybit, "BTCUSDT"),
            short,
            pos(Exchange::Bybit, "ETHUSDT"),
        ]);
        assert_eq!(book.positions(Exchange::Bybit).await.unwrap().len(), 3);

        book.mark_closed(Exchange::Bybit, "BTC/USDT:USDT", Decimal::ZERO)
            .await
            .unwrap();
        let left = book.positions(Exchange::Bybit).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn json_book_rewrites_file_on_close() {
        let dir = std::env::temp_dir().join(format!("sweeper-book-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("positions.json");
        let data = vec![pos(Exchange::Bybit, "SOLUSDT"), pos(Exchange::Bybit, "XRPUSDT")];
        tokio::fs::write(&path, serde_json::to_vec(&data).unwrap())
            .await
            .unwrap();

        let book = JsonFilePositionBook::new(&path);
        book.mark_closed(Exchange::Bybit, "SOL-USDT", Decimal::ZERO)
            .await
            .unwrap();

        let left = book.positions(Exchange::Bybit).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].symbol, "XRPUSDT");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_json_file_is_an_empty_book() {
        let book = JsonFilePositionBook::new("/nonexistent/sweeper/positions.json");
        assert!(book.positions(Exchange::Binance).await.unwrap().is_empty());
    }
}
