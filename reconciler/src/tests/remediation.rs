#[cfg(test)]
mod tests {
    use crate::classifier::{Classification, ZombieVerdict};
    use crate::fetcher::{FetcherConfig, StateFetcher};
    use crate::metrics::{CleanupMetrics, Counter};
    use crate::remediation::{RemediationExecutor, RemediationOutcome, RetryConfig};
    use crate::stubs::{ScriptedGateway, oco_leg, order, take_profit};
    use std::sync::Arc;
    use sweeper_core::traits::{ExchangeGateway, GatewayError};
    use sweeper_core::types::{Exchange, PositionIndex};

    fn executor(gateway: &Arc<ScriptedGateway>) -> (RemediationExecutor, Arc<CleanupMetrics>) {
        let exchange = gateway.exchange();
        let metrics = Arc::new(CleanupMetrics::new(exchange));
        let fetcher = Arc::new(StateFetcher::new(
            gateway.clone(),
            FetcherConfig::for_exchange(exchange),
            metrics.clone(),
        ));
        (
            RemediationExecutor::new(fetcher, RetryConfig::default()),
            metrics,
        )
    }

    fn orphaned(o: &sweeper_core::types::ExchangeOrder) -> Classification {
        Classification::new(o, ZombieVerdict::Orphaned, "no position")
    }

    #[tokio::test(start_paused = true)]
    async fn second_remediation_of_same_order_is_already_gone() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        let (exec, _) = executor(&gw);
        let c = orphaned(&o);

        assert_eq!(exec.remediate(&c).await, RemediationOutcome::Cancelled);
        assert_eq!(exec.remediate(&c).await, RemediationOutcome::AlreadyGone);
        assert!(gw.open_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        gw.fail_cancel("7", GatewayError::Network("reset".into()));
        gw.fail_cancel("7", GatewayError::Timeout);
        let (exec, _) = executor(&gw);

        assert_eq!(exec.remediate(&orphaned(&o)).await, RemediationOutcome::Cancelled);
        assert_eq!(gw.calls().cancel.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_at_max_attempts() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        for _ in 0..5 {
            gw.fail_cancel("7", GatewayError::Network("reset".into()));
        }
        let (exec, _) = executor(&gw);

        let outcome = exec.remediate(&orphaned(&o)).await;
        assert!(matches!(outcome, RemediationOutcome::Failed(_)));
        assert!(!outcome.is_resolved());
        assert_eq!(gw.calls().cancel.len(), 3);
        assert_eq!(gw.open_orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_do_not_consume_retry_attempts() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        gw.fail_cancel("7", GatewayError::RateLimited);
        gw.fail_cancel("7", GatewayError::RateLimited);
        gw.fail_cancel("7", GatewayError::Network("reset".into()));
        gw.fail_cancel("7", GatewayError::Network("reset".into()));
        let (exec, metrics) = executor(&gw);

        assert_eq!(exec.remediate(&orphaned(&o)).await, RemediationOutcome::Cancelled);
        assert_eq!(gw.calls().cancel.len(), 5);
        assert_eq!(metrics.get(Counter::RateLimitHits), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn precondition_refusal_is_skipped_without_retry() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        gw.fail_cancel("7", GatewayError::exchange(Some(-1121), "Invalid symbol."));
        let (exec, _) = executor(&gw);

        let outcome = exec.remediate(&orphaned(&o)).await;
        assert!(matches!(outcome, RemediationOutcome::Skipped(_)));
        assert_eq!(gw.calls().cancel.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_carries_conditional_flag_from_order() {
        let mut o = order(Exchange::Bybit, "9", "BTCUSDT", 3600);
        o.meta.conditional = true;
        let gw = Arc::new(ScriptedGateway::new(Exchange::Bybit).with_orders(vec![o.clone()]));
        let (exec, _) = executor(&gw);

        let c = Classification::new(&o, ZombieVerdict::ConditionalWithoutPosition, "no position");
        assert_eq!(exec.remediate(&c).await, RemediationOutcome::Cancelled);
        assert!(gw.calls().cancel[0].conditional);
    }

    #[tokio::test(start_paused = true)]
    async fn oco_list_cancelled_as_a_unit_when_supported() {
        let a = oco_leg(Exchange::Binance, "a", "BTCUSDT", "L1", 3600);
        let gw = Arc::new(
            ScriptedGateway::new(Exchange::Binance)
                .with_order_lists()
                .with_orders(vec![a.clone()]),
        );
        let (exec, _) = executor(&gw);

        let c = Classification::new(
            &a,
            ZombieVerdict::OcoOrphan {
                list_id: "L1".into(),
            },
            "sibling gone",
        );
        assert_eq!(exec.remediate(&c).await, RemediationOutcome::Cancelled);
        let calls = gw.calls();
        assert_eq!(calls.cancel_list, vec!["L1".to_string()]);
        assert!(calls.cancel.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oco_falls_back_to_single_cancel_without_list_support() {
        let a = oco_leg(Exchange::Bybit, "a", "BTCUSDT", "L1", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Bybit).with_orders(vec![a.clone()]));
        let (exec, _) = executor(&gw);

        let c = Classification::new(
            &a,
            ZombieVerdict::OcoOrphan {
                list_id: "L1".into(),
            },
            "sibling gone",
        );
        assert_eq!(exec.remediate(&c).await, RemediationOutcome::Cancelled);
        assert_eq!(gw.calls().cancel.len(), 1);
        assert!(gw.open_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bybit_perpetual_stops_cleared_on_every_index() {
        let tp = take_profit(Exchange::Bybit, "tp", "BTCUSDT", 3600);
        let mut sl = take_profit(Exchange::Bybit, "sl", "BTCUSDT", 3600);
        sl.meta.stop_order_type = Some(sweeper_core::types::StopOrderType::StopLoss);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Bybit).with_orders(vec![tp.clone(), sl.clone()]));
        let (exec, _) = executor(&gw);

        let outcomes = exec.clear_symbol_stops("BTCUSDT", &[&tp, &sl]).await;

        assert_eq!(outcomes, vec![RemediationOutcome::Cancelled; 2]);
        let calls = gw.calls();
        let indices: Vec<PositionIndex> = calls.clear_stops.iter().map(|(_, idx)| *idx).collect();
        assert_eq!(indices, PositionIndex::ALL.to_vec());
        assert!(calls.cancel.is_empty());
        assert!(gw.open_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_cleared_falls_back_to_conditional_cancels() {
        let tp = take_profit(Exchange::Bybit, "tp", "BTCUSDT", 3600);
        // Not on the live list, so every index answers "not modified"
        let gw = Arc::new(ScriptedGateway::new(Exchange::Bybit));
        let (exec, _) = executor(&gw);

        let outcomes = exec.clear_symbol_stops("BTCUSDT", &[&tp]).await;

        assert_eq!(outcomes, vec![RemediationOutcome::AlreadyGone]);
        let calls = gw.calls();
        assert_eq!(calls.clear_stops.len(), 3);
        assert_eq!(calls.cancel.len(), 1);
        assert!(calls.cancel[0].conditional);
    }

    #[tokio::test(start_paused = true)]
    async fn spot_symbol_skips_position_level_clearing() {
        let tp = take_profit(Exchange::Bybit, "tp", "BTC/USDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Bybit).with_orders(vec![tp.clone()]));
        let (exec, _) = executor(&gw);

        let c = Classification::new(&tp, ZombieVerdict::ProtectiveForClosedPosition, "closed");
        assert_eq!(exec.remediate(&c).await, RemediationOutcome::Cancelled);
        let calls = gw.calls();
        assert!(calls.clear_stops.is_empty());
        assert!(calls.cancel[0].conditional);
    }

    #[tokio::test(start_paused = true)]
    async fn binance_stops_are_cancelled_one_by_one() {
        let tp = take_profit(Exchange::Binance, "tp", "BTCUSDT", 3600);
        let sl = take_profit(Exchange::Binance, "sl", "BTCUSDT", 3600);
        let gw = Arc::new(
            ScriptedGateway::new(Exchange::Binance).with_orders(vec![tp.clone(), sl.clone()]),
        );
        let (exec, _) = executor(&gw);

        let outcomes = exec.clear_symbol_stops("BTCUSDT", &[&tp, &sl]).await;

        assert_eq!(outcomes, vec![RemediationOutcome::Cancelled; 2]);
        assert!(gw.calls().clear_stops.is_empty());
        assert_eq!(gw.calls().cancel.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_clears_symbol_and_reports_failure() {
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![
            order(Exchange::Binance, "1", "BTCUSDT", 3600),
            order(Exchange::Binance, "2", "BTCUSDT", 3600),
            order(Exchange::Binance, "3", "ETHUSDT", 3600),
        ]));
        let (exec, _) = executor(&gw);

        assert_eq!(
            exec.cancel_all_for_symbol("BTCUSDT").await,
            RemediationOutcome::Cancelled
        );
        assert_eq!(gw.open_orders().len(), 1);

        gw.fail_cancel_all(GatewayError::exchange(Some(-1000), "internal error"));
        assert!(matches!(
            exec.cancel_all_for_symbol("ETHUSDT").await,
            RemediationOutcome::Failed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn non_zombie_is_never_touched() {
        let o = order(Exchange::Binance, "7", "BTCUSDT", 3600);
        let gw = Arc::new(ScriptedGateway::new(Exchange::Binance).with_orders(vec![o.clone()]));
        let (exec, _) = executor(&gw);

        let c = Classification::new(&o, ZombieVerdict::NotZombie, "healthy");
        assert!(matches!(exec.remediate(&c).await, RemediationOutcome::Skipped(_)));
        assert!(gw.calls().cancel.is_empty());
    }
}
