//! Canned venue payloads shared by the adapter tests.

pub mod binance {
    pub fn open_orders_json() -> &'static str {
        r#"[
            {
                "orderId": 8886774,
                "symbol": "BTCUSDT",
                "status": "NEW",
                "clientOrderId": "tp-ladder-1",
                "price": "71000",
                "origQty": "0.010",
                "executedQty": "0",
                "type": "LIMIT",
                "side": "SELL",
                "stopPrice": "0",
                "reduceOnly": true,
                "closePosition": false,
                "positionSide": "BOTH",
                "time": 1717000000000
            },
            {
                "orderId": 8886775,
                "symbol": "BTCUSDT",
                "status": "NEW",
                "clientOrderId": "",
                "price": "0",
                "origQty": "0",
                "executedQty": "0",
                "type": "TAKE_PROFIT_MARKET",
                "side": "SELL",
                "stopPrice": "72000",
                "reduceOnly": true,
                "closePosition": true,
                "positionSide": "BOTH",
                "time": 1717000001000
            }
        ]"#
    }

    pub fn open_algo_orders_json() -> &'static str {
        r#"[
            {
                "algoId": 3000000123,
                "clientAlgoId": "sl-eth-long",
                "algoType": "CONDITIONAL",
                "orderType": "STOP_MARKET",
                "symbol": "ETHUSDT",
                "side": "SELL",
                "positionSide": "LONG",
                "quantity": "0.500",
                "price": "0",
                "triggerPrice": "2800",
                "algoStatus": "NEW",
                "reduceOnly": true,
                "closePosition": false,
                "createTime": 1717000002000
            }
        ]"#
    }

    pub fn order_json() -> &'static str {
        r#"{
            "orderId": 8886774,
            "symbol": "BTCUSDT",
            "status": "FILLED",
            "clientOrderId": "tp-ladder-1",
            "price": "71000",
            "origQty": "0.010",
            "executedQty": "0.010",
            "type": "LIMIT",
            "side": "SELL",
            "stopPrice": "0",
            "reduceOnly": true,
            "closePosition": false,
            "positionSide": "BOTH",
            "time": 1717000000000
        }"#
    }

    pub fn position_risk_json() -> &'static str {
        r#"[
            {
                "symbol": "BTCUSDT",
                "positionAmt": "-0.010",
                "entryPrice": "70500.0",
                "markPrice": "70410.5",
                "positionSide": "BOTH"
            },
            {
                "symbol": "ETHUSDT",
                "positionAmt": "0.500",
                "entryPrice": "3000.0",
                "markPrice": "3012.1",
                "positionSide": "LONG"
            },
            {
                "symbol": "ETHUSDT",
                "positionAmt": "0",
                "entryPrice": "0.0",
                "markPrice": "3012.1",
                "positionSide": "SHORT"
            }
        ]"#
    }
}

pub mod bybit {
    pub fn open_orders_json() -> &'static str {
        r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "nextPageCursor": "",
                "list": [
                    {
                        "orderId": "1f0a6b2e-0001",
                        "orderLinkId": "grid-7",
                        "symbol": "XRPUSDT",
                        "side": "Buy",
                        "orderType": "Limit",
                        "price": "0.4800",
                        "qty": "100",
                        "orderStatus": "New",
                        "stopOrderType": "",
                        "triggerPrice": "0",
                        "reduceOnly": false,
                        "closeOnTrigger": false,
                        "positionIdx": 0,
                        "createdTime": "1717000000000"
                    },
                    {
                        "orderId": "1f0a6b2e-0002",
                        "orderLinkId": "",
                        "symbol": "BTCUSDT",
                        "side": "Sell",
                        "orderType": "Market",
                        "price": "0",
                        "qty": "0.01",
                        "orderStatus": "Untriggered",
                        "stopOrderType": "StopLoss",
                        "triggerPrice": "60000",
                        "reduceOnly": true,
                        "closeOnTrigger": true,
                        "positionIdx": 0,
                        "createdTime": "1717000001000"
                    }
                ]
            },
            "retExtInfo": {},
            "time": 1717000005000
        }"#
    }

    pub fn open_orders_first_page_json() -> &'static str {
        r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "nextPageCursor": "page-2",
                "list": [
                    {
                        "orderId": "p1",
                        "symbol": "DOGEUSDT",
                        "side": "Buy",
                        "orderType": "Limit",
                        "price": "0.1",
                        "qty": "1000",
                        "orderStatus": "New",
                        "positionIdx": 0,
                        "createdTime": "1717000000000"
                    }
                ]
            },
            "time": 1717000005000
        }"#
    }

    pub fn open_orders_second_page_json() -> &'static str {
        r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "nextPageCursor": "",
                "list": [
                    {
                        "orderId": "p2",
                        "symbol": "DOGEUSDT",
                        "side": "Sell",
                        "orderType": "Limit",
                        "price": "0.2",
                        "qty": "1000",
                        "orderStatus": "PartiallyFilled",
                        "positionIdx": 0,
                        "createdTime": "1717000000000"
                    }
                ]
            },
            "time": 1717000005000
        }"#
    }

    pub fn empty_orders_json() -> &'static str {
        r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","nextPageCursor":"","list":[]},"time":1717000005000}"#
    }

    pub fn order_history_json() -> &'static str {
        r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "nextPageCursor": "",
                "list": [
                    {
                        "orderId": "1f0a6b2e-0009",
                        "symbol": "XRPUSDT",
                        "side": "Buy",
                        "orderType": "Limit",
                        "price": "0.4800",
                        "qty": "100",
                        "orderStatus": "Filled",
                        "positionIdx": 0,
                        "createdTime": "1717000000000"
                    }
                ]
            },
            "time": 1717000005000
        }"#
    }

    pub fn positions_json() -> &'static str {
        r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "nextPageCursor": "",
                "list": [
                    {
                        "symbol": "BTCUSDT",
                        "side": "Buy",
                        "size": "0.01",
                        "avgPrice": "70000",
                        "markPrice": "70100",
                        "positionIdx": 0
                    },
                    {
                        "symbol": "ETHUSDT",
                        "side": "Sell",
                        "size": "2.5",
                        "avgPrice": "3100",
                        "markPrice": "3050",
                        "positionIdx": 2
                    },
                    {
                        "symbol": "SOLUSDT",
                        "side": "",
                        "size": "0",
                        "avgPrice": "0",
                        "markPrice": "150",
                        "positionIdx": 0
                    }
                ]
            },
            "time": 1717000005000
        }"#
    }

    pub fn ok_json() -> &'static str {
        r#"{"retCode":0,"retMsg":"OK","result":{},"retExtInfo":{},"time":1717000005000}"#
    }

    pub fn error_json(code: i64, message: &str) -> String {
        format!(r#"{{"retCode":{code},"retMsg":"{message}","result":{{}},"time":1717000005000}}"#)
    }
}
