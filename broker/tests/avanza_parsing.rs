//! Tests for Avanza response parsing and request shaping. No live connection needed.

#[cfg(feature = "avanza")]
mod avanza_tests {
    use trendbook::{AssetId, InstrumentSearch, LookbackPeriod};
    use trendbook_broker::avanza::types::*;
    use trendbook_broker::avanza::{self, AvanzaCredentials};
    use trendbook_broker::{AccountId, BrokerSide, InstrumentQuery, OrderRequest, PlacementStatus};

    // ========================================================================
    // Market data
    // ========================================================================

    #[test]
    fn index_quote_picks_period() {
        let json = r#"{
            "quote": { "last": 1862.0, "previousClosingPrice": 1850.5 },
            "historicalClosingPrices": {
                "oneWeek": 1800.0,
                "oneMonth": 1700.0,
                "threeMonths": null,
                "oneYear": 1500.0
            }
        }"#;
        let resp: IndexResponse = serde_json::from_str(json).unwrap();

        let q = avanza::index_quote(&resp, LookbackPeriod::OneMonth).unwrap();
        assert_eq!(q.last_price, 1850.5);
        assert_eq!(q.compare_price, 1700.0);
        assert!(avanza::index_quote(&resp, LookbackPeriod::ThreeMonths).is_none());
    }

    #[test]
    fn index_quote_needs_previous_close() {
        let json = r#"{
            "quote": { "last": 1862.0 },
            "historicalClosingPrices": { "oneMonth": 1700.0 }
        }"#;
        let resp: IndexResponse = serde_json::from_str(json).unwrap();
        assert!(avanza::index_quote(&resp, LookbackPeriod::OneMonth).is_none());
    }

    #[test]
    fn chart_sorted_oldest_first() {
        let json = r#"{ "ohlc": [
            { "timestamp": 3, "open": 1.0, "close": 30.0 },
            { "timestamp": 1, "open": 1.0, "close": 10.0 },
            { "timestamp": 2, "open": 1.0, "close": 20.0 }
        ] }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let closes: Vec<f64> = avanza::candles(resp).iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn orderbook_list_entry() {
        let json = r#"[{ "id": "1337", "lastPrice": 12.34, "name": "MINI L OMX" }]"#;
        let resp: Vec<OrderbookSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(resp[0].last_price, 12.34);
    }

    // ========================================================================
    // Instrument search
    // ========================================================================

    #[test]
    fn filter_request_by_underlying() {
        let query = InstrumentQuery::long_mini_futures(
            &AssetId::new("19002"),
            &InstrumentSearch::Underlying,
            20,
        );
        let body = serde_json::to_value(avanza::filter_request(&query)).unwrap();
        assert_eq!(body["filter"]["directions"][0], "long");
        assert_eq!(body["filter"]["subTypes"][0], "mini_future");
        assert_eq!(body["filter"]["underlyingInstruments"][0], "19002");
        assert!(body["filter"].get("name").is_none());
        assert_eq!(body["sortBy"]["field"], "leverage");
        assert_eq!(body["sortBy"]["order"], "asc");
        assert_eq!(body["limit"], 20);
    }

    #[test]
    fn filter_request_by_name() {
        let query = InstrumentQuery::long_mini_futures(
            &AssetId::new("155458"),
            &InstrumentSearch::NameQuery {
                query: "SP500".into(),
            },
            20,
        );
        let body = serde_json::to_value(avanza::filter_request(&query)).unwrap();
        assert_eq!(body["filter"]["name"], "SP500");
        assert_eq!(body["filter"]["underlyingInstruments"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn filter_response_to_instruments() {
        let json = r#"{ "warrants": [
            { "orderbookId": "A1", "name": "MINI L OMX AVA 1", "leverage": 1.8, "totalValueTraded": 5000.0 },
            { "orderbookId": "A2", "name": "MINI L OMX AVA 2", "leverage": 2.4 }
        ] }"#;
        let resp: FilterResponse = serde_json::from_str(json).unwrap();
        let list = avanza::instruments(resp);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].orderbook_id, AssetId::new("A1"));
        assert_eq!(list[0].leverage, 1.8);
        assert_eq!(list[1].traded_value, 0.0);
    }

    // ========================================================================
    // Orders
    // ========================================================================

    fn request() -> OrderRequest {
        OrderRequest {
            account: AccountId("9876".into()),
            orderbook_id: AssetId::new("A1"),
            side: BrokerSide::Sell,
            volume: 42,
            price: 10.5,
        }
    }

    #[test]
    fn order_request_shape() {
        let body = serde_json::to_value(avanza::order_request(&request())).unwrap();
        assert_eq!(body["accountId"], "9876");
        assert_eq!(body["orderbookId"], "A1");
        assert_eq!(body["side"], "SELL");
        assert_eq!(body["volume"], 42);
        assert_eq!(body["condition"], "NORMAL");
    }

    #[test]
    fn order_response_rejected_keeps_message() {
        let json = r#"{ "orderRequestStatus": "ERROR", "message": "closed" }"#;
        let resp: OrderResponse = serde_json::from_str(json).unwrap();
        assert!(resp.order_id.is_none());
        assert_eq!(
            avanza::placement_status(&resp.order_request_status, &resp.message),
            PlacementStatus::Rejected("ERROR: closed".into())
        );
    }

    #[test]
    fn fund_order_response_date() {
        let json = r#"{ "orderRequestStatus": "SUCCESS", "orderId": "55", "onAccountDate": "2024-03-15" }"#;
        let resp: FundOrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.order_id.as_deref(), Some("55"));
        let date = avanza::parse_date(resp.on_account_date.as_deref().unwrap()).unwrap();
        assert_eq!(date.to_string(), "2024-03-15");
        assert!(avanza::parse_date("15/03/2024").is_none());
    }

    // ========================================================================
    // Accounts and positions
    // ========================================================================

    #[test]
    fn positions_filtered_by_account() {
        let json = r#"{
            "withOrderbook": [
                { "account": { "urlParameterId": "abc" },
                  "instrument": { "orderbook": { "id": "A1" } },
                  "value": { "value": 1000.0 }, "volume": { "value": 10.0 } },
                { "account": { "urlParameterId": "other" },
                  "instrument": { "orderbook": { "id": "B1" } },
                  "value": { "value": 5.0 }, "volume": { "value": 1.0 } }
            ],
            "cashPositions": [
                { "account": { "urlParameterId": "abc" }, "totalBalance": { "value": 250.0 } },
                { "account": { "urlParameterId": "other" }, "totalBalance": { "value": 99.0 } }
            ]
        }"#;
        let resp: PositionsResponse = serde_json::from_str(json).unwrap();
        let positions = avanza::positions_for_account(resp, "abc");
        assert_eq!(positions.asset_positions.len(), 1);
        assert_eq!(positions.asset_positions[0].orderbook_id, AssetId::new("A1"));
        assert_eq!(positions.asset_positions[0].shares, 10.0);
        assert_eq!(positions.total_cash(), 250.0);
    }

    #[test]
    fn account_lookup() {
        let json = r#"{ "accounts": [
            { "id": "111", "urlParameterId": "x" },
            { "id": "222", "urlParameterId": "y" }
        ] }"#;
        let resp: AccountsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(avanza::account_id_for(&resp, "y"), Some(AccountId("222".into())));
        assert_eq!(avanza::account_id_for(&resp, "z"), None);
    }

    #[test]
    fn instrument_underlying() {
        let json = r#"{ "underlying": { "orderbook": { "id": "19002" } } }"#;
        let resp: InstrumentDetail = serde_json::from_str(json).unwrap();
        assert_eq!(resp.underlying.unwrap().orderbook.id, "19002");
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = AvanzaCredentials {
            username: "me".into(),
            password: "hunter2".into(),
            totp_secret: "GEZDGNBV".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("me"));
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("GEZDGNBV"));
    }
}
