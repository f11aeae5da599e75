//! Avanza brokerage implementation.

pub mod auth;
pub mod client;
pub mod types;

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use trendbook::{AssetId, LeveragedInstrument, LookbackPeriod};

use crate::Brokerage;
use crate::error::BrokerError;
use crate::types::*;
use client::AvanzaClient;
use types::*;

/// Login credentials, usually read from a separate TOML file.
#[derive(Clone, Deserialize)]
pub struct AvanzaCredentials {
    pub username: String,
    pub password: String,
    /// Base32 TOTP secret.
    pub totp_secret: String,
}

impl fmt::Debug for AvanzaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvanzaCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("totp_secret", &"<redacted>")
            .finish()
    }
}

struct Session {
    security_token: String,
    holds: usize,
}

/// Avanza broker implementing the generic Brokerage trait.
///
/// Blocking REST via reqwest. One login is shared by all concurrent
/// holders; the last [`end_session`](Brokerage::end_session) logs out.
pub struct AvanzaBroker {
    credentials: AvanzaCredentials,
    client: AvanzaClient,
    session: Mutex<Option<Session>>,
}

impl AvanzaBroker {
    pub fn new(credentials: AvanzaCredentials) -> Result<Self, BrokerError> {
        Ok(Self {
            credentials,
            client: AvanzaClient::new()?,
            session: Mutex::new(None),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Session>>, BrokerError> {
        self.session
            .lock()
            .map_err(|_| BrokerError::Other("session lock poisoned".into()))
    }

    fn token(&self) -> Result<String, BrokerError> {
        self.lock()?
            .as_ref()
            .map(|s| s.security_token.clone())
            .ok_or(BrokerError::NotConnected)
    }

    fn login(&self) -> Result<String, BrokerError> {
        let step: CredentialsResponse = self.client.post_json(
            client::CREDENTIALS_PATH,
            None,
            &json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }),
        )?;
        let two_factor = step
            .two_factor_login
            .ok_or_else(|| BrokerError::Auth("two-factor login not offered".into()))?;
        if two_factor.method != "TOTP" {
            return Err(BrokerError::Auth(format!(
                "unsupported two-factor method {}",
                two_factor.method
            )));
        }
        debug!("TOTP transaction {}", two_factor.transaction_id);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| BrokerError::Other(format!("system clock before epoch: {e}")))?
            .as_secs();
        let code = auth::totp(&self.credentials.totp_secret, now)?;

        let (session, token): (TotpResponse, _) = self.client.post_json_with_headers(
            client::TOTP_PATH,
            None,
            &json!({ "method": "TOTP", "totpCode": code }),
        )?;
        let token = token.ok_or_else(|| BrokerError::Auth("no security token in login reply".into()))?;
        info!("Avanza session opened for customer {}", session.customer_id);
        Ok(token)
    }
}

impl Brokerage for AvanzaBroker {
    fn authenticate(&self) -> Result<(), BrokerError> {
        let mut session = self.lock()?;
        match session.as_mut() {
            Some(s) => s.holds += 1,
            None => {
                let security_token = self.login()?;
                *session = Some(Session {
                    security_token,
                    holds: 1,
                });
            }
        }
        Ok(())
    }

    fn end_session(&self) -> Result<(), BrokerError> {
        let mut session = self.lock()?;
        let Some(s) = session.as_mut() else {
            return Ok(());
        };
        if s.holds > 1 {
            s.holds -= 1;
            return Ok(());
        }
        let token = s.security_token.clone();
        *session = None;
        info!("Closing Avanza session");
        self.client.delete(client::LOGOUT_PATH, &token)
    }

    fn index_quote(&self, asset: &AssetId, period: LookbackPeriod) -> Result<IndexQuote, BrokerError> {
        let token = self.token()?;
        let resp: IndexResponse = self
            .client
            .get_json(&format!("{}/{asset}", client::INDEX_PATH), &token)?;
        index_quote(&resp, period)
            .ok_or_else(|| BrokerError::NotFound(format!("{period} close for {asset}")))
    }

    fn price_history(&self, asset: &AssetId) -> Result<Vec<Candle>, BrokerError> {
        let token = self.token()?;
        let resp: ChartResponse = self.client.get_json(
            &format!("{}/{asset}?timePeriod=one_year", client::CHART_PATH),
            &token,
        )?;
        Ok(candles(resp))
    }

    fn leveraged_instruments(
        &self,
        query: &InstrumentQuery,
    ) -> Result<Vec<LeveragedInstrument>, BrokerError> {
        let token = self.token()?;
        let resp: FilterResponse =
            self.client
                .post_json(client::FILTER_PATH, Some(&token), &filter_request(query))?;
        Ok(instruments(resp))
    }

    fn last_price(&self, asset: &AssetId) -> Result<f64, BrokerError> {
        let token = self.token()?;
        let resp: Vec<OrderbookSummary> = self
            .client
            .get_json(&format!("{}/{asset}", client::ORDERBOOK_LIST_PATH), &token)?;
        resp.first()
            .map(|o| o.last_price)
            .ok_or_else(|| BrokerError::NotFound(format!("orderbook {asset}")))
    }

    fn place_instrument_order(&self, order: &OrderRequest) -> Result<OrderPlacement, BrokerError> {
        let token = self.token()?;
        let resp: OrderResponse =
            self.client
                .post_json(client::ORDER_PATH, Some(&token), &order_request(order))?;
        Ok(OrderPlacement {
            status: placement_status(&resp.order_request_status, &resp.message),
            order_id: resp.order_id.map(OrderId),
        })
    }

    fn place_fund_order(&self, order: &OrderRequest) -> Result<FundPlacement, BrokerError> {
        let token = self.token()?;
        let resp: FundOrderResponse = self.client.post_json(
            client::FUND_ORDER_PATH,
            Some(&token),
            &fund_order_request(order),
        )?;
        Ok(FundPlacement {
            status: placement_status(&resp.order_request_status, &resp.message),
            order_id: resp.order_id.map(OrderId),
            settlement_date: resp.on_account_date.as_deref().and_then(parse_date),
        })
    }

    fn order_status(&self, account: &AccountId, order: &OrderId) -> Result<OrderState, BrokerError> {
        let token = self.token()?;
        let resp: OrderStatusResponse = self.client.get_json(
            &format!("{}/{account}/{order}", client::ORDER_STATUS_PATH),
            &token,
        )?;
        Ok(OrderState::from_status(&resp.state))
    }

    fn account_positions(&self, account_url: &str) -> Result<AccountPositions, BrokerError> {
        let token = self.token()?;
        let resp: PositionsResponse = self.client.get_json(client::POSITIONS_PATH, &token)?;
        Ok(positions_for_account(resp, account_url))
    }

    fn resolve_account(&self, account_url: &str) -> Result<AccountId, BrokerError> {
        let token = self.token()?;
        let resp: AccountsResponse = self.client.get_json(client::ACCOUNTS_PATH, &token)?;
        account_id_for(&resp, account_url)
            .ok_or_else(|| BrokerError::NotFound(format!("account {account_url}")))
    }

    fn underlying_for(&self, instrument: &AssetId) -> Result<AssetId, BrokerError> {
        let token = self.token()?;
        let resp: InstrumentDetail = self
            .client
            .get_json(&format!("{}/{instrument}", client::INSTRUMENT_PATH), &token)?;
        resp.underlying
            .map(|u| AssetId::new(u.orderbook.id))
            .ok_or_else(|| BrokerError::NotFound(format!("underlying of {instrument}")))
    }
}

// ============================================================================
// Response mapping
// ============================================================================

/// Previous close plus the historical close matching `period`.
///
/// Both sides are closes, so the reading does not move intraday.
pub fn index_quote(resp: &IndexResponse, period: LookbackPeriod) -> Option<IndexQuote> {
    let h = &resp.historical_closing_prices;
    let compare = match period {
        LookbackPeriod::OneWeek => h.one_week,
        LookbackPeriod::OneMonth => h.one_month,
        LookbackPeriod::ThreeMonths => h.three_months,
        LookbackPeriod::OneYear => h.one_year,
    }?;
    Some(IndexQuote {
        last_price: resp.quote.previous_closing_price?,
        compare_price: compare,
    })
}

/// Daily closes, oldest first.
pub fn candles(resp: ChartResponse) -> Vec<Candle> {
    let mut bars = resp.ohlc;
    bars.sort_by_key(|b| b.timestamp);
    bars.into_iter().map(|b| Candle { close: b.close }).collect()
}

pub fn filter_request(query: &InstrumentQuery) -> FilterRequest {
    FilterRequest {
        filter: FilterBody {
            directions: query.directions.clone(),
            sub_types: query.sub_types.clone(),
            underlying_instruments: query
                .underlying_instruments
                .iter()
                .map(|id| id.to_string())
                .collect(),
            name: query.name_query.clone(),
        },
        offset: query.offset,
        limit: query.limit,
        sort_by: SortBy {
            field: query.sort_field.clone(),
            order: "asc".into(),
        },
    }
}

pub fn instruments(resp: FilterResponse) -> Vec<LeveragedInstrument> {
    resp.warrants
        .into_iter()
        .map(|w| LeveragedInstrument {
            orderbook_id: AssetId::new(w.orderbook_id),
            name: w.name,
            leverage: w.leverage,
            traded_value: w.total_value_traded,
        })
        .collect()
}

/// Keep only the holdings and cash of one account.
pub fn positions_for_account(resp: PositionsResponse, account_url: &str) -> AccountPositions {
    AccountPositions {
        asset_positions: resp
            .with_orderbook
            .into_iter()
            .filter(|p| p.account.url_parameter_id == account_url)
            .map(|p| HeldPosition {
                orderbook_id: AssetId::new(p.instrument.orderbook.id),
                total_value: p.value.value,
                shares: p.volume.value,
            })
            .collect(),
        cash_positions: resp
            .cash_positions
            .into_iter()
            .filter(|c| c.account.url_parameter_id == account_url)
            .map(|c| CashPosition {
                total_value: c.total_balance.value,
            })
            .collect(),
    }
}

pub fn account_id_for(resp: &AccountsResponse, account_url: &str) -> Option<AccountId> {
    resp.accounts
        .iter()
        .find(|a| a.url_parameter_id == account_url)
        .map(|a| AccountId(a.id.clone()))
}

pub fn order_request(order: &OrderRequest) -> NewOrderRequest {
    NewOrderRequest {
        account_id: order.account.to_string(),
        orderbook_id: order.orderbook_id.to_string(),
        side: order.side.to_string(),
        price: order.price,
        volume: order.volume,
        condition: "NORMAL".into(),
    }
}

pub fn fund_order_request(order: &OrderRequest) -> NewFundOrderRequest {
    NewFundOrderRequest {
        account_id: order.account.to_string(),
        orderbook_id: order.orderbook_id.to_string(),
        side: order.side.to_string(),
        volume: order.volume,
        price: order.price,
    }
}

pub fn placement_status(status: &str, message: &str) -> PlacementStatus {
    match PlacementStatus::from_status(status) {
        PlacementStatus::Rejected(s) if !message.is_empty() => {
            PlacementStatus::Rejected(format!("{s}: {message}"))
        }
        other => other,
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
