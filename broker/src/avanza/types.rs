//! Avanza API request and response types.

use serde::{Deserialize, Serialize};

/// First login step response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub two_factor_login: Option<TwoFactorLogin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorLogin {
    pub transaction_id: String,
    pub method: String,
}

/// Second login step response. The security token arrives as a header.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpResponse {
    pub authentication_session: String,
    #[serde(default)]
    pub customer_id: String,
}

/// A number wrapped as `{ "value": n }`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub value: f64,
}

/// Index overview.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub quote: QuoteBlock,
    pub historical_closing_prices: HistoricalClosingPrices,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBlock {
    pub previous_closing_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalClosingPrices {
    pub one_week: Option<f64>,
    pub one_month: Option<f64>,
    pub three_months: Option<f64>,
    pub one_year: Option<f64>,
}

/// Daily price chart.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    #[serde(default)]
    pub ohlc: Vec<ChartBar>,
}

#[derive(Debug, Deserialize)]
pub struct ChartBar {
    pub timestamp: i64,
    pub close: f64,
}

/// Leveraged tracker filter request.
#[derive(Debug, Serialize)]
pub struct FilterRequest {
    pub filter: FilterBody,
    pub offset: u32,
    pub limit: u32,
    #[serde(rename = "sortBy")]
    pub sort_by: SortBy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterBody {
    pub directions: Vec<String>,
    pub sub_types: Vec<String>,
    pub underlying_instruments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SortBy {
    pub field: String,
    pub order: String,
}

#[derive(Debug, Deserialize)]
pub struct FilterResponse {
    #[serde(default)]
    pub warrants: Vec<FilteredInstrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredInstrument {
    pub orderbook_id: String,
    pub name: String,
    #[serde(default)]
    pub leverage: f64,
    #[serde(default)]
    pub total_value_traded: f64,
}

/// One entry of the orderbook list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderbookSummary {
    pub id: String,
    pub last_price: f64,
}

/// Tracker order request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub account_id: String,
    pub orderbook_id: String,
    pub side: String,
    pub price: f64,
    pub volume: u64,
    pub condition: String,
}

/// Fund order request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFundOrderRequest {
    pub account_id: String,
    pub orderbook_id: String,
    pub side: String,
    pub volume: u64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_request_status: String,
    pub order_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundOrderResponse {
    pub order_request_status: String,
    pub order_id: Option<String>,
    /// `YYYY-MM-DD`
    pub on_account_date: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusResponse {
    pub state: String,
}

/// All positions across accounts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    #[serde(default)]
    pub with_orderbook: Vec<PositionEntry>,
    #[serde(default)]
    pub cash_positions: Vec<CashEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub url_parameter_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PositionEntry {
    pub account: AccountRef,
    pub instrument: PositionInstrument,
    #[serde(default)]
    pub value: Amount,
    #[serde(default)]
    pub volume: Amount,
}

#[derive(Debug, Deserialize)]
pub struct PositionInstrument {
    pub orderbook: OrderbookRef,
}

#[derive(Debug, Deserialize)]
pub struct OrderbookRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashEntry {
    pub account: AccountRef,
    #[serde(default)]
    pub total_balance: Amount,
}

#[derive(Debug, Deserialize)]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub id: String,
    pub url_parameter_id: String,
}

/// Instrument detail; only the underlying is read.
#[derive(Debug, Deserialize)]
pub struct InstrumentDetail {
    pub underlying: Option<UnderlyingRef>,
}

#[derive(Debug, Deserialize)]
pub struct UnderlyingRef {
    pub orderbook: OrderbookRef,
}
