//! Avanza REST API client.

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BrokerError;

pub const BASE_URL: &str = "https://www.avanza.se";

pub const CREDENTIALS_PATH: &str = "/_api/authentication/sessions/usercredentials";
pub const TOTP_PATH: &str = "/_api/authentication/sessions/totp";
pub const LOGOUT_PATH: &str = "/_api/authentication/session";
pub const INDEX_PATH: &str = "/_api/market-index";
pub const CHART_PATH: &str = "/_api/price-chart/stock";
pub const FILTER_PATH: &str = "/_api/market-warrant-filter/";
pub const ORDERBOOK_LIST_PATH: &str = "/_mobile/market/orderbooklist";
pub const ORDER_PATH: &str = "/_api/trading-critical/rest/order/new";
pub const FUND_ORDER_PATH: &str = "/_api/fund-reference/order";
pub const ORDER_STATUS_PATH: &str = "/_api/trading-critical/rest/order";
pub const POSITIONS_PATH: &str = "/_api/position-data/positions";
pub const ACCOUNTS_PATH: &str = "/_api/account-overview/overview/categorizedAccounts";
pub const INSTRUMENT_PATH: &str = "/_api/market-guide/warrant";

pub const SECURITY_TOKEN_HEADER: &str = "X-SecurityToken";

/// Blocking Avanza client. Cookies persist across calls.
pub struct AvanzaClient {
    client: Client,
    base_url: String,
}

impl AvanzaClient {
    pub fn new() -> Result<Self, BrokerError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_token(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(t) => req.header(SECURITY_TOKEN_HEADER, t),
            None => req,
        }
    }

    /// GET and decode a JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, BrokerError> {
        debug!("GET {path}");
        let resp = Self::with_token(self.client.get(self.url(path)), Some(token))
            .send()
            .map_err(|e| BrokerError::Connection(format!("GET {path} failed: {e}")))?;
        decode(path, check(path, resp)?)
    }

    /// POST a JSON body and decode the JSON reply.
    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, BrokerError> {
        Ok(self.post_json_with_headers(path, token, body)?.0)
    }

    /// Like [`post_json`](Self::post_json), also returning the security token header if present.
    pub fn post_json_with_headers<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<(T, Option<String>), BrokerError> {
        debug!("POST {path}");
        let resp = Self::with_token(self.client.post(self.url(path)), token)
            .json(body)
            .send()
            .map_err(|e| BrokerError::Connection(format!("POST {path} failed: {e}")))?;
        let resp = check(path, resp)?;
        let security_token = resp
            .headers()
            .get(SECURITY_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((decode(path, resp)?, security_token))
    }

    /// DELETE, ignoring the body.
    pub fn delete(&self, path: &str, token: &str) -> Result<(), BrokerError> {
        debug!("DELETE {path}");
        let resp = Self::with_token(self.client.delete(self.url(path)), Some(token))
            .send()
            .map_err(|e| BrokerError::Connection(format!("DELETE {path} failed: {e}")))?;
        check(path, resp)?;
        Ok(())
    }
}

fn check(path: &str, resp: Response) -> Result<Response, BrokerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        Err(BrokerError::Auth(format!("{path} returned {status}: {body}")))
    } else if status.as_u16() == 404 {
        Err(BrokerError::NotFound(format!("{path} returned {status}")))
    } else {
        Err(BrokerError::Connection(format!("{path} returned {status}: {body}")))
    }
}

fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, BrokerError> {
    resp.json::<T>()
        .map_err(|e| BrokerError::Parse(format!("failed to parse {path}: {e}")))
}
