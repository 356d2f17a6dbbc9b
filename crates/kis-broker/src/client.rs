//! HTTP client for the brokerage REST API.
//!
//! tr_ids are declared in their live form; paper mode substitutes the
//! leading letter with `V` for the transaction families that have paper
//! variants. Mutating calls fetch a hashkey over the exact request body
//! first and attach it as a header.

use crate::error::{BrokerError, BrokerResult};
use crate::types::{
    BalanceEnvelope, CandleEnvelope, CurrentPrice, DailyCandle, Envelope, Holding, OrderAccepted,
    OrderOutput, PriceOutput,
};
use kis_core::{OrderSide, OrderType, Price, StockCode, TradingMode};
use kis_session::SessionManager;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TR_BUY: &str = "TTTC0012U";
const TR_SELL: &str = "TTTC0011U";
const TR_CANCEL_REVISE: &str = "TTTC0013U";
const TR_PRICE: &str = "FHKST01010100";
const TR_DAILY_CANDLES: &str = "FHKST03010100";
const TR_BALANCE: &str = "TTTC8434R";

const PATH_ORDER_CASH: &str = "/uapi/domestic-stock/v1/trading/order-cash";
const PATH_ORDER_RVSECNCL: &str = "/uapi/domestic-stock/v1/trading/order-rvsecncl";
const PATH_INQUIRE_PRICE: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";
const PATH_DAILY_CANDLES: &str = "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice";
const PATH_INQUIRE_BALANCE: &str = "/uapi/domestic-stock/v1/trading/inquire-balance";
const PATH_HASHKEY: &str = "/uapi/hashkey";

/// Substitute the paper-mode tr_id where one exists.
fn tr_id_for_mode(tr_id: &str, mode: TradingMode) -> String {
    if mode.is_paper() && tr_id.starts_with(['T', 'J', 'C']) {
        format!("V{}", &tr_id[1..])
    } else {
        tr_id.to_string()
    }
}

/// Split a 10-digit account number into CANO and product code.
fn split_account(account: &str) -> (&str, &str) {
    if account.len() > 8 {
        account.split_at(8)
    } else {
        (account, "01")
    }
}

fn parse_price_field(field: &str) -> Price {
    field.trim().parse().unwrap_or(Price::ZERO)
}

fn parse_qty_field(field: &str) -> u64 {
    field.trim().parse().unwrap_or(0)
}

/// REST client bound to one session.
pub struct BrokerClient {
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl BrokerClient {
    pub fn new(session: Arc<SessionManager>) -> BrokerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self { http, session })
    }

    /// Place a cash order. Market orders go out with unit price "0".
    pub async fn place_order(
        &self,
        side: OrderSide,
        stock_code: &StockCode,
        quantity: u32,
        price: Price,
        order_type: OrderType,
    ) -> BrokerResult<OrderAccepted> {
        let (cano, prdt) = split_account(self.session.account_number());
        let unit_price = match order_type {
            OrderType::Market => "0".to_string(),
            OrderType::Limit => price.to_won().to_string(),
        };

        let body = json!({
            "CANO": cano,
            "ACNT_PRDT_CD": prdt,
            "PDNO": stock_code.as_str(),
            "ORD_DVSN": order_type.broker_code(),
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": unit_price,
            "CNDT_PRIC": "",
            "SLL_TYPE": "01",
            "ALGO_NO": "",
        });

        let tr_id = match side {
            OrderSide::Buy => TR_BUY,
            OrderSide::Sell => TR_SELL,
        };

        info!(
            code = %stock_code,
            %side,
            quantity,
            order_type = %order_type,
            "Placing order"
        );

        let envelope: Envelope<OrderOutput> = self.post(PATH_ORDER_CASH, tr_id, &body).await?;
        let output = Self::unwrap_envelope(envelope)?;

        let order_id = output
            .odno
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BrokerError::MissingField("ODNO".to_string()))?;

        Ok(OrderAccepted {
            order_id,
            branch: output.branch.unwrap_or_else(|| "06010".to_string()),
            order_time: output.order_time.unwrap_or_default(),
        })
    }

    /// Cancel an accepted order in full.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        branch: &str,
        quantity: u32,
    ) -> BrokerResult<()> {
        self.cancel_or_revise(order_id, branch, quantity, Price::ZERO, "02")
            .await
    }

    /// Revise an accepted order to a new price.
    pub async fn revise_order(
        &self,
        order_id: &str,
        branch: &str,
        quantity: u32,
        new_price: Price,
    ) -> BrokerResult<()> {
        self.cancel_or_revise(order_id, branch, quantity, new_price, "01")
            .await
    }

    async fn cancel_or_revise(
        &self,
        order_id: &str,
        branch: &str,
        quantity: u32,
        price: Price,
        rvse_cncl_code: &str,
    ) -> BrokerResult<()> {
        let (cano, prdt) = split_account(self.session.account_number());
        let body = json!({
            "CANO": cano,
            "ACNT_PRDT_CD": prdt,
            "KRX_FWDG_ORD_ORGNO": branch,
            "ORGN_ODNO": order_id,
            "ORD_DVSN": "00",
            "RVSE_CNCL_DVSN_CD": rvse_cncl_code,
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": price.to_won().to_string(),
            "QTY_ALL_ORD_YN": "Y",
        });

        let envelope: Envelope<OrderOutput> =
            self.post(PATH_ORDER_RVSECNCL, TR_CANCEL_REVISE, &body).await?;
        Self::unwrap_envelope(envelope)?;
        Ok(())
    }

    /// Current price snapshot for one symbol.
    pub async fn current_price(&self, stock_code: &StockCode) -> BrokerResult<CurrentPrice> {
        let params = [
            ("FID_COND_MRKT_DIV_CODE", "J"),
            ("FID_INPUT_ISCD", stock_code.as_str()),
        ];

        let envelope: Envelope<PriceOutput> =
            self.get(PATH_INQUIRE_PRICE, TR_PRICE, &params).await?;
        let output = Self::unwrap_envelope(envelope)?;

        let price = parse_price_field(&output.stck_prpr);
        if price.is_zero() {
            return Err(BrokerError::Parse(format!(
                "empty current price for {stock_code}"
            )));
        }

        Ok(CurrentPrice {
            price,
            open: parse_price_field(&output.stck_oprc),
            high: parse_price_field(&output.stck_hgpr),
            low: parse_price_field(&output.stck_lwpr),
            cum_volume: parse_qty_field(&output.acml_vol),
            change_pct: output.prdy_ctrt,
        })
    }

    /// Daily OHLCV bars between two YYYYMMDD dates, newest first.
    pub async fn daily_candles(
        &self,
        stock_code: &StockCode,
        from: &str,
        to: &str,
    ) -> BrokerResult<Vec<DailyCandle>> {
        let params = [
            ("FID_COND_MRKT_DIV_CODE", "J"),
            ("FID_INPUT_ISCD", stock_code.as_str()),
            ("FID_INPUT_DATE_1", from),
            ("FID_INPUT_DATE_2", to),
            ("FID_PERIOD_DIV_CODE", "D"),
            ("FID_ORG_ADJ_PRC", "0"),
        ];

        let envelope: CandleEnvelope = self.get(PATH_DAILY_CANDLES, TR_DAILY_CANDLES, &params).await?;
        if envelope.rt_cd != "0" {
            return Err(BrokerError::Rejected {
                code: envelope.msg_cd,
                message: envelope.msg1,
            });
        }

        let candles = envelope
            .output2
            .into_iter()
            .filter(|row| !row.stck_bsop_date.is_empty())
            .map(|row| DailyCandle {
                date: row.stck_bsop_date,
                open: parse_price_field(&row.stck_oprc),
                high: parse_price_field(&row.stck_hgpr),
                low: parse_price_field(&row.stck_lwpr),
                close: parse_price_field(&row.stck_clpr),
                volume: parse_qty_field(&row.acml_vol),
            })
            .collect();

        Ok(candles)
    }

    /// Total account valuation in won.
    pub async fn total_assets(&self) -> BrokerResult<i64> {
        let envelope = self.fetch_balance().await?;
        let total = envelope
            .output2
            .first()
            .map(|row| row.tot_evlu_amt.trim().parse::<i64>().unwrap_or(0))
            .ok_or_else(|| BrokerError::MissingField("output2.tot_evlu_amt".to_string()))?;
        Ok(total)
    }

    /// Currently held positions.
    pub async fn holdings(&self) -> BrokerResult<Vec<Holding>> {
        let envelope = self.fetch_balance().await?;
        let holdings = envelope
            .output1
            .into_iter()
            .filter(|row| parse_qty_field(&row.hldg_qty) > 0)
            .map(|row| Holding {
                stock_code: row.pdno,
                name: row.prdt_name,
                qty: parse_qty_field(&row.hldg_qty) as u32,
                avg_price: parse_price_field(&row.pchs_avg_pric),
                current_price: parse_price_field(&row.prpr),
            })
            .collect();
        Ok(holdings)
    }

    async fn fetch_balance(&self) -> BrokerResult<BalanceEnvelope> {
        let (cano, prdt) = split_account(self.session.account_number());
        let params = [
            ("CANO", cano),
            ("ACNT_PRDT_CD", prdt),
            ("AFHR_FLPR_YN", "N"),
            ("UNPR_DVSN", "01"),
            ("FUND_STTL_ICLD_YN", "N"),
            ("FNCG_AMT_AUTO_RDPT_YN", "N"),
            ("PRCS_DVSN", "01"),
            ("OFL_YN", "N"),
            ("INQR_DVSN", "01"),
            ("CTX_AREA_FK100", ""),
            ("CTX_AREA_NK100", ""),
        ];

        let envelope: BalanceEnvelope =
            self.get(PATH_INQUIRE_BALANCE, TR_BALANCE, &params).await?;
        if envelope.rt_cd != "0" {
            return Err(BrokerError::Rejected {
                code: envelope.msg_cd,
                message: envelope.msg1,
            });
        }
        Ok(envelope)
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> BrokerResult<T> {
        if envelope.rt_cd != "0" {
            return Err(BrokerError::Rejected {
                code: envelope.msg_cd,
                message: envelope.msg1,
            });
        }
        envelope
            .output
            .ok_or_else(|| BrokerError::MissingField("output".to_string()))
    }

    async fn base_headers(&self, tr_id: &str) -> BrokerResult<HeaderMap> {
        let token = self.session.get_valid_token().await?;
        let tr_id = tr_id_for_mode(tr_id, self.session.mode());

        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(
            "authorization",
            HeaderValue::from_str(&token).map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        headers.insert(
            "appkey",
            HeaderValue::from_str(self.session.app_key())
                .map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        headers.insert(
            "appsecret",
            HeaderValue::from_str(self.session.app_secret())
                .map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        headers.insert(
            "tr_id",
            HeaderValue::from_str(&tr_id).map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        headers.insert(
            "custtype",
            HeaderValue::from_str(self.session.custtype())
                .map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        Ok(headers)
    }

    /// Fetch the hashkey for a mutating request body.
    async fn hashkey(&self, body: &str) -> BrokerResult<String> {
        let url = format!("{}{}", self.session.base_url(), PATH_HASHKEY);

        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(
            "appkey",
            HeaderValue::from_str(self.session.app_key())
                .map_err(|e| BrokerError::Parse(e.to_string()))?,
        );
        headers.insert(
            "appsecret",
            HeaderValue::from_str(self.session.app_secret())
                .map_err(|e| BrokerError::Parse(e.to_string()))?,
        );

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BrokerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: serde_json::Value = response.json().await?;
        payload
            .get("HASH")
            .and_then(|h| h.as_str())
            .map(str::to_string)
            .ok_or_else(|| BrokerError::MissingField("HASH".to_string()))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        body: &serde_json::Value,
    ) -> BrokerResult<T> {
        let url = format!("{}{}", self.session.base_url(), path);
        let body_text = serde_json::to_string(body)
            .map_err(|e| BrokerError::Parse(format!("request body: {e}")))?;

        let mut headers = self.base_headers(tr_id).await?;
        let hash = self.hashkey(&body_text).await?;
        headers.insert(
            "hashkey",
            HeaderValue::from_str(&hash).map_err(|e| BrokerError::Parse(e.to_string()))?,
        );

        debug!(%url, tr_id, "POST");
        let response = self
            .http
            .post(&url)
            .headers(headers)
            .body(body_text)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        params: &[(&str, &str)],
    ) -> BrokerResult<T> {
        let url = format!("{}{}", self.session.base_url(), path);
        let headers = self.base_headers(tr_id).await?;

        debug!(%url, tr_id, "GET");
        let response = self
            .http
            .get(&url)
            .headers(headers)
            .query(params)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> BrokerResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "API error response");
            return Err(BrokerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BrokerError::Parse(format!("{e}: {text}")))
    }
}
