use anyhow::{Result, anyhow};
use log::warn;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Instant, sleep};

use crate::types::{BlockSummary, SignatureInfo};

/// Slot skipped, or block missing from storage
const SKIPPED_SLOT_CODES: [i64; 3] = [-32004, -32007, -32009];

const MAX_ATTEMPTS: u32 = 6;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// JSON-RPC error object returned by the node
#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    fn from_value(v: &Value) -> Self {
        Self {
            code: v.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
            message: v
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn is_skipped_slot(&self) -> bool {
        SKIPPED_SLOT_CODES.contains(&self.code)
    }
}

/// Outcome of one failed request
enum Failure {
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

impl From<RpcError> for Failure {
    fn from(err: RpcError) -> Self {
        // A skipped slot will not come back; callers treat it as "no block"
        if err.is_skipped_slot() {
            Failure::Fatal(err.into())
        } else {
            Failure::Retry(err.into())
        }
    }
}

/// Retry delay that doubles after every use, up to `cap`.
struct Backoff {
    delay: Duration,
    cap: Duration,
}

impl Backoff {
    fn new(initial: Duration, cap: Duration) -> Self {
        Self { delay: initial, cap }
    }

    fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.cap);
        current
    }
}

#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
    semaphore: Arc<Semaphore>,
    min_delay_ms: u64,
    last_request: Arc<Mutex<Instant>>,
}

impl RpcClient {
    pub fn new(url: String, concurrency: u32, min_delay_ms: u64) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(25)).build()?;

        Ok(Self {
            http,
            url,
            semaphore: Arc::new(Semaphore::new(concurrency as usize)),
            min_delay_ms,
            last_request: Arc::new(Mutex::new(Instant::now())),
        })
    }

    /// One page of signatures, newest first.
    pub async fn get_signatures_for_address(
        &self,
        address: &str,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let mut opts = json!({ "limit": limit, "commitment": "finalized" });
        if let Some(b) = before {
            opts["before"] = json!(b);
        }
        if let Some(u) = until {
            opts["until"] = json!(u);
        }

        let res = self.call("getSignaturesForAddress", json!([address, opts])).await?;
        serde_json::from_value(res).map_err(|e| anyhow!("unexpected signatures result: {e}"))
    }

    pub async fn get_transaction_json_parsed(&self, signature: &str) -> Result<Value> {
        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "maxSupportedTransactionVersion": 0,
                "commitment": "finalized"
            }
        ]);
        self.call("getTransaction", params).await
    }

    pub async fn get_slot(&self) -> Result<u64> {
        let res = self.call("getSlot", json!([{ "commitment": "finalized" }])).await?;
        res.as_u64().ok_or_else(|| anyhow!("unexpected getSlot result: {res}"))
    }

    /// Block time and signatures of `slot`; `None` when the slot has no block.
    pub async fn get_block_summary(&self, slot: u64) -> Result<Option<BlockSummary>> {
        let params = json!([
            slot,
            {
                "encoding": "json",
                "maxSupportedTransactionVersion": 0,
                "transactionDetails": "signatures",
                "rewards": false,
                "commitment": "finalized"
            }
        ]);

        match self.call("getBlock", params).await {
            Ok(Value::Null) => Ok(None),
            Ok(v) => Ok(Some(serde_json::from_value(v)?)),
            Err(e) => match e.downcast_ref::<RpcError>() {
                Some(rpc_err) if rpc_err.is_skipped_slot() => Ok(None),
                _ => Err(e),
            },
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let _permit = self.semaphore.acquire().await?;

        self.apply_rate_limit().await;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });
        let mut backoff = Backoff::new(INITIAL_BACKOFF, MAX_BACKOFF);

        for attempt in 1..=MAX_ATTEMPTS {
            let err = match self.send_once(&body).await {
                Ok(result) => return Ok(result),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Retry(e)) => e,
            };

            if attempt == MAX_ATTEMPTS {
                return Err(err.context(format!("{method} failed after {MAX_ATTEMPTS} attempts")));
            }

            let delay = backoff.next_delay();
            warn!(
                "{method}: {err:#}, retrying in {}ms (attempt {attempt}/{MAX_ATTEMPTS})",
                delay.as_millis()
            );
            sleep(delay).await;
        }

        Err(anyhow!("{method}: no attempts made"))
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<Value, Failure> {
        let r = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Retry(anyhow!("request failed: {e:?}")))?;

        let status = r.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Failure::Retry(anyhow!("rate limited (429)")));
        }
        if status.is_server_error() {
            return Err(Failure::Retry(anyhow!("server error {status}")));
        }

        let v: Value = r
            .json()
            .await
            .map_err(|e| Failure::Fatal(anyhow!("rpc decode error: {e:?}")))?;

        if let Some(error) = v.get("error") {
            return Err(Failure::from(RpcError::from_value(error)));
        }
        if !status.is_success() {
            return Err(Failure::Fatal(anyhow!("RPC non-success status: {status} body: {v}")));
        }

        v.get("result")
            .cloned()
            .ok_or_else(|| Failure::Fatal(anyhow!("missing result field")))
    }

    async fn apply_rate_limit(&self) {
        if self.min_delay_ms == 0 {
            return;
        }

        let mut last = self.last_request.lock().await;
        let elapsed = Instant::now().duration_since(*last);
        let min_delay = Duration::from_millis(self.min_delay_ms);

        if elapsed < min_delay {
            sleep(min_delay - elapsed).await;
        }

        *last = Instant::now();
    }
}
