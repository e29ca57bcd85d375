use anyhow::{Result, anyhow};
use log::warn;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::sleep;

/// Signatures per enrichment request
pub const CHUNK_SIZE: usize = 100;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Client for the enrichment service (`POST /v0/transactions`).
#[derive(Clone)]
pub struct EnrichClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl EnrichClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            http,
            endpoint: transactions_endpoint(base_url),
            api_key: api_key.to_string(),
        })
    }

    /// Enriched records for up to `CHUNK_SIZE` signatures.
    ///
    /// The service answers with one record per signature it knows about.
    pub async fn fetch_chunk(&self, signatures: &[String]) -> Result<Vec<Value>> {
        let body = json!({ "transactions": signatures });

        for attempt in 1..=MAX_ATTEMPTS {
            let resp = self
                .http
                .post(&self.endpoint)
                .query(&[("api-key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status();

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(anyhow!("enrichment rejected the API key: {status}"));
                    }

                    if !status.is_success() {
                        let text = r.text().await.unwrap_or_default();
                        if attempt < MAX_ATTEMPTS {
                            warn!(
                                "enrichment error {status}: {text} (attempt {}/{})",
                                attempt, MAX_ATTEMPTS
                            );
                            sleep(RETRY_DELAY).await;
                            continue;
                        }
                        return Err(anyhow!(
                            "enrichment failed after {} attempts: {status}: {text}",
                            MAX_ATTEMPTS
                        ));
                    }

                    let v: Value = r
                        .json()
                        .await
                        .map_err(|e| anyhow!("enrichment decode error: {e:?}"))?;

                    return match v {
                        Value::Array(records) => Ok(records),
                        other => Err(anyhow!("unexpected enrichment response: {other}")),
                    };
                }
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        warn!(
                            "enrichment request failed: {e:?} (attempt {}/{})",
                            attempt, MAX_ATTEMPTS
                        );
                        sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(anyhow!(
                        "enrichment request failed after {} attempts: {e:?}",
                        MAX_ATTEMPTS
                    ));
                }
            }
        }

        Err(anyhow!("unreachable"))
    }
}

fn transactions_endpoint(base_url: &str) -> String {
    format!("{}/v0/transactions", base_url.trim_end_matches('/'))
}

/// Split signatures into request-sized chunks, preserving order.
pub fn chunk_signatures(signatures: &[String]) -> Vec<Vec<String>> {
    signatures.chunks(CHUNK_SIZE).map(|c| c.to_vec()).collect()
}
