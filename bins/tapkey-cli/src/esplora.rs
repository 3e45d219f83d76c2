//! Esplora (mempool.space) REST client implementing the wallet collaborators.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Address, Txid};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use tapkey_core::error::SourceError;
use tapkey_core::traits::{Broadcaster, FeeRateSource, UtxoSource};
use tapkey_core::types::{RecommendedFees, Utxo};

pub struct EsploraClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: Txid,
    vout: u32,
    value: u64,
    status: EsploraStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
}

impl EsploraClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Explorer page for a transaction.
    pub fn tx_url(&self, txid: &Txid) -> String {
        format!("{}/tx/{}", self.base_url, txid)
    }

    async fn get(&self, path: &str) -> Result<Response, SourceError> {
        let url = self.api(path);
        debug!(%url, "esplora: GET");
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))
    }
}

async fn body(response: Response) -> Result<String, SourceError> {
    response
        .text()
        .await
        .map_err(|e| SourceError::Transport(e.to_string()))
}

/// Read a 2xx body, or turn the response into a `Status` error.
async fn success_body(response: Response) -> Result<String, SourceError> {
    let status = response.status();
    let text = body(response).await?;
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn parse_utxos(json: &str) -> Result<Vec<Utxo>, SourceError> {
    let raw: Vec<EsploraUtxo> =
        serde_json::from_str(json).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(raw
        .into_iter()
        .map(|u| Utxo {
            txid: u.txid,
            vout: u.vout,
            value: u.value,
            confirmed: u.status.confirmed,
        })
        .collect())
}

fn parse_raw_hex(text: &str) -> Result<Vec<u8>, SourceError> {
    hex::decode(text.trim()).map_err(|e| SourceError::Decode(e.to_string()))
}

fn parse_txid(text: &str) -> Result<Txid, SourceError> {
    Txid::from_str(text.trim()).map_err(|e| SourceError::Decode(e.to_string()))
}

fn parse_fees(json: &str) -> Result<RecommendedFees, SourceError> {
    serde_json::from_str(json).map_err(|e| SourceError::Decode(e.to_string()))
}

#[async_trait]
impl UtxoSource for EsploraClient {
    async fn list_utxos(&self, address: &Address) -> Result<Vec<Utxo>, SourceError> {
        let response = self.get(&format!("address/{address}/utxo")).await?;
        parse_utxos(&success_body(response).await?)
    }

    async fn fetch_raw_tx(&self, txid: &Txid) -> Result<Vec<u8>, SourceError> {
        let response = self.get(&format!("tx/{txid}/hex")).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::NotFound(format!("{txid} (HTTP {})", status.as_u16())));
        }
        parse_raw_hex(&body(response).await?)
    }
}

#[async_trait]
impl Broadcaster for EsploraClient {
    async fn submit(&self, raw_tx: &[u8]) -> Result<Txid, SourceError> {
        let url = self.api("tx");
        debug!(%url, bytes = raw_tx.len(), "esplora: POST");
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(hex::encode(raw_tx))
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let status = response.status();
        let text = body(response).await?;
        if !status.is_success() {
            return Err(SourceError::Rejected(text));
        }
        parse_txid(&text)
    }
}

#[async_trait]
impl FeeRateSource for EsploraClient {
    async fn recommended(&self) -> Result<RecommendedFees, SourceError> {
        let response = self.get("v1/fees/recommended").await?;
        parse_fees(&success_body(response).await?)
    }
}
