use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use super::{
    allowance::Allowance,
    error::{Error, Result},
    AccountInfo, Gateway, TxMeta, TxOutcome,
};

/// REST client for the chain's LCD endpoint.
#[derive(Debug, Clone)]
pub struct LcdClient {
    http: reqwest::Client,
    base_url: String,
}

impl LcdClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Fetches the allowance `granter` currently extends to `grantee`.
    ///
    /// The LCD reports a missing grant as an error status, which folds into
    /// `None` here; transport failures are surfaced as errors.
    pub async fn allowance(&self, granter: &str, grantee: &str) -> Result<Option<Allowance>> {
        let response = self
            .http
            .get(format!(
                "{}/cosmos/feegrant/v1beta1/allowance/{granter}/{grantee}",
                self.base_url
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let envelope: AllowanceEnvelope = response.json().await?;

        Ok(envelope.allowance.map(|grant| grant.allowance))
    }
}

#[async_trait]
impl Gateway for LcdClient {
    async fn account(&self, address: &str) -> Result<AccountInfo> {
        let response = self
            .http
            .get(format!(
                "{}/cosmos/auth/v1beta1/accounts/{address}",
                self.base_url
            ))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::ErrorStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: AccountEnvelope = response.json().await?;

        let account = envelope.account.ok_or(Error::AccountNotFound)?;

        Ok(AccountInfo {
            account_number: account.account_number,
            sequence: account.sequence,
        })
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome> {
        let response = self
            .http
            .post(format!("{}/cosmos/tx/v1beta1/txs", self.base_url))
            .json(&serde_json::json!({
                "tx_bytes": BASE64.encode(tx_bytes),
                "mode": "BROADCAST_MODE_BLOCK",
            }))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::ErrorStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut envelope: Value = response.json().await?;

        match envelope.get_mut("tx_response").map(Value::take) {
            Some(tx_response) if !tx_response.is_null() => tx_outcome_from_value(tx_response),
            _ => Err(Error::EmptyBroadcastResponse),
        }
    }
}

/// Translates an LCD `TxResponse` JSON object into a [`TxOutcome`], folding
/// the execution log events into a `type.attr_key` keyed map.
pub fn tx_outcome_from_value(tx_response: Value) -> Result<TxOutcome> {
    let parsed: TxResponseJson = serde_json::from_value(tx_response.clone())?;

    let mut events: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for log in &parsed.logs {
        for event in &log.events {
            for attribute in &event.attributes {
                events
                    .entry(format!("{}.{}", event.r#type, attribute.key))
                    .or_default()
                    .push(attribute.value.clone());
            }
        }
    }

    Ok(TxOutcome {
        code: parsed.code,
        raw_response: tx_response.to_string(),
        meta: Some(TxMeta {
            codespace: parsed.codespace,
            code: parsed.code,
            log: parsed.raw_log,
        }),
        events,
    })
}

#[derive(Deserialize)]
struct AllowanceEnvelope {
    #[serde(default)]
    allowance: Option<AllowanceGrant>,
}

#[derive(Deserialize)]
struct AllowanceGrant {
    allowance: Allowance,
}

#[derive(Deserialize)]
struct AccountEnvelope {
    #[serde(default)]
    account: Option<AccountRecord>,
}

#[derive(Deserialize)]
struct AccountRecord {
    #[serde(deserialize_with = "deserialize_stringly_u64")]
    account_number: u64,
    #[serde(deserialize_with = "deserialize_stringly_u64")]
    sequence: u64,
}

// The LCD renders protobuf uint64 fields as JSON strings.
fn deserialize_stringly_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .parse()
        .map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
struct TxResponseJson {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    logs: Vec<TxLogJson>,
}

#[derive(Deserialize)]
struct TxLogJson {
    #[serde(default)]
    events: Vec<TxEventJson>,
}

#[derive(Deserialize)]
struct TxEventJson {
    r#type: String,
    #[serde(default)]
    attributes: Vec<TxAttributeJson>,
}

#[derive(Deserialize)]
struct TxAttributeJson {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}
