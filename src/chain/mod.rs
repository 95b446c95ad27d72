use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

pub mod address;
pub mod allowance;
pub mod error;
pub mod lcd;
pub mod msgs;
pub mod tx;

/// Result of one broadcast transaction, as observed at inclusion time.
///
/// A `code` of zero means the chain accepted and executed the transaction;
/// any other value is a chain-level failure described by `meta`.
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub code: u32,
    pub raw_response: String,
    pub meta: Option<TxMeta>,
    pub events: BTreeMap<String, Vec<String>>,
}

impl TxOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TxMeta {
    pub codespace: String,
    pub code: u32,
    pub log: String,
}

/// Signing identity of the granter account as reported by the chain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// The chain operations the broadcaster depends on.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    async fn account(&self, address: &str) -> error::Result<AccountInfo>;

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> error::Result<TxOutcome>;
}
