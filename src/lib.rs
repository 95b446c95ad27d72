use std::time::Duration;

pub mod blocks;
pub mod broadcaster;
pub mod chain;
pub mod config;
pub mod error;
pub mod log;
pub mod queue;
pub mod server;
pub mod wallet;

pub const CHAIN_ID: &str = "secret-4";

pub const ACCOUNT_PREFIX: &str = "secret";

pub const ADDRESS_PAYLOAD_BYTES: usize = 20;

pub const FEE_DENOM: &str = "uscrt";

pub const GRANT_GAS_LIMIT: u64 = 15_000;

pub const REVOKE_GAS_LIMIT: u64 = 15_000;

pub const ALLOWANCE_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);
