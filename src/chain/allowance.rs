use std::time::{SystemTime, UNIX_EPOCH};

use cosmrs::tendermint::Time;
use serde::Deserialize;

use crate::FEE_DENOM;

/// An existing fee allowance as reported by the LCD feegrant endpoint.
///
/// The endpoint wraps the variant inside an `@type`-tagged object; anything
/// other than a basic allowance is kept opaque so the caller can refuse it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "@type")]
pub enum Allowance {
    #[serde(rename = "/cosmos.feegrant.v1beta1.BasicAllowance")]
    Basic(BasicAllowance),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAllowance {
    #[serde(default)]
    pub spend_limit: Vec<SpendLimit>,
    #[serde(default)]
    pub expiration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpendLimit {
    pub denom: String,
    pub amount: String,
}

/// What the claim handler should do about an incoming request, given the
/// allowance currently recorded on chain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum Decision {
    /// No usable allowance exists; issue a fresh grant.
    Grant,
    /// An exhausted or expired basic allowance exists; revoke it first,
    /// then grant anew.
    RevokeThenGrant,
    /// The allowance is still at the configured amount and hasn't expired.
    StillActive,
    /// The recorded allowance is not a basic allowance.
    Unsupported,
}

pub fn decide(existing: Option<&Allowance>, configured_amount: u128, now_unix: i64) -> Decision {
    match existing {
        None => Decision::Grant,
        Some(Allowance::Basic(basic)) => {
            if is_full(basic, configured_amount) && !is_expired(basic, now_unix) {
                Decision::StillActive
            } else {
                Decision::RevokeThenGrant
            }
        }
        Some(Allowance::Unsupported) => Decision::Unsupported,
    }
}

fn is_full(basic: &BasicAllowance, configured_amount: u128) -> bool {
    basic.spend_limit.iter().any(|limit| {
        limit.denom == FEE_DENOM
            && limit
                .amount
                .parse::<u128>()
                .is_ok_and(|amount| amount == configured_amount)
    })
}

fn is_expired(basic: &BasicAllowance, now_unix: i64) -> bool {
    match basic.expiration.as_deref() {
        // An allowance without an expiration never runs out by time.
        None => false,
        Some(timestamp) => {
            expiration_unix(timestamp).map_or(true, |expires_at| expires_at <= now_unix)
        }
    }
}

fn expiration_unix(timestamp: &str) -> Option<i64> {
    Time::parse_from_rfc3339(timestamp)
        .ok()
        .map(|time| Time::unix_timestamp(&time))
}

#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}
