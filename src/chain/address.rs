use cosmrs::AccountId;
use thiserror::Error as ThisError;

use crate::{ACCOUNT_PREFIX, ADDRESS_PAYLOAD_BYTES};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ThisError)]
#[error("Invalid bech32 address")]
pub struct InvalidAddress;

/// Checks that `address` is a well-formed bech32 account address carrying
/// the `secret` prefix and a 20-byte payload.
pub fn validate_address(address: &str) -> Result<(), InvalidAddress> {
    address
        .parse::<AccountId>()
        .ok()
        .filter(|account_id| {
            account_id.prefix() == ACCOUNT_PREFIX
                && account_id.to_bytes().len() == ADDRESS_PAYLOAD_BYTES
        })
        .map(|_| ())
        .ok_or(InvalidAddress)
}
