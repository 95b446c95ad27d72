use cosmrs::{
    crypto::{secp256k1::SigningKey, PublicKey},
    tendermint::chain::Id as ChainId,
    AccountId,
};
use thiserror::Error as ThisError;

use crate::{ACCOUNT_PREFIX, CHAIN_ID};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Secret key is not valid hexadecimal! Context: {0}")]
    DecodeHex(#[from] hex::FromHexError),
    #[error("Secret key has to be exactly 32 bytes long!")]
    KeyLength,
    #[error("Couldn't construct signing key from secret! Context: {0}")]
    InvalidKey(cosmrs::ErrorReport),
    #[error("Deriving granter account ID failed! Context: {0}")]
    AccountIdDerivationFailed(cosmrs::ErrorReport),
    #[error("Couldn't parse chain identifier! Context: {0}")]
    ChainId(cosmrs::tendermint::Error),
}

/// Holds the granter's signing identity: the secp256k1 key pair, the
/// bech32 account it controls and the chain the signatures target.
pub struct Wallet {
    key: SigningKey,
    public_key: PublicKey,
    account_id: AccountId,
    chain_id: ChainId,
}

impl Wallet {
    /// Builds a wallet from a secret key given as 64 hex digits, with an
    /// optional `0x` prefix.
    pub fn from_hex(secret: &str) -> Result<Self, Error> {
        let bytes = hex::decode(secret.strip_prefix("0x").unwrap_or(secret))?;

        if bytes.len() != 32 {
            return Err(Error::KeyLength);
        }

        let key = SigningKey::from_slice(&bytes).map_err(Error::InvalidKey)?;

        let public_key = key.public_key();

        let account_id = public_key
            .account_id(ACCOUNT_PREFIX)
            .map_err(Error::AccountIdDerivationFailed)?;

        Ok(Self {
            key,
            public_key,
            account_id,
            chain_id: CHAIN_ID.parse().map_err(Error::ChainId)?,
        })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.account_id.as_ref()
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    #[must_use]
    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }
}
