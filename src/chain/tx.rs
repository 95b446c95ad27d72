use cosmrs::{
    tx::{Body, Fee, SignDoc, SignerInfo},
    Any, Coin,
};

use crate::{wallet::Wallet, FEE_DENOM};

use super::{
    error::{Error, Result},
    AccountInfo,
};

/// Signs a direct transaction carrying `messages` on behalf of the wallet's
/// account, pinned to the given `(account_number, sequence)` pair.
pub fn sign_direct(
    wallet: &Wallet,
    messages: Vec<Any>,
    fee_amount: u128,
    gas_limit: u64,
    account: AccountInfo,
    memo: &str,
) -> Result<Vec<u8>> {
    let body = Body::new(messages, memo, 0_u32);

    let fee = Fee::from_amount_and_gas(
        Coin {
            denom: FEE_DENOM.parse().map_err(Error::FeeDenom)?,
            amount: fee_amount,
        },
        gas_limit,
    );

    let auth_info = SignerInfo::single_direct(Some(wallet.public_key()), account.sequence)
        .auth_info(fee);

    SignDoc::new(&body, &auth_info, wallet.chain_id(), account.account_number)
        .map_err(Error::SignDoc)?
        .sign(wallet.signing_key())
        .map_err(Error::Signing)?
        .to_bytes()
        .map_err(Error::SerializeTx)
}
