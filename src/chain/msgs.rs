use cosmrs::{
    proto::{
        cosmos::{
            base::v1beta1::Coin as ProtoCoin,
            feegrant::v1beta1::{BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance},
        },
        prost::Message as _,
    },
    Any,
};
use prost_types::Timestamp;

use crate::FEE_DENOM;

const BASIC_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.BasicAllowance";
const GRANT_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.MsgGrantAllowance";
const REVOKE_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.MsgRevokeAllowance";

/// Encodes a grant of a basic allowance capped at `amount` of the fee
/// denomination, expiring at `expires_at_unix`.
#[must_use]
pub fn grant_allowance(granter: &str, grantee: &str, amount: u128, expires_at_unix: i64) -> Any {
    let allowance = BasicAllowance {
        spend_limit: vec![ProtoCoin {
            denom: FEE_DENOM.into(),
            amount: amount.to_string(),
        }],
        expiration: Some(Timestamp {
            seconds: expires_at_unix,
            nanos: 0,
        }),
    };

    let message = MsgGrantAllowance {
        granter: granter.into(),
        grantee: grantee.into(),
        allowance: Some(Any {
            type_url: BASIC_ALLOWANCE_TYPE_URL.into(),
            value: allowance.encode_to_vec(),
        }),
    };

    Any {
        type_url: GRANT_ALLOWANCE_TYPE_URL.into(),
        value: message.encode_to_vec(),
    }
}

/// Encodes the revocation of whatever allowance `granter` currently extends
/// to `grantee`.
#[must_use]
pub fn revoke_allowance(granter: &str, grantee: &str) -> Any {
    let message = MsgRevokeAllowance {
        granter: granter.into(),
        grantee: grantee.into(),
    };

    Any {
        type_url: REVOKE_ALLOWANCE_TYPE_URL.into(),
        value: message.encode_to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use cosmrs::proto::{
        cosmos::feegrant::v1beta1::{BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance},
        prost::Message as _,
    };

    use super::{grant_allowance, revoke_allowance};

    const GRANTER: &str = "secret1granter";
    const GRANTEE: &str = "secret1grantee";

    #[test]
    fn grant_carries_configured_amount_and_expiration() {
        let any = grant_allowance(GRANTER, GRANTEE, 500_000, 1_700_086_400);

        assert_eq!(any.type_url, "/cosmos.feegrant.v1beta1.MsgGrantAllowance");

        let message = MsgGrantAllowance::decode(any.value.as_slice()).unwrap();

        assert_eq!(message.granter, GRANTER);
        assert_eq!(message.grantee, GRANTEE);

        let allowance = message.allowance.unwrap();

        assert_eq!(allowance.type_url, "/cosmos.feegrant.v1beta1.BasicAllowance");

        let basic = BasicAllowance::decode(allowance.value.as_slice()).unwrap();

        assert_eq!(basic.spend_limit.len(), 1);
        assert_eq!(basic.spend_limit[0].denom, "uscrt");
        assert_eq!(basic.spend_limit[0].amount, "500000");
        assert_eq!(basic.expiration.unwrap().seconds, 1_700_086_400);
    }

    #[test]
    fn revoke_names_both_parties() {
        let any = revoke_allowance(GRANTER, GRANTEE);

        assert_eq!(any.type_url, "/cosmos.feegrant.v1beta1.MsgRevokeAllowance");

        let message = MsgRevokeAllowance::decode(any.value.as_slice()).unwrap();

        assert_eq!(message.granter, GRANTER);
        assert_eq!(message.grantee, GRANTEE);
    }
}
