use std::env::{self, VarError};

use thiserror::Error as ThisError;

pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Missing environment variable {0:?}!")]
    Missing(&'static str),
    #[error("Environment variable {0:?} contains non-Unicode data!")]
    NonUnicode(&'static str),
    #[error("Environment variable {variable:?} is invalid! Context: {reason}")]
    Invalid {
        variable: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Service configuration, read from the process environment at startup.
#[derive(Debug, Clone)]
#[must_use]
pub struct Config {
    /// Granter secret key, normalized to 64 lowercase hex digits.
    pub secret_key: String,
    pub lcd_url: String,
    pub rpc_url: String,
    pub gas_price: f64,
    pub allowance_amount: u128,
    pub memo: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            secret_key: parse_secret_key("SERVER_SK", &required("SERVER_SK")?)?,
            lcd_url: parse_endpoint("SECRET_LCD", &required("SECRET_LCD")?)?,
            rpc_url: parse_endpoint("SECRET_RPC", &required("SECRET_RPC")?)?,
            gas_price: parse_gas_price("GAS_PRICE", &required("GAS_PRICE")?)?,
            allowance_amount: parse_allowance_amount(
                "ALLOWANCE_AMOUNT",
                &required("ALLOWANCE_AMOUNT")?,
            )?,
            memo: optional("FEEGRANT_MEMO")?.unwrap_or_default(),
            host: optional("SERVER_HOST")?.unwrap_or_else(|| DEFAULT_HOST.into()),
            port: optional("SERVER_PORT")?
                .map(|value| parse_port("SERVER_PORT", &value))
                .transpose()?
                .unwrap_or(DEFAULT_PORT),
        })
    }
}

fn required(variable: &'static str) -> Result<String> {
    optional(variable)?.ok_or(Error::Missing(variable))
}

fn optional(variable: &'static str) -> Result<Option<String>> {
    match env::var(variable) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(Error::NonUnicode(variable)),
    }
}

fn invalid(variable: &'static str, reason: &str) -> Error {
    Error::Invalid {
        variable,
        reason: reason.into(),
    }
}

fn parse_secret_key(variable: &'static str, value: &str) -> Result<String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);

    if digits.len() != 64 {
        return Err(invalid(variable, "Expected 64 hexadecimal digits!"));
    }

    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(invalid(variable, "Expected hexadecimal digits only!"));
    }

    Ok(digits.to_ascii_lowercase())
}

fn parse_endpoint(variable: &'static str, value: &str) -> Result<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_owned())
    } else {
        Err(invalid(
            variable,
            "Endpoint URL has to begin with either \"http://\" or \"https://\"!",
        ))
    }
}

fn parse_gas_price(variable: &'static str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
        .ok_or_else(|| invalid(variable, "Expected a positive decimal number!"))
}

fn parse_allowance_amount(variable: &'static str, value: &str) -> Result<u128> {
    value
        .parse::<u128>()
        .ok()
        .filter(|amount| *amount != 0)
        .ok_or_else(|| invalid(variable, "Expected a non-zero unsigned integer!"))
}

fn parse_port(variable: &'static str, value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|_| invalid(variable, "Expected a port number!"))
}

#[cfg(test)]
mod tests {
    use super::{
        parse_allowance_amount, parse_endpoint, parse_gas_price, parse_secret_key, Error,
    };

    const KEY: &str = "a0b1c2d3e4f5a0b1c2d3e4f5a0b1c2d3e4f5a0b1c2d3e4f5a0b1c2d3e4f5a0b1";

    #[test]
    fn secret_key_plain_and_prefixed() {
        assert_eq!(parse_secret_key("SERVER_SK", KEY).unwrap(), KEY);

        let prefixed = format!("0x{}", KEY.to_ascii_uppercase());

        assert_eq!(parse_secret_key("SERVER_SK", &prefixed).unwrap(), KEY);
    }

    #[test]
    fn secret_key_rejects_bad_input() {
        assert!(matches!(
            parse_secret_key("SERVER_SK", &KEY[..60]),
            Err(Error::Invalid { .. })
        ));
        assert!(parse_secret_key("SERVER_SK", &format!("{}zz", &KEY[..62])).is_err());
    }

    #[test]
    fn endpoint_requires_http_scheme() {
        assert_eq!(
            parse_endpoint("SECRET_LCD", "https://lcd.example.com/").unwrap(),
            "https://lcd.example.com"
        );
        assert!(parse_endpoint("SECRET_LCD", "ftp://lcd.example.com").is_err());
        assert!(parse_endpoint("SECRET_LCD", "lcd.example.com").is_err());
    }

    #[test]
    fn gas_price_must_be_positive() {
        assert_eq!(parse_gas_price("GAS_PRICE", "0.25").unwrap(), 0.25);
        assert!(parse_gas_price("GAS_PRICE", "0").is_err());
        assert!(parse_gas_price("GAS_PRICE", "-1.5").is_err());
        assert!(parse_gas_price("GAS_PRICE", "NaN").is_err());
        assert!(parse_gas_price("GAS_PRICE", "cheap").is_err());
    }

    #[test]
    fn allowance_amount_must_be_non_zero() {
        assert_eq!(
            parse_allowance_amount("ALLOWANCE_AMOUNT", "500000").unwrap(),
            500_000
        );
        assert!(parse_allowance_amount("ALLOWANCE_AMOUNT", "0").is_err());
        assert!(parse_allowance_amount("ALLOWANCE_AMOUNT", "-5").is_err());
    }
}
