use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Request to the LCD endpoint failed! Context: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LCD endpoint returned an error status! Status code: {status}; body: {body}")]
    ErrorStatus { status: u16, body: String },
    #[error("Couldn't decode LCD response! Context: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Broadcast response doesn't contain a transaction result!")]
    EmptyBroadcastResponse,
    #[error("Account query response doesn't contain account data!")]
    AccountNotFound,
    #[error("Invalid fee denomination! Context: {0}")]
    FeeDenom(cosmrs::ErrorReport),
    #[error("Constructing the document to sign failed! Context: {0}")]
    SignDoc(cosmrs::ErrorReport),
    #[error("Signing transaction document failed! Context: {0}")]
    Signing(cosmrs::ErrorReport),
    #[error("Couldn't serialize signed transaction! Context: {0}")]
    SerializeTx(cosmrs::ErrorReport),
}

pub type Result<T> = std::result::Result<T, Error>;
