use thiserror::Error as ThisError;

use crate::{config, wallet};

#[derive(Debug, ThisError)]
pub enum Application {
    #[error("{0}")]
    Config(#[from] config::Error),
    #[error("{0}")]
    Wallet(#[from] wallet::Error),
    #[error("Failed to bind the HTTP listener! Context: {0}")]
    Bind(std::io::Error),
    #[error("HTTP server failed! Context: {0}")]
    Serve(std::io::Error),
}

pub type AppResult<T> = Result<T, Application>;
