use thiserror::Error;

/// Unrecoverable client-side failures. Transport errors stay `anyhow` values
/// inside the session loop and are retried with a backoff instead.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("engine executable not found: {0}")]
    EngineMissing(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
