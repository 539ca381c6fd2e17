/// Core error type.
///
/// Adapter crates map their specific errors into this type. Expected domain
/// outcomes (degraded comparison, expired session, malformed navigation) are
/// modelled as enums elsewhere and never travel through `Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("registry unavailable: {0}")]
    Registry(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
