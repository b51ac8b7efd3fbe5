use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query failed: {0}")]
    StoreQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Rewrites store failures into the message returned to HTTP clients,
    /// naming what was being fetched. Other variants pass through.
    pub fn while_fetching(self, what: &str) -> Self {
        let describe = |cause: String| format!("An error occurred while fetching {}: {}", what, cause);
        match self {
            Error::StoreQuery(cause) => Error::StoreQuery(describe(cause)),
            Error::StoreUnavailable(cause) => Error::StoreUnavailable(describe(cause)),
            Error::Serialization(e) => Error::StoreQuery(describe(e.to_string())),
            other => other,
        }
    }

    /// The text sent back to clients, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Validation(m) | Error::NotFound(m) | Error::StoreQuery(m) | Error::StoreUnavailable(m) => {
                m.clone()
            }
            other => other.to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
