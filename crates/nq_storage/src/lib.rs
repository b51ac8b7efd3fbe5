use nq_core::{ArticleStore, Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod backends;
pub mod loader;

pub use backends::*;

pub const DEFAULT_URL: &str = "mongodb://localhost:27017/";
pub const DEFAULT_DATABASE: &str = "almayadeen";
pub const DEFAULT_COLLECTION: &str = "articles";

/// Where the article collection lives.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StoreConfig {
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// The connection URL with any password masked, for logs.
    pub fn redacted_url(&self) -> String {
        if let Ok(mut parsed) = url::Url::parse(&self.url) {
            if parsed.password().is_some() && parsed.set_password(Some("****")).is_ok() {
                return parsed.to_string();
            }
            return self.url.clone();
        }
        // Multi-host seed lists do not parse as URLs; mask the whole userinfo part.
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}****{}", &self.url[..scheme_end + 3], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.redacted_url())
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Opens the named backend. The connection is not verified; call
/// [`ArticleStore::ping`] for that.
pub async fn create_store(storage: &str, config: &StoreConfig) -> Result<Arc<dyn ArticleStore>> {
    info!(storage, url = %config.redacted_url(), database = %config.database, collection = %config.collection, "opening store");
    match storage {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "mongodb")]
        "mongodb" | "mongo" => Ok(Arc::new(MongoStorage::connect(config).await?)),
        other => Err(Error::External(anyhow::anyhow!(
            "Unsupported storage backend: {}",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::loader::{load_files, LoadReport};
    pub use super::{create_store, StoreConfig};
}
