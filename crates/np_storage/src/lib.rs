use async_trait::async_trait;
use np_core::{Error, NewsStorage, Result};
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: NewsStorage + Sized {
    fn get_error_message() -> &'static str;
    async fn connect(config: &BackendConfig) -> Result<Self>;
}

/// Connection settings shared by every backend. Backends ignore what they
/// do not need.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl BackendConfig {
    pub fn new(url: Option<&str>) -> Self {
        Self {
            url: url.map(str::to_string),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        self.api_key = api_key.map(str::to_string);
        self
    }

    pub fn require_url(&self, backend: &str) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{} storage requires a backend url", backend)))
    }
}

async fn open<T: StorageBackend + 'static>(config: &BackendConfig) -> Result<Arc<dyn NewsStorage>> {
    match T::connect(config).await {
        Ok(storage) => {
            info!("💾 Storage backend ready (using {})", storage.name());
            Ok(Arc::new(storage) as Arc<dyn NewsStorage>)
        }
        Err(e) => Err(Error::Storage(format!("{} ({})", T::get_error_message(), e))),
    }
}

/// Open the backend named `kind`: `memory`, `sqlite` or `postgrest`.
pub async fn create_storage(kind: &str, config: BackendConfig) -> Result<Arc<dyn NewsStorage>> {
    match kind.trim().to_lowercase().as_str() {
        "memory" => open::<InMemoryStorage>(&config).await,
        #[cfg(feature = "sqlite")]
        "sqlite" => open::<SQLiteStorage>(&config).await,
        #[cfg(feature = "postgrest")]
        "postgrest" => open::<PostgrestStorage>(&config).await,
        other => Err(Error::Config(format!(
            "Unknown or disabled storage backend: {}",
            other
        ))),
    }
}
