use np_core::{NewsStorage, PlacementRules};
use std::sync::Arc;

use crate::cache::PlacementCache;

#[derive(Debug, Clone, Default)]
pub struct WebConfig {
    /// Shared secret expected in the `x-admin-password` header. Admin
    /// routes reject every request while this is unset.
    pub admin_password: Option<String>,
    pub rules: PlacementRules,
}

impl WebConfig {
    pub fn with_admin_password(mut self, password: Option<&str>) -> Self {
        self.admin_password = password
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        self
    }
}

pub struct AppState {
    pub storage: Arc<dyn NewsStorage>,
    pub config: WebConfig,
    pub cache: PlacementCache,
}

impl AppState {
    pub fn new(storage: Arc<dyn NewsStorage>, config: WebConfig) -> Self {
        Self {
            storage,
            config,
            cache: PlacementCache::default(),
        }
    }
}
