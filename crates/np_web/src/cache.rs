use np_core::{PageContext, PageNumber, Placement};
use std::collections::HashMap;
use tokio::sync::RwLock;

type CacheKey = (PageContext, PageNumber);

/// Last placement that had something to show, per page. Served in place of
/// a fresh placement while the store cannot be reached.
#[derive(Default)]
pub struct PlacementCache {
    entries: RwLock<HashMap<CacheKey, Placement>>,
}

impl PlacementCache {
    pub async fn remember(&self, context: &PageContext, page: PageNumber, placement: &Placement) {
        if placement.featured.is_none() && placement.list.is_empty() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.insert((context.clone(), page), placement.clone());
    }

    pub async fn recall(&self, context: &PageContext, page: PageNumber) -> Option<Placement> {
        let entries = self.entries.read().await;
        entries.get(&(context.clone(), page)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_placement() -> Placement {
        Placement {
            featured: None,
            secondary: vec![],
            trending: vec![],
            list: vec![],
            current_page: 1,
            total_pages: 1,
        }
    }

    #[tokio::test]
    async fn test_empty_placements_are_not_remembered() {
        let cache = PlacementCache::default();
        let home = PageContext::home();
        cache.remember(&home, PageNumber::FIRST, &empty_placement()).await;
        assert!(cache.recall(&home, PageNumber::FIRST).await.is_none());
    }
}
