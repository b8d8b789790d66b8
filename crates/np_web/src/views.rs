use np_core::placement::{place_with, TRENDING_LIMIT};
use np_core::{PageContext, PageLinks, PageNumber, Placement, Post, PostFlag, PostQuery, Result};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Everything a public listing page needs to render.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub context: PageContext,
    pub placement: Placement,
    pub links: PageLinks,
    /// The store could not be reached; `placement` comes from the last good
    /// render of this page.
    pub stale: bool,
    /// The store could not be reached and nothing was cached for this page.
    pub load_failed: bool,
}

/// Fetch the article pool and the trending posts for `context`.
pub async fn fetch_pool(
    state: &AppState,
    context: &PageContext,
) -> Result<(Vec<Post>, Vec<Post>)> {
    let mut pool = PostQuery::published();
    if let Some(section) = context.section_name() {
        pool = pool.in_section(section);
    }
    let trending = pool
        .clone()
        .flagged(PostFlag::trending_for(context.kind))
        .limit(TRENDING_LIMIT);

    tokio::try_join!(
        state.storage.list_posts(&pool),
        state.storage.list_posts(&trending)
    )
}

pub async fn render_page(state: &AppState, context: PageContext, page: PageNumber) -> PageView {
    let (placement, stale, load_failed) = match fetch_pool(state, &context).await {
        Ok((articles, trending)) => {
            debug!(
                "Placing {} posts ({} trending) for {} page {}",
                articles.len(),
                trending.len(),
                context.slug,
                page
            );
            let placement = place_with(&articles, &trending, context.kind, page, &state.config.rules);
            state.cache.remember(&context, page, &placement).await;
            (placement, false, false)
        }
        Err(e) => {
            error!("Failed to load posts for {} page {}: {}", context.slug, page, e);
            match state.cache.recall(&context, page).await {
                Some(placement) => {
                    info!("Serving last good placement for {} page {}", context.slug, page);
                    (placement, true, false)
                }
                None => (
                    place_with(&[], &[], context.kind, page, &state.config.rules),
                    false,
                    true,
                ),
            }
        }
    };

    let links = PageLinks::build(placement.current_page, placement.total_pages, &context.base_path());
    PageView {
        context,
        placement,
        links,
        stale,
        load_failed,
    }
}
