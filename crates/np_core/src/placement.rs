//! Article placement and pagination.
//!
//! Decides which posts a public page shows as the featured lead, the
//! secondary column, the trending sidebar and the paginated list below.
//! Everything here is pure: the caller fetches the posts, this module only
//! partitions them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::{PageKind, Post, PostId};

pub const PAGE_SIZE: usize = 10;
pub const SECONDARY_LIMIT: usize = 3;
pub const TRENDING_LIMIT: usize = 5;

/// A 1-based page number. Anything unparseable or below 1 becomes page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64")]
pub struct PageNumber(u32);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    pub fn new(page: i64) -> Self {
        if page < 1 {
            Self::FIRST
        } else {
            PageNumber(u32::try_from(page).unwrap_or(u32::MAX))
        }
    }

    /// Parse a `page` query value. Digit strings too large for a page
    /// number saturate, so they land past the last page instead of on page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Self::FIRST,
        };
        match raw.parse::<i64>() {
            Ok(page) => Self::new(page),
            Err(_) if raw.bytes().all(|b| b.is_ascii_digit()) => PageNumber(u32::MAX),
            Err(_) => Self::FIRST,
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_first(&self) -> bool {
        self.0 == 1
    }

    fn offset(&self) -> usize {
        (self.0.saturating_sub(1) as usize).saturating_mul(PAGE_SIZE)
    }
}

impl From<i64> for PageNumber {
    fn from(page: i64) -> Self {
        Self::new(page)
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tunables for the placement. The default applies no gating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRules {
    /// Minimum number of posts before a featured lead and secondary column
    /// are carved out. `0` always carves them out.
    pub min_articles_for_featured: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub featured: Option<Post>,
    pub secondary: Vec<Post>,
    pub trending: Vec<Post>,
    pub list: Vec<Post>,
    pub current_page: u32,
    pub total_pages: u32,
}

/// Partition `articles` for one page with the default rules.
///
/// `articles` must already be published, scoped to the page's section and
/// sorted newest first. `trending` holds the posts flagged trending for the
/// page kind, also newest first.
pub fn place(articles: &[Post], trending: &[Post], kind: PageKind, page: PageNumber) -> Placement {
    place_with(articles, trending, kind, page, &PlacementRules::default())
}

pub fn place_with(
    articles: &[Post],
    trending: &[Post],
    kind: PageKind,
    page: PageNumber,
    rules: &PlacementRules,
) -> Placement {
    let trending_ids: HashSet<PostId> = trending
        .iter()
        .take(TRENDING_LIMIT)
        .map(|p| p.id)
        .collect();

    // The lead and secondary posts are picked the same way on every page so
    // the remainder pool, and therefore the page boundaries, never shift.
    let lead = if articles.len() >= rules.min_articles_for_featured {
        articles
            .iter()
            .find(|p| p.is_featured_for(kind))
            .or_else(|| articles.first())
    } else {
        None
    };
    let lead_id = lead.map(|p| p.id);

    let secondary: Vec<&Post> = match lead_id {
        Some(lead_id) => articles
            .iter()
            .filter(|p| p.id != lead_id && !trending_ids.contains(&p.id))
            .take(SECONDARY_LIMIT)
            .collect(),
        None => Vec::new(),
    };
    let secondary_ids: HashSet<PostId> = secondary.iter().map(|p| p.id).collect();

    let pool: Vec<&Post> = articles
        .iter()
        .filter(|p| Some(p.id) != lead_id)
        .filter(|p| !secondary_ids.contains(&p.id))
        .filter(|p| !trending_ids.contains(&p.id))
        .collect();

    let total_pages = pool.len().div_ceil(PAGE_SIZE).max(1);
    let list = pool
        .iter()
        .skip(page.offset())
        .take(PAGE_SIZE)
        .map(|p| (*p).clone())
        .collect();

    let trending = trending
        .iter()
        .take(TRENDING_LIMIT)
        .filter(|p| Some(p.id) != lead_id)
        .cloned()
        .collect();

    let (featured, secondary) = if page.is_first() {
        (lead.cloned(), secondary.into_iter().cloned().collect())
    } else {
        (None, Vec::new())
    };

    Placement {
        featured,
        secondary,
        trending,
        list,
        current_page: page.get(),
        total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
    }
}
