use serde::{Deserialize, Serialize};

use crate::types::PageKind;

pub const HOME_SLUG: &str = "home";

const SECTIONS: &[(&str, &str)] = &[
    ("news", "News"),
    ("local", "Local"),
    ("politics", "Politics"),
    ("sports", "Sports"),
    ("entertainment", "Entertainment"),
    ("opinion", "Opinion"),
];

/// A resolved public page: what kind it is, its route slug and display name.
/// The slug doubles as the identifier ads are targeted at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageContext {
    pub kind: PageKind,
    pub slug: String,
    pub name: String,
}

impl PageContext {
    pub fn home() -> Self {
        Self {
            kind: PageKind::Home,
            slug: HOME_SLUG.to_string(),
            name: "Home".to_string(),
        }
    }

    /// Resolve a section slug. Unknown slugs are used verbatim as the name.
    pub fn section(slug: &str) -> Self {
        let slug = slug.trim().to_lowercase();
        let name = SECTIONS
            .iter()
            .find(|(s, _)| *s == slug)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| slug.clone());
        Self {
            kind: PageKind::Section,
            slug,
            name,
        }
    }

    /// Section name used to scope the post pool, `None` on the home page.
    pub fn section_name(&self) -> Option<&str> {
        match self.kind {
            PageKind::Home => None,
            PageKind::Section => Some(&self.name),
        }
    }

    pub fn base_path(&self) -> String {
        match self.kind {
            PageKind::Home => "/".to_string(),
            PageKind::Section => format!("/section/{}", self.slug),
        }
    }
}
