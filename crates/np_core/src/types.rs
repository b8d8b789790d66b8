use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use url::Url;
use uuid::Uuid;

use crate::{Error, Result};

pub type PostId = Uuid;

/// Which kind of public page a placement is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Home,
    Section,
}

/// Editorial flags a post query can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFlag {
    FeaturedHome,
    FeaturedSection,
    TrendingHome,
    TrendingSection,
}

impl PostFlag {
    pub fn featured_for(kind: PageKind) -> Self {
        match kind {
            PageKind::Home => PostFlag::FeaturedHome,
            PageKind::Section => PostFlag::FeaturedSection,
        }
    }

    pub fn trending_for(kind: PageKind) -> Self {
        match kind {
            PageKind::Home => PostFlag::TrendingHome,
            PageKind::Section => PostFlag::TrendingSection,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            PostFlag::FeaturedHome => "featured_home",
            PostFlag::FeaturedSection => "featured_section",
            PostFlag::TrendingHome => "trending_home",
            PostFlag::TrendingSection => "trending_section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub read_time: Option<String>,
    /// Stored in the `type` column.
    #[serde(rename = "type", default = "default_post_type")]
    pub post_type: String,
    pub section: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured_home: bool,
    #[serde(default)]
    pub featured_section: bool,
    #[serde(default)]
    pub trending_home: bool,
    #[serde(default)]
    pub trending_section: bool,
    pub created_at: DateTime<Utc>,
}

fn default_post_type() -> String {
    "article".to_string()
}

impl Post {
    pub fn has_flag(&self, flag: PostFlag) -> bool {
        match flag {
            PostFlag::FeaturedHome => self.featured_home,
            PostFlag::FeaturedSection => self.featured_section,
            PostFlag::TrendingHome => self.trending_home,
            PostFlag::TrendingSection => self.trending_section,
        }
    }

    pub fn is_featured_for(&self, kind: PageKind) -> bool {
        self.has_flag(PostFlag::featured_for(kind))
    }

    /// Case-insensitive section match.
    pub fn in_section(&self, section: &str) -> bool {
        self.section
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case(section.trim()))
            .unwrap_or(false)
    }

    /// Publication order: newest first, id breaks ties.
    pub fn newest_first(a: &Post, b: &Post) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

/// Body of an admin "create post" request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub read_time: Option<String>,
    #[serde(rename = "type", default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured_home: bool,
    #[serde(default)]
    pub featured_section: bool,
    #[serde(default)]
    pub trending_home: bool,
    #[serde(default)]
    pub trending_section: bool,
    /// Lets imports keep their original timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewPost {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        validate_url(self.image_url.as_deref())
    }

    pub fn into_post(self, id: PostId, now: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title.trim().to_string(),
            excerpt: self.excerpt,
            content: self.content,
            image_url: non_empty(self.image_url),
            read_time: self.read_time,
            post_type: self.post_type.unwrap_or_else(default_post_type),
            section: non_empty(self.section),
            published: self.published,
            featured_home: self.featured_home,
            featured_section: self.featured_section,
            trending_home: self.trending_home,
            trending_section: self.trending_section,
            created_at: self.created_at.unwrap_or(now).trunc_subsecs(6),
        }
    }
}

/// Partial update of a post. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_home: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_section: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending_home: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending_section: Option<bool>,
}

impl PostPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("title cannot be empty".to_string()));
            }
        }
        validate_url(self.image_url.as_deref())
    }

    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title.trim().to_string();
        }
        if let Some(excerpt) = self.excerpt {
            post.excerpt = Some(excerpt);
        }
        if let Some(content) = self.content {
            post.content = Some(content);
        }
        if let Some(image_url) = self.image_url {
            post.image_url = non_empty(Some(image_url));
        }
        if let Some(read_time) = self.read_time {
            post.read_time = Some(read_time);
        }
        if let Some(post_type) = self.post_type {
            post.post_type = post_type;
        }
        if let Some(section) = self.section {
            post.section = non_empty(Some(section));
        }
        if let Some(published) = self.published {
            post.published = published;
        }
        if let Some(flag) = self.featured_home {
            post.featured_home = flag;
        }
        if let Some(flag) = self.featured_section {
            post.featured_section = flag;
        }
        if let Some(flag) = self.trending_home {
            post.trending_home = flag;
        }
        if let Some(flag) = self.trending_section {
            post.trending_section = flag;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    #[serde(default = "default_ad_position")]
    pub position: String,
    /// Context identifier the ad targets; empty means every page.
    pub page: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

pub fn default_ad_position() -> String {
    "sidebar".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAd {
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl NewAd {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        validate_url(self.image_url.as_deref())?;
        validate_url(self.link_url.as_deref())
    }

    pub fn into_ad(self, id: Uuid, now: DateTime<Utc>) -> Ad {
        Ad {
            id,
            title: self.title.trim().to_string(),
            image_url: non_empty(self.image_url),
            link_url: non_empty(self.link_url),
            position: self.position.unwrap_or_else(default_ad_position),
            page: non_empty(self.page),
            active: self.active,
            created_at: now.trunc_subsecs(6),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl AdPatch {
    pub fn validate(&self) -> Result<()> {
        validate_url(self.image_url.as_deref())?;
        validate_url(self.link_url.as_deref())
    }

    pub fn apply(self, ad: &mut Ad) {
        if let Some(title) = self.title {
            ad.title = title.trim().to_string();
        }
        if let Some(image_url) = self.image_url {
            ad.image_url = non_empty(Some(image_url));
        }
        if let Some(link_url) = self.link_url {
            ad.link_url = non_empty(Some(link_url));
        }
        if let Some(position) = self.position {
            ad.position = position;
        }
        if let Some(page) = self.page {
            ad.page = non_empty(Some(page));
        }
        if let Some(active) = self.active {
            ad.active = active;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: PostId,
    pub author_name: String,
    pub author_email: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl NewComment {
    /// Checks required fields and returns the normalized comment parts.
    pub fn validate(self) -> Result<(PostId, String, Option<String>, String)> {
        let content = self.content.trim().to_string();
        let author_name = self.author_name.trim().to_string();
        match self.post_id {
            Some(post_id) if !author_name.is_empty() && !content.is_empty() => Ok((
                post_id,
                author_name,
                non_empty(self.author_email),
                content,
            )),
            _ => Err(Error::Validation(
                "post_id, author_name, and content are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}

/// Trims and lower-cases an email address, rejecting obviously malformed ones.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!("invalid email address: {}", email)));
    }
    Ok(email)
}

fn validate_url(url: Option<&str>) -> Result<()> {
    match url.map(str::trim) {
        Some(url) if !url.is_empty() => {
            Url::parse(url)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
