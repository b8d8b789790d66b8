use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{
    Ad, AdPatch, Comment, NewAd, NewComment, NewPost, PostFlag, PostId, PostPatch, Post, Subscriber,
};
use crate::Result;

/// Filters for a post listing. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub published: Option<bool>,
    pub section: Option<String>,
    pub flag: Option<PostFlag>,
    pub limit: Option<usize>,
}

impl PostQuery {
    pub fn published() -> Self {
        Self {
            published: Some(true),
            ..Default::default()
        }
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn flagged(mut self, flag: PostFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        if let Some(published) = self.published {
            if post.published != published {
                return false;
            }
        }
        if let Some(section) = &self.section {
            if !post.in_section(section) {
                return false;
            }
        }
        if let Some(flag) = self.flag {
            if !post.has_flag(flag) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdQuery {
    pub active: Option<bool>,
    pub position: Option<String>,
}

impl AdQuery {
    pub fn active_in(position: impl Into<String>) -> Self {
        Self {
            active: Some(true),
            position: Some(position.into()),
        }
    }

    pub fn matches(&self, ad: &Ad) -> bool {
        self.active.map(|a| ad.active == a).unwrap_or(true)
            && self
                .position
                .as_deref()
                .map(|p| ad.position == p)
                .unwrap_or(true)
    }
}

#[async_trait]
pub trait NewsStorage: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// List posts matching the query, newest first
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Get a post by id regardless of its published state
    async fn get_post(&self, id: PostId) -> Result<Option<Post>>;

    async fn create_post(&self, post: NewPost) -> Result<Post>;

    /// Apply a partial update, failing with `NotFound` for unknown ids
    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post>;

    async fn delete_post(&self, id: PostId) -> Result<()>;

    /// List ads matching the query, newest first
    async fn list_ads(&self, query: &AdQuery) -> Result<Vec<Ad>>;

    async fn create_ad(&self, ad: NewAd) -> Result<Ad>;

    async fn update_ad(&self, id: Uuid, patch: AdPatch) -> Result<Ad>;

    async fn delete_ad(&self, id: Uuid) -> Result<()>;

    /// Comments on a post, newest first
    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>>;

    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;

    /// Subscribers, most recent first
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Add an email to the mailing list, failing with `AlreadySubscribed` on duplicates
    async fn add_subscriber(&self, email: &str) -> Result<Subscriber>;
}
