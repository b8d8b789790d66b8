use async_trait::async_trait;
use chrono::Utc;
use np_core::types::normalize_email;
use np_core::{
    Ad, AdPatch, AdQuery, Comment, Error, NewAd, NewComment, NewPost, NewsStorage, Post, PostId,
    PostPatch, PostQuery, Result, Subscriber,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{BackendConfig, StorageBackend};

#[derive(Default)]
pub struct MemoryStore {
    posts: Vec<Post>,
    ads: Vec<Ad>,
    comments: Vec<Comment>,
    subscribers: Vec<Subscriber>,
}

impl MemoryStore {
    pub fn list_posts(&self, query: &PostQuery) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        posts.sort_by(Post::newest_first);
        if let Some(limit) = query.limit {
            posts.truncate(limit);
        }
        posts
    }

    pub fn get_post(&self, id: PostId) -> Option<Post> {
        self.posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn insert_post(&mut self, post: Post) -> Post {
        self.posts.push(post.clone());
        post
    }

    pub fn update_post(&mut self, id: PostId, patch: PostPatch) -> Result<Post> {
        let post = self
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("post {}", id)))?;
        patch.apply(post);
        Ok(post.clone())
    }

    pub fn delete_post(&mut self, id: PostId) -> Result<()> {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != id);
        if self.posts.len() == before {
            return Err(Error::NotFound(format!("post {}", id)));
        }
        self.comments.retain(|c| c.post_id != id);
        Ok(())
    }

    pub fn list_ads(&self, query: &AdQuery) -> Vec<Ad> {
        let mut ads: Vec<Ad> = self.ads.iter().filter(|a| query.matches(a)).cloned().collect();
        ads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        ads
    }

    pub fn insert_ad(&mut self, ad: Ad) -> Ad {
        self.ads.push(ad.clone());
        ad
    }

    pub fn update_ad(&mut self, id: Uuid, patch: AdPatch) -> Result<Ad> {
        let ad = self
            .ads
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("ad {}", id)))?;
        patch.apply(ad);
        Ok(ad.clone())
    }

    pub fn delete_ad(&mut self, id: Uuid) -> Result<()> {
        let before = self.ads.len();
        self.ads.retain(|a| a.id != id);
        if self.ads.len() == before {
            return Err(Error::NotFound(format!("ad {}", id)));
        }
        Ok(())
    }

    pub fn list_comments(&self, post_id: PostId) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        comments
    }

    pub fn insert_comment(&mut self, comment: NewComment) -> Result<Comment> {
        let (post_id, author_name, author_email, content) = comment.validate()?;
        if self.get_post(post_id).is_none() {
            return Err(Error::NotFound(format!("post {}", post_id)));
        }
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_name,
            author_email,
            content,
            created_at: Utc::now(),
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn list_subscribers(&self) -> Vec<Subscriber> {
        let mut subscribers = self.subscribers.clone();
        subscribers.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
        subscribers
    }

    pub fn insert_subscriber(&mut self, email: &str) -> Result<Subscriber> {
        let email = normalize_email(email)?;
        if self.subscribers.iter().any(|s| s.email == email) {
            return Err(Error::AlreadySubscribed(email));
        }
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email,
            subscribed_at: Utc::now(),
        };
        self.subscribers.push(subscriber.clone());
        Ok(subscriber)
    }
}

pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::default())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_config: &BackendConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl NewsStorage for InMemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let store = self.store.read().await;
        Ok(store.list_posts(query))
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let store = self.store.read().await;
        Ok(store.get_post(id))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        post.validate()?;
        let mut store = self.store.write().await;
        Ok(store.insert_post(post.into_post(Uuid::new_v4(), Utc::now())))
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post> {
        patch.validate()?;
        let mut store = self.store.write().await;
        store.update_post(id, patch)
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        let mut store = self.store.write().await;
        store.delete_post(id)
    }

    async fn list_ads(&self, query: &AdQuery) -> Result<Vec<Ad>> {
        let store = self.store.read().await;
        Ok(store.list_ads(query))
    }

    async fn create_ad(&self, ad: NewAd) -> Result<Ad> {
        ad.validate()?;
        let mut store = self.store.write().await;
        Ok(store.insert_ad(ad.into_ad(Uuid::new_v4(), Utc::now())))
    }

    async fn update_ad(&self, id: Uuid, patch: AdPatch) -> Result<Ad> {
        patch.validate()?;
        let mut store = self.store.write().await;
        store.update_ad(id, patch)
    }

    async fn delete_ad(&self, id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        store.delete_ad(id)
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let store = self.store.read().await;
        Ok(store.list_comments(post_id))
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut store = self.store.write().await;
        store.insert_comment(comment)
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let store = self.store.read().await;
        Ok(store.list_subscribers())
    }

    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        let mut store = self.store.write().await;
        store.insert_subscriber(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use np_core::PostFlag;

    fn new_post(title: &str, section: &str, minutes_ago: i64) -> NewPost {
        NewPost {
            title: title.to_string(),
            section: Some(section.to_string()),
            published: true,
            created_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = InMemoryStorage::new();
        storage.create_post(new_post("Older", "Sports", 30)).await.unwrap();
        let newer = storage.create_post(new_post("Newer", "sports", 5)).await.unwrap();
        let mut draft = new_post("Draft", "Sports", 1);
        draft.published = false;
        storage.create_post(draft).await.unwrap();

        let posts = storage
            .list_posts(&PostQuery::published().in_section("Sports"))
            .await
            .unwrap();
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);

        let limited = storage.list_posts(&PostQuery::published().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, newer.id);
    }

    #[tokio::test]
    async fn test_flag_filter_and_update() {
        let storage = InMemoryStorage::new();
        let post = storage.create_post(new_post("Lead", "News", 1)).await.unwrap();
        let query = PostQuery::published().flagged(PostFlag::FeaturedHome);
        assert!(storage.list_posts(&query).await.unwrap().is_empty());

        let patch = PostPatch {
            featured_home: Some(true),
            ..Default::default()
        };
        let updated = storage.update_post(post.id, patch).await.unwrap();
        assert!(updated.featured_home);
        assert_eq!(storage.list_posts(&query).await.unwrap().len(), 1);

        let missing = storage.update_post(Uuid::new_v4(), PostPatch::default()).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_post_drops_comments() {
        let storage = InMemoryStorage::new();
        let post = storage.create_post(new_post("Story", "News", 1)).await.unwrap();
        storage
            .create_comment(NewComment {
                post_id: Some(post.id),
                author_name: "Ana".to_string(),
                author_email: None,
                content: "Nice".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(storage.list_comments(post.id).await.unwrap().len(), 1);

        storage.delete_post(post.id).await.unwrap();
        assert!(storage.list_comments(post.id).await.unwrap().is_empty());
        assert!(matches!(storage.delete_post(post.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_comment_on_unknown_post() {
        let storage = InMemoryStorage::new();
        let result = storage
            .create_comment(NewComment {
                post_id: Some(Uuid::new_v4()),
                author_name: "Ana".to_string(),
                author_email: None,
                content: "Hello".to_string(),
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_subscriber() {
        let storage = InMemoryStorage::new();
        storage.add_subscriber("reader@example.com").await.unwrap();
        let again = storage.add_subscriber(" Reader@Example.com ").await;
        assert!(matches!(again, Err(Error::AlreadySubscribed(_))));
        assert_eq!(storage.list_subscribers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ads_query() {
        let storage = InMemoryStorage::new();
        let ad = storage
            .create_ad(NewAd {
                title: "Bakery".to_string(),
                active: true,
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .create_ad(NewAd {
                title: "Paused".to_string(),
                active: false,
                ..Default::default()
            })
            .await
            .unwrap();

        let active = storage.list_ads(&AdQuery::active_in("sidebar")).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, ad.id);
        assert_eq!(storage.list_ads(&AdQuery::default()).await.unwrap().len(), 2);

        storage.delete_ad(ad.id).await.unwrap();
        assert!(storage.list_ads(&AdQuery::active_in("sidebar")).await.unwrap().is_empty());
    }
}
