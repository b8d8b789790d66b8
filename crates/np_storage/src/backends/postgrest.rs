//! Hosted database backend speaking the PostgREST dialect (`/rest/v1/<table>`),
//! as exposed by managed Postgres services.

use async_trait::async_trait;
use chrono::Utc;
use np_core::types::normalize_email;
use np_core::{
    Ad, AdPatch, AdQuery, Comment, Error, NewAd, NewComment, NewPost, NewsStorage, Post, PostId,
    PostPatch, PostQuery, Result, Subscriber,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::{BackendConfig, StorageBackend};

pub struct PostgrestStorage {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

#[async_trait]
impl StorageBackend for PostgrestStorage {
    fn get_error_message() -> &'static str {
        "PostgREST endpoint should be reachable at the configured backend url"
    }

    async fn connect(config: &BackendConfig) -> Result<Self> {
        let storage = Self::new(config.require_url("postgrest")?, config.api_key.as_deref())?;
        // a bad url or key fails at startup
        storage.list_posts(&PostQuery::default().limit(1)).await?;
        Ok(storage)
    }
}

impl PostgrestStorage {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut base = Url::parse(url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            api_key: api_key.map(str::to_string),
        })
    }

    pub fn table_url(&self, table: &str) -> Result<Url> {
        Ok(self.base.join(&format!("rest/v1/{}", table))?)
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        let mut request = self
            .client
            .request(method, self.table_url(table)?)
            .header("Prefer", "return=representation");
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        Ok(request)
    }

    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let response = execute(request).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::Storage(format!("Failed to decode PostgREST response: {}", e)))
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T> {
        let request = self.request(Method::POST, table)?.json(body);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Storage(format!("Insert into {} returned no row", table)))
    }

    async fn update_by_id<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        body: &B,
    ) -> Result<T> {
        let request = self
            .request(Method::PATCH, table)?
            .query(&[("id", format!("eq.{}", id))])
            .json(body);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{} {}", table, id)))
    }

    async fn delete_by_id(&self, table: &str, id: Uuid) -> Result<()> {
        let request = self
            .request(Method::DELETE, table)?
            .query(&[("id", format!("eq.{}", id))]);
        let deleted: Vec<serde_json::Value> = self.rows(request).await?;
        if deleted.is_empty() {
            return Err(Error::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }

    async fn get_ad(&self, id: Uuid) -> Result<Option<Ad>> {
        let request = self
            .request(Method::GET, "ads")?
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        Ok(self.rows(request).await?.into_iter().next())
    }
}

async fn execute(request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Storage(format!("PostgREST request failed: {}", e)))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Database(format!("PostgREST returned {}: {}", status, body)))
}

/// Case-insensitive exact match on a section name. The name is escaped so
/// it can only match itself.
fn section_filter(section: &str) -> String {
    let mut pattern = String::from("imatch.^");
    for c in section.trim().chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('$');
    pattern
}

/// Query-string filters for a post listing.
pub fn post_params(query: &PostQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(published) = query.published {
        params.push(("published".to_string(), format!("eq.{}", published)));
    }
    if let Some(section) = &query.section {
        params.push(("section".to_string(), section_filter(section)));
    }
    if let Some(flag) = query.flag {
        params.push((flag.column().to_string(), "eq.true".to_string()));
    }
    params.push(("order".to_string(), "created_at.desc,id.desc".to_string()));
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

pub fn ad_params(query: &AdQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(active) = query.active {
        params.push(("active".to_string(), format!("eq.{}", active)));
    }
    if let Some(position) = &query.position {
        params.push(("position".to_string(), format!("eq.{}", position)));
    }
    params.push(("order".to_string(), "created_at.desc,id.desc".to_string()));
    params
}

#[async_trait]
impl NewsStorage for PostgrestStorage {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let params = post_params(query);
        debug!("PostgREST posts query: {:?}", params);
        let request = self.request(Method::GET, "posts")?.query(&params);
        self.rows(request).await
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let request = self
            .request(Method::GET, "posts")?
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        Ok(self.rows(request).await?.into_iter().next())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        post.validate()?;
        let post = post.into_post(Uuid::new_v4(), Utc::now());
        self.insert("posts", &post).await
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post> {
        patch.validate()?;
        let mut post = self
            .get_post(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("post {}", id)))?;
        patch.apply(&mut post);
        self.update_by_id("posts", id, &post).await
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        self.delete_by_id("posts", id).await
    }

    async fn list_ads(&self, query: &AdQuery) -> Result<Vec<Ad>> {
        let request = self.request(Method::GET, "ads")?.query(&ad_params(query));
        self.rows(request).await
    }

    async fn create_ad(&self, ad: NewAd) -> Result<Ad> {
        ad.validate()?;
        let ad = ad.into_ad(Uuid::new_v4(), Utc::now());
        self.insert("ads", &ad).await
    }

    async fn update_ad(&self, id: Uuid, patch: AdPatch) -> Result<Ad> {
        patch.validate()?;
        let mut ad = self
            .get_ad(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ad {}", id)))?;
        patch.apply(&mut ad);
        self.update_by_id("ads", id, &ad).await
    }

    async fn delete_ad(&self, id: Uuid) -> Result<()> {
        self.delete_by_id("ads", id).await
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let request = self.request(Method::GET, "comments")?.query(&[
            ("select", "*".to_string()),
            ("post_id", format!("eq.{}", post_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        self.rows(request).await
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let (post_id, author_name, author_email, content) = comment.validate()?;
        if self.get_post(post_id).await?.is_none() {
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
        self.insert("comments", &comment).await
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let request = self
            .request(Method::GET, "mailing_list_subscribers")?
            .query(&[("select", "*"), ("order", "subscribed_at.desc")]);
        self.rows(request).await
    }

    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: normalize_email(email)?,
            subscribed_at: Utc::now(),
        };
        let response = self
            .request(Method::POST, "mailing_list_subscribers")?
            .json(&subscriber)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("PostgREST request failed: {}", e)))?;
        if response.status() == StatusCode::CONFLICT {
            return Err(Error::AlreadySubscribed(subscriber.email));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Database(format!("PostgREST returned {}: {}", status, body)));
        }
        Ok(subscriber)
    }
}
