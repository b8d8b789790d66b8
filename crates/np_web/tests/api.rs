use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use np_core::{
    Ad, AdPatch, AdQuery, Comment, Error, NewAd, NewComment, NewPost, NewsStorage, Post, PostId,
    PostPatch, PostQuery, Result, Subscriber,
};
use np_storage::InMemoryStorage;
use np_web::{create_app, AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "letmein";

fn app_with(storage: Arc<dyn NewsStorage>, password: Option<&str>) -> Router {
    let config = WebConfig::default().with_admin_password(password);
    create_app(AppState::new(storage, config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn raw_request(method: &str, uri: &str, body: &str, password: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(password) = password {
        builder = builder.header("x-admin-password", password);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value, password: Option<&str>) -> Request<Body> {
    raw_request(method, uri, &body.to_string(), password)
}

fn new_post(title: &str, section: &str, minutes_ago: i64) -> NewPost {
    NewPost {
        title: title.to_string(),
        section: Some(section.to_string()),
        published: true,
        created_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
        ..Default::default()
    }
}

/// Seeds `n` published News posts, "News 0" being the most recent.
async fn seed(storage: &InMemoryStorage, n: usize) -> Vec<Post> {
    let mut posts = Vec::new();
    for i in 0..n {
        let post = new_post(&format!("News {}", i), "News", i as i64 + 1);
        posts.push(storage.create_post(post).await.unwrap());
    }
    posts
}

fn titles(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_home_page_placement() {
    let storage = Arc::new(InMemoryStorage::new());
    let posts = seed(&storage, 16).await;
    let patch = PostPatch {
        featured_home: Some(true),
        ..Default::default()
    };
    storage.update_post(posts[5].id, patch).await.unwrap();
    let patch = PostPatch {
        trending_home: Some(true),
        ..Default::default()
    };
    storage.update_post(posts[1].id, patch).await.unwrap();

    let app = app_with(storage.clone(), None);
    let (status, body) = send(&app, get("/api/home")).await;
    assert_eq!(status, StatusCode::OK);

    let placement = &body["placement"];
    assert_eq!(placement["featured"]["title"], "News 5");
    assert_eq!(titles(&placement["secondary"]), vec!["News 0", "News 2", "News 3"]);
    assert_eq!(titles(&placement["trending"]), vec!["News 1"]);
    // 16 - featured - 3 secondary - 1 trending
    assert_eq!(placement["list"].as_array().unwrap().len(), 10);
    assert_eq!(placement["total_pages"], 2);
    assert_eq!(body["links"]["next"]["href"], "/?page=2");
    assert_eq!(body["load_failed"], false);

    let (_, page_two) = send(&app, get("/api/home?page=2")).await;
    assert!(page_two["placement"]["featured"].is_null());
    assert_eq!(titles(&page_two["placement"]["list"]), vec!["News 15"]);
    assert_eq!(page_two["links"]["previous"]["href"], "/");
}

#[tokio::test]
async fn test_invalid_page_falls_back_to_first() {
    let storage = Arc::new(InMemoryStorage::new());
    seed(&storage, 20).await;
    let app = app_with(storage, None);

    let (_, first) = send(&app, get("/api/home")).await;
    for uri in ["/api/home?page=abc", "/api/home?page=0", "/api/home?page=-2"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["placement"], first["placement"]);
        assert_eq!(body["placement"]["current_page"], 1);
    }
}

#[tokio::test]
async fn test_section_page_is_scoped() {
    let storage = Arc::new(InMemoryStorage::new());
    seed(&storage, 3).await;
    storage.create_post(new_post("Derby", "Sports", 5)).await.unwrap();
    let mut cup = new_post("Cup final", "Sports", 2);
    cup.featured_section = true;
    storage.create_post(cup).await.unwrap();
    storage.create_post(new_post("Marathon", "sports", 1)).await.unwrap();

    let app = app_with(storage, None);
    let (status, body) = send(&app, get("/api/sections/sports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"]["name"], "Sports");
    assert_eq!(body["placement"]["featured"]["title"], "Cup final");
    assert_eq!(titles(&body["placement"]["secondary"]), vec!["Marathon", "Derby"]);
    assert!(body["placement"]["list"].as_array().unwrap().is_empty());
    assert_eq!(body["placement"]["total_pages"], 1);
    assert!(body["links"]["pages"].as_array().unwrap().is_empty());

    let (_, empty) = send(&app, get("/api/sections/weather")).await;
    assert!(empty["placement"]["featured"].is_null());
    assert_eq!(empty["placement"]["total_pages"], 1);
}

#[tokio::test]
async fn test_get_post_hides_drafts() {
    let storage = Arc::new(InMemoryStorage::new());
    let published = storage.create_post(new_post("Live", "News", 1)).await.unwrap();
    let mut draft = new_post("Draft", "News", 1);
    draft.published = false;
    let draft = storage.create_post(draft).await.unwrap();
    let app = app_with(storage, None);

    let (status, body) = send(&app, get(&format!("/api/posts/{}", published.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Live");

    let (status, _) = send(&app, get(&format!("/api/posts/{}", draft.id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/posts/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_flow() {
    let storage = Arc::new(InMemoryStorage::new());
    let post = storage.create_post(new_post("Story", "News", 1)).await.unwrap();
    let app = app_with(storage, None);

    let (status, _) = send(&app, get("/api/comments")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = json!({ "post_id": post.id, "author_name": "Ana" });
    let (status, _) = send(&app, json_request("POST", "/api/comments", missing, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({ "post_id": Uuid::new_v4(), "author_name": "Ana", "content": "Hi" });
    let (status, _) = send(&app, json_request("POST", "/api/comments", unknown, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let comment = json!({ "post_id": post.id, "author_name": "Ana", "content": "  Great piece " });
    let (status, body) = send(&app, json_request("POST", "/api/comments", comment, None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["comment"]["content"], "Great piece");

    let (status, body) = send(&app, get(&format!("/api/comments?post_id={}", post.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_bodies_get_json_errors() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app_with(storage, Some(PASSWORD));

    let requests = [
        raw_request("POST", "/api/comments", "{not json", None),
        raw_request(
            "POST",
            "/api/comments",
            r#"{"post_id": "not-a-uuid", "author_name": "Ana", "content": "Hi"}"#,
            None,
        ),
        raw_request("POST", "/api/subscribers", r#""reader@example.com""#, None),
        raw_request("POST", "/api/admin/posts", r#"{"published": true}"#, Some(PASSWORD)),
        raw_request("PUT", "/api/admin/ads", r#"{"ad_id": 7}"#, Some(PASSWORD)),
    ];
    for request in requests {
        let uri = request.uri().to_string();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Invalid request body", "{}", uri);
    }
}

#[tokio::test]
async fn test_comment_fields_checked_before_post_lookup() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app_with(storage, None);

    let comment = json!({ "post_id": Uuid::new_v4(), "author_name": " ", "content": "Hi" });
    let (status, body) = send(&app, json_request("POST", "/api/comments", comment, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "post_id, author_name, and content are required");
}

#[tokio::test]
async fn test_ads_are_targeted_by_page() {
    let storage = Arc::new(InMemoryStorage::new());
    for (title, page, active) in [
        ("Everywhere", None, true),
        ("Sports only", Some("Sports"), true),
        ("Paused", None, false),
    ] {
        storage
            .create_ad(NewAd {
                title: title.to_string(),
                page: page.map(str::to_string),
                active,
                ..Default::default()
            })
            .await
            .unwrap();
    }
    let app = app_with(storage, None);

    let (_, body) = send(&app, get("/api/ads?page=sports")).await;
    let mut found = titles(&body["ads"]);
    found.sort();
    assert_eq!(found, vec!["Everywhere", "Sports only"]);

    let (_, body) = send(&app, get("/api/ads")).await;
    assert_eq!(titles(&body["ads"]), vec!["Everywhere"]);
}

#[tokio::test]
async fn test_mailing_list_signup() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app_with(storage, None);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/subscribers", json!({ "email": "Reader@Example.com" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subscriber"]["email"], "reader@example.com");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/subscribers", json!({ "email": "reader@example.com " }), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/subscribers", json!({ "email": "nope" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_requires_password() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app_with(storage.clone(), Some(PASSWORD));

    let (status, _) = send(&app, get("/api/admin/posts")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/admin/subscribers")
        .header("x-admin-password", "guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // no configured password locks every admin route
    let locked = app_with(storage, None);
    let request = Request::builder()
        .uri("/api/admin/posts")
        .header("x-admin-password", "")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&locked, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_post_crud() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app_with(storage, Some(PASSWORD));

    let create = json!({ "title": "Budget vote", "section": "Politics", "published": true });
    let (status, body) = send(&app, json_request("POST", "/api/admin/posts", create, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["post"]["id"].as_str().unwrap().to_string();

    let update = json!({ "post_id": id, "post": { "trending_section": true } });
    let (status, body) = send(&app, json_request("PUT", "/api/admin/posts", update, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["trending_section"], true);
    assert_eq!(body["post"]["title"], "Budget vote");

    let lead = json!({ "title": "Recount", "section": "Politics", "published": true });
    let (status, _) = send(&app, json_request("POST", "/api/admin/posts", lead, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, section) = send(&app, get("/api/sections/politics")).await;
    assert_eq!(section["placement"]["featured"]["title"], "Recount");
    assert_eq!(titles(&section["placement"]["trending"]), vec!["Budget vote"]);
    assert!(section["placement"]["list"].as_array().unwrap().is_empty());

    let list = Request::builder()
        .uri("/api/admin/posts")
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, list).await;
    assert_eq!(titles(&body["posts"]), vec!["Recount", "Budget vote"]);

    let no_id = Request::builder()
        .method("DELETE")
        .uri("/api/admin/posts")
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, no_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/posts?id={}", id))
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let missing = json!({ "post_id": id, "post": { "published": false } });
    let (status, _) = send(&app, json_request("PUT", "/api/admin/posts", missing, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_ads_and_subscribers() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.add_subscriber("one@example.com").await.unwrap();
    let app = app_with(storage, Some(PASSWORD));

    let create = json!({ "title": "Hardware store", "page": "home", "active": false });
    let (status, body) = send(&app, json_request("POST", "/api/admin/ads", create, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["ad"]["id"].clone();

    let (_, public) = send(&app, get("/api/ads?page=home")).await;
    assert!(public["ads"].as_array().unwrap().is_empty());

    let update = json!({ "ad_id": id, "ad": { "active": true } });
    let (status, _) = send(&app, json_request("PUT", "/api/admin/ads", update, Some(PASSWORD))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, public) = send(&app, get("/api/ads?page=Home")).await;
    assert_eq!(titles(&public["ads"]), vec!["Hardware store"]);

    let subscribers = Request::builder()
        .uri("/api/admin/subscribers")
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, subscribers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscribers"][0]["email"], "one@example.com");
}

/// Store whose post listing can be switched off to simulate an outage.
struct FlakyStorage {
    inner: InMemoryStorage,
    down: AtomicBool,
}

#[async_trait]
impl NewsStorage for FlakyStorage {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Storage("connection refused".to_string()));
        }
        self.inner.list_posts(query).await
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        self.inner.get_post(id).await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        self.inner.create_post(post).await
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post> {
        self.inner.update_post(id, patch).await
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        self.inner.delete_post(id).await
    }

    async fn list_ads(&self, query: &AdQuery) -> Result<Vec<Ad>> {
        self.inner.list_ads(query).await
    }

    async fn create_ad(&self, ad: NewAd) -> Result<Ad> {
        self.inner.create_ad(ad).await
    }

    async fn update_ad(&self, id: Uuid, patch: AdPatch) -> Result<Ad> {
        self.inner.update_ad(id, patch).await
    }

    async fn delete_ad(&self, id: Uuid) -> Result<()> {
        self.inner.delete_ad(id).await
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        self.inner.list_comments(post_id).await
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        self.inner.create_comment(comment).await
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.inner.list_subscribers().await
    }

    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        self.inner.add_subscriber(email).await
    }
}

#[tokio::test]
async fn test_outage_serves_last_good_placement() {
    let inner = InMemoryStorage::new();
    seed(&inner, 8).await;
    let storage = Arc::new(FlakyStorage {
        inner,
        down: AtomicBool::new(false),
    });
    let app = app_with(storage.clone(), None);

    let (_, healthy) = send(&app, get("/api/home")).await;
    assert_eq!(healthy["stale"], false);

    storage.down.store(true, Ordering::SeqCst);
    let (status, stale) = send(&app, get("/api/home")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stale["stale"], true);
    assert_eq!(stale["load_failed"], false);
    assert_eq!(stale["placement"], healthy["placement"]);

    let (status, failed) = send(&app, get("/api/sections/news")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["load_failed"], true);
    assert!(failed["placement"]["featured"].is_null());
    assert_eq!(failed["placement"]["total_pages"], 1);
}
