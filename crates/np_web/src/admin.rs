use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use np_core::{AdPatch, AdQuery, Error, NewAd, NewPost, PostId, PostPatch, PostQuery};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::handlers::parse_id;
use crate::AppState;

pub const ADMIN_HEADER: &str = "x-admin-password";

/// Extractor that only succeeds when the request carries the admin password.
pub struct Admin;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok());
        match (state.config.admin_password.as_deref(), provided) {
            (Some(expected), Some(provided)) if expected == provided => Ok(Admin),
            (None, _) => {
                warn!("Admin request rejected: no admin password configured");
                Err(ApiError(Error::Unauthorized))
            }
            _ => Err(ApiError(Error::Unauthorized)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IdParams {
    pub id: Option<String>,
}

impl IdParams {
    fn require(&self, what: &str) -> Result<Uuid, ApiError> {
        let raw = self
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("{} ID required", what)))?;
        parse_id(raw, "id")
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub post_id: PostId,
    pub post: PostPatch,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdRequest {
    pub ad_id: Uuid,
    pub ad: AdPatch,
}

pub async fn list_posts(_admin: Admin, State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let posts = state.storage.list_posts(&PostQuery::default()).await?;
    Ok(Json(json!({ "posts": posts })))
}

pub async fn create_post(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    ApiJson(post): ApiJson<NewPost>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.storage.create_post(post).await?;
    info!("📝 Created post {} ({})", post.id, post.title);
    Ok((StatusCode::CREATED, Json(json!({ "post": post }))))
}

pub async fn update_post(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.storage.update_post(request.post_id, request.post).await?;
    info!("📝 Updated post {}", post.id);
    Ok(Json(json!({ "post": post })))
}

pub async fn delete_post(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = params.require("Post")?;
    state.storage.delete_post(id).await?;
    info!("🗑️ Deleted post {}", id);
    Ok(Json(json!({ "success": true })))
}

pub async fn list_ads(_admin: Admin, State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let ads = state.storage.list_ads(&AdQuery::default()).await?;
    Ok(Json(json!({ "ads": ads })))
}

pub async fn create_ad(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    ApiJson(ad): ApiJson<NewAd>,
) -> Result<impl IntoResponse, ApiError> {
    let ad = state.storage.create_ad(ad).await?;
    info!("📣 Created ad {} ({})", ad.id, ad.title);
    Ok((StatusCode::CREATED, Json(json!({ "ad": ad }))))
}

pub async fn update_ad(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UpdateAdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ad = state.storage.update_ad(request.ad_id, request.ad).await?;
    Ok(Json(json!({ "ad": ad })))
}

pub async fn delete_ad(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = params.require("Ad")?;
    state.storage.delete_ad(id).await?;
    info!("🗑️ Deleted ad {}", id);
    Ok(Json(json!({ "success": true })))
}

pub async fn list_subscribers(
    _admin: Admin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let subscribers = state.storage.list_subscribers().await?;
    Ok(Json(json!({ "subscribers": subscribers })))
}
