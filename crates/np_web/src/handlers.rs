use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use np_core::ads::{ads_for_page, SIDEBAR};
use np_core::{AdQuery, NewComment, PageContext, PageNumber, Post, PostId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::views::{render_page, PageView};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentParams {
    pub post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: String,
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<PostId, ApiError> {
    PostId::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("invalid {}: {}", what, raw)))
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Json<PageView> {
    let page = PageNumber::parse(params.page.as_deref());
    Json(render_page(&state, PageContext::home(), page).await)
}

pub async fn section(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Json<PageView> {
    let page = PageNumber::parse(params.page.as_deref());
    Json(render_page(&state, PageContext::section(&slug), page).await)
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let id = PostId::parse_str(id.trim()).map_err(|_| ApiError::not_found("post"))?;
    match state.storage.get_post(id).await? {
        Some(post) if post.published => Ok(Json(post)),
        _ => Err(ApiError::not_found("post")),
    }
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CommentParams>,
) -> Result<impl IntoResponse, ApiError> {
    let raw = params
        .post_id
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("post_id is required"))?;
    let post_id = parse_id(&raw, "post_id")?;
    let comments = state.storage.list_comments(post_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    ApiJson(comment): ApiJson<NewComment>,
) -> Result<impl IntoResponse, ApiError> {
    let (post_id, ..) = comment.clone().validate()?;
    match state.storage.get_post(post_id).await? {
        Some(post) if post.published => {}
        _ => return Err(ApiError::not_found("post")),
    }
    let comment = state.storage.create_comment(comment).await?;
    info!("💬 New comment on post {}", comment.post_id);
    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))))
}

pub async fn list_ads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let ads = match state.storage.list_ads(&AdQuery::active_in(SIDEBAR)).await {
        Ok(ads) => ads_for_page(ads, params.page.as_deref()),
        Err(e) => {
            error!("Failed to load ads: {}", e);
            Vec::new()
        }
    };
    Json(json!({ "ads": ads }))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.email.trim().is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }
    let subscriber = state.storage.add_subscriber(&request.email).await?;
    info!("📬 New mailing list subscriber");
    Ok((StatusCode::CREATED, Json(json!({ "subscriber": subscriber }))))
}
