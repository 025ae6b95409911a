use axum::{
    Json,
    extract::{
        FromRequestParts, OriginalUri, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use coreroot_auth::{Action, OptionalBearerAuth};
use coreroot_auth::types::UserView;
use coreroot_core::ResourceKind;
use coreroot_storage::{ResourceUpdate, UserPatch};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::content::Target;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::{PageView, ResourceView};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// The policy action a request performs, derived from its method and the
/// trailing named-action segment (`like/`, `remove_like/`) when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedAction(pub Action);

const NAMED_ACTIONS: [&str; 2] = ["like", "remove_like"];

fn named_action(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| NAMED_ACTIONS.contains(segment))
}

impl<S> FromRequestParts<S> for RequestedAction
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let named = named_action(parts.uri.path());
        Action::from_method(&parts.method, named)
            .map(Self)
            .ok_or_else(|| {
                ApiError::bad_request(format!("unsupported method {}", parts.method))
            })
    }
}

fn page_query(query: Result<Query<PageQuery>, QueryRejection>) -> ApiResult<PageQuery> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.content.store().cache();
    let stats = cache.stats();
    Json(json!({
        "status": "ok",
        "cache": {
            "backend": cache.backend_name(),
            "hits": stats.hits,
            "misses": stats.misses,
            "stale": stats.stale,
            "bypassed": stats.bypassed,
            "hit_rate": stats.hit_rate(),
        }
    }))
}

// ---------------- Posts ----------------

pub async fn list_posts(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<PageView<ResourceView>>> {
    let q = page_query(query)?;
    let page = state.pagination.page(q.limit, q.offset);
    let results = state
        .content
        .list(viewer.as_ref(), action, ResourceKind::Post, None, page)
        .await?;
    Ok(Json(PageView::new(uri.path(), results)))
}

pub async fn create_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ResourceView>)> {
    let body = json_body(body)?;
    let view = state
        .content
        .create(viewer.as_ref(), action, ResourceKind::Post, None, body)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn read_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
) -> ApiResult<Json<ResourceView>> {
    let view = state
        .content
        .read(viewer.as_ref(), action, Target::post(&id))
        .await?;
    Ok(Json(view))
}

pub async fn replace_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ResourceView>> {
    let update = ResourceUpdate::Replace(json_body(body)?);
    let view = state
        .content
        .update(viewer.as_ref(), action, Target::post(&id), update)
        .await?;
    Ok(Json(view))
}

pub async fn patch_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ResourceView>> {
    let update = ResourceUpdate::Merge(json_body(body)?);
    let view = state
        .content
        .update(viewer.as_ref(), action, Target::post(&id), update)
        .await?;
    Ok(Json(view))
}

pub async fn delete_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .content
        .delete(viewer.as_ref(), action, Target::post(&id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
) -> ApiResult<Json<ResourceView>> {
    let view = state
        .content
        .set_like(viewer.as_ref(), action, Target::post(&id))
        .await?;
    Ok(Json(view))
}

pub async fn remove_like_post(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
) -> ApiResult<Json<ResourceView>> {
    let view = state
        .content
        .set_like(viewer.as_ref(), action, Target::post(&id))
        .await?;
    Ok(Json(view))
}

// ---------------- Comments ----------------

pub async fn list_comments(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    OriginalUri(uri): OriginalUri,
    Path(post_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<PageView<ResourceView>>> {
    let q = page_query(query)?;
    let page = state.pagination.page(q.limit, q.offset);
    let results = state
        .content
        .list(viewer.as_ref(), action, ResourceKind::Comment, Some(&post_id), page)
        .await?;
    Ok(Json(PageView::new(uri.path(), results)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(post_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ResourceView>)> {
    let body = json_body(body)?;
    let view = state
        .content
        .create(viewer.as_ref(), action, ResourceKind::Comment, Some(&post_id), body)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn read_comment(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path((post_id, id)): Path<(String, String)>,
) -> ApiResult<Json<ResourceView>> {
    let view = state
        .content
        .read(viewer.as_ref(), action, Target::comment(&post_id, &id))
        .await?;
    Ok(Json(view))
}

pub async fn replace_comment(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path((post_id, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ResourceView>> {
    let update = ResourceUpdate::Replace(json_body(body)?);
    let view = state
        .content
        .update(viewer.as_ref(), action, Target::comment(&post_id, &id), update)
        .await?;
    Ok(Json(view))
}

pub async fn patch_comment(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path((post_id, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ResourceView>> {
    let update = ResourceUpdate::Merge(json_body(body)?);
    let view = state
        .content
        .update(viewer.as_ref(), action, Target::comment(&post_id, &id), update)
        .await?;
    Ok(Json(view))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path((post_id, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .content
        .delete(viewer.as_ref(), action, Target::comment(&post_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------- Users ----------------

pub async fn read_user(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let view = state.content.get_user(viewer.as_ref(), action, &id).await?;
    Ok(Json(view))
}

pub async fn patch_user(
    State(state): State<AppState>,
    OptionalBearerAuth(viewer): OptionalBearerAuth,
    RequestedAction(action): RequestedAction,
    Path(id): Path<String>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    let patch = json_body(body)?;
    let view = state
        .content
        .update_user(viewer.as_ref(), action, &id, patch)
        .await?;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    async fn action_for(method: Method, uri: &str) -> Result<Action, ApiError> {
        let (mut parts, ()) = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        RequestedAction::from_request_parts(&mut parts, &())
            .await
            .map(|RequestedAction(action)| action)
    }

    #[tokio::test]
    async fn test_requested_action_from_method_and_segment() {
        let id = "/api/post/6f1c2a4e-0000-4000-8000-000000000000/";
        assert_eq!(action_for(Method::GET, id).await.unwrap(), Action::Read);
        assert_eq!(action_for(Method::PATCH, id).await.unwrap(), Action::Update);
        assert_eq!(action_for(Method::PUT, id).await.unwrap(), Action::Update);
        assert_eq!(action_for(Method::DELETE, id).await.unwrap(), Action::Delete);
        assert_eq!(
            action_for(Method::POST, "/api/post/").await.unwrap(),
            Action::Create
        );
        assert_eq!(
            action_for(Method::POST, &format!("{id}like/")).await.unwrap(),
            Action::Like
        );
        assert_eq!(
            action_for(Method::POST, &format!("{id}remove_like/")).await.unwrap(),
            Action::Unlike
        );
    }

    #[tokio::test]
    async fn test_unmapped_method_is_rejected() {
        let err = action_for(Method::TRACE, "/api/post/").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_named_action_only_matches_last_segment() {
        assert_eq!(named_action("/api/post/x/like/"), Some("like"));
        assert_eq!(named_action("/api/post/x/remove_like"), Some("remove_like"));
        assert_eq!(named_action("/api/post/like/comment/"), None);
        assert_eq!(named_action("/api/post/"), None);
    }
}
