use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    error::into_response,
    state::AppState,
    store::{comments::Comment, posts::Post},
};

use super::dto::{CreateCommentPayload, CreatePostPayload, PostWithComments, UpdatePostPayload};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/:id/comments", post(create_comment))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<CreatePostPayload>,
) -> Result<(StatusCode, Json<Post>), (StatusCode, String)> {
    if let Err(msg) = payload.validate() {
        warn!(%msg, "invalid post payload");
        return Err((StatusCode::BAD_REQUEST, msg));
    }
    let mut post = Post::new(payload.user_id, payload.title, payload.content, payload.tags);
    state
        .store
        .posts
        .create(&mut post)
        .await
        .map_err(into_response)?;
    info!(post_id = post.id, user_id = post.user_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostWithComments>, (StatusCode, String)> {
    let post = state
        .store
        .posts
        .get_by_id(id)
        .await
        .map_err(into_response)?;
    let comments = state
        .store
        .comments
        .get_by_post_id(id)
        .await
        .map_err(into_response)?;
    Ok(Json(PostWithComments { post, comments }))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostPayload>,
) -> Result<Json<Post>, (StatusCode, String)> {
    if let Err(msg) = payload.validate() {
        return Err((StatusCode::BAD_REQUEST, msg));
    }
    let mut post = state
        .store
        .posts
        .get_by_id(id)
        .await
        .map_err(into_response)?;
    payload.apply(&mut post);
    state
        .store
        .posts
        .update(&mut post)
        .await
        .map_err(into_response)?;
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .posts
        .delete(id)
        .await
        .map_err(into_response)?;
    info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentPayload>,
) -> Result<(StatusCode, Json<Comment>), (StatusCode, String)> {
    if let Err(msg) = payload.validate() {
        return Err((StatusCode::BAD_REQUEST, msg));
    }
    let mut comment = Comment::new(post_id, payload.user_id, payload.content);
    state
        .store
        .comments
        .create(&mut comment)
        .await
        .map_err(into_response)?;
    Ok((StatusCode::CREATED, Json(comment)))
}
