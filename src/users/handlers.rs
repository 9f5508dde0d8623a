use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    error::into_response,
    state::AppState,
    store::users::User,
};

use super::{
    dto::{FollowPayload, RegisterUserPayload, RegisteredUser},
    services,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/authentication/user", post(register_user))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/activate/:token", put(activate_user))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/follow", put(follow_user))
        .route("/users/:id/unfollow", put(unfollow_user))
}

#[instrument(skip(state, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterUserPayload>,
) -> Result<(StatusCode, Json<RegisteredUser>), (StatusCode, String)> {
    payload.normalize();
    if let Err(msg) = payload.validate() {
        warn!(username = %payload.username, %msg, "invalid registration payload");
        return Err((StatusCode::BAD_REQUEST, msg));
    }

    let registered = services::register_user(&state, payload)
        .await
        .map_err(into_response)?;
    info!(user_id = registered.user.id, "user registered");
    Ok((StatusCode::CREATED, Json(registered)))
}

#[instrument(skip(state, token))]
pub async fn activate_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .users
        .activate(&token)
        .await
        .map_err(into_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, (StatusCode, String)> {
    let user = state
        .store
        .users
        .get_by_id(id)
        .await
        .map_err(into_response)?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .users
        .delete(id)
        .await
        .map_err(into_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn follow_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FollowPayload>,
) -> Result<StatusCode, (StatusCode, String)> {
    if payload.follower_id == id {
        return Err((StatusCode::BAD_REQUEST, "users cannot follow themselves".into()));
    }
    state
        .store
        .followers
        .follow(payload.follower_id, id)
        .await
        .map_err(into_response)?;
    info!(follower_id = payload.follower_id, user_id = id, "followed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn unfollow_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FollowPayload>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .followers
        .unfollow(payload.follower_id, id)
        .await
        .map_err(into_response)?;
    Ok(StatusCode::NO_CONTENT)
}
