// Follow graph endpoints

use axum::extract::{Path, State};

use crate::{
    app_state::AppState,
    core::UserId,
    error::AppResult,
    infrastructure::middleware::Vc,
    models::User,
    services::projections::UserSummary,
};

use super::envelope::{ApiResponse, Empty};

fn summaries(state: &AppState, users: &[User]) -> Vec<UserSummary> {
    users
        .iter()
        .map(|user| UserSummary::project(user, state.blobs.as_ref()))
        .collect()
}

pub async fn follow(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<Empty>> {
    state.graph.follow(vc.user_id, id).await?;
    Ok(ApiResponse::message("User followed successfully"))
}

pub async fn unfollow(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<Empty>> {
    state.graph.unfollow(vc.user_id, id).await?;
    Ok(ApiResponse::message("User unfollowed successfully"))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let users = state.graph.list_followers(id).await?;
    Ok(ApiResponse::ok(
        summaries(&state, &users),
        "Followers fetched successfully",
    ))
}

pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let users = state.graph.list_following(id).await?;
    Ok(ApiResponse::ok(
        summaries(&state, &users),
        "Following list fetched successfully",
    ))
}
