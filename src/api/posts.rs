// Posts, feeds, likes and comments

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    core::{current_time_millis, PostId},
    error::AppResult,
    infrastructure::{middleware::Vc, Upload, UploadKind},
    services::{
        projections::{CommentView, PostView},
        Page,
    },
};

use super::{
    envelope::{ApiResponse, Empty},
    form::FormData,
    uploads,
    validation::Rules,
};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

impl PageParams {
    /// Unparseable or missing page numbers read as the first page.
    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
    }
}

pub async fn my_posts(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<PageParams>,
) -> AppResult<ApiResponse<Page<PostView>>> {
    let now = current_time_millis();
    let page = state.feed.my_posts(vc.user_id, params.page()).await?;
    Ok(ApiResponse::ok(
        page.map(|details| PostView::project(&details, state.blobs.as_ref(), now)),
        "Posts fetched successfully",
    ))
}

pub async fn relevant_posts(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<PageParams>,
) -> AppResult<ApiResponse<Page<PostView>>> {
    let now = current_time_millis();
    let page = state.feed.relevant_feed(vc.user_id, params.page()).await?;
    Ok(ApiResponse::ok(
        page.map(|details| PostView::project(&details, state.blobs.as_ref(), now)),
        "Relevant posts fetched successfully",
    ))
}

/// Validate the shared post form; the media upload is returned unstored.
fn post_fields(mut form: FormData) -> AppResult<(Option<String>, Option<Upload>)> {
    let media = form.take_file(UploadKind::PostMedia.field());

    let mut rules = Rules::new();
    rules.upload(media.as_ref(), UploadKind::PostMedia)?;
    rules.finish()?;

    Ok((form.text("content").map(str::to_owned), media))
}

pub async fn store(
    State(state): State<AppState>,
    vc: Vc,
    form: FormData,
) -> AppResult<ApiResponse<PostView>> {
    let (content, media) = post_fields(form)?;
    let media = uploads::store(&state, UploadKind::PostMedia, media).await?;
    let created = state.content.create_post(vc.user_id, content, media.clone()).await;
    let details = uploads::release_on_error(&state, created, &[media.as_deref()]).await?;
    Ok(ApiResponse::created(
        PostView::project(&details, state.blobs.as_ref(), current_time_millis()),
        "Post created successfully",
    ))
}

pub async fn show(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<PostView>> {
    let details = state.content.show_post(vc.user_id, id).await?;
    Ok(ApiResponse::ok(
        PostView::project(&details, state.blobs.as_ref(), current_time_millis()),
        "Post fetched successfully",
    ))
}

pub async fn update(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
    form: FormData,
) -> AppResult<ApiResponse<PostView>> {
    let (content, media) = post_fields(form)?;
    state.content.owned_post(vc.user_id, id).await?;

    let media = uploads::store(&state, UploadKind::PostMedia, media).await?;
    let updated = state.content.update_post(vc.user_id, id, content, media.clone()).await;
    let details = uploads::release_on_error(&state, updated, &[media.as_deref()]).await?;
    Ok(ApiResponse::ok(
        PostView::project(&details, state.blobs.as_ref(), current_time_millis()),
        "Post updated successfully",
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<Empty>> {
    state.content.delete_post(vc.user_id, id).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

pub async fn like(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<Empty>> {
    state.content.like(vc.user_id, id).await?;
    Ok(ApiResponse::message("Post liked successfully"))
}

pub async fn unlike(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<Empty>> {
    state.content.unlike(vc.user_id, id).await?;
    Ok(ApiResponse::message("Post unliked successfully"))
}

pub async fn comment(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
    form: FormData,
) -> AppResult<ApiResponse<CommentView>> {
    let mut rules = Rules::new();
    let body = rules.required("comment", form.text("comment"));
    rules.max_chars("comment", body, 500);
    rules.finish()?;

    let comment = state
        .content
        .comment(vc.user_id, id, body.unwrap_or_default())
        .await?;
    Ok(ApiResponse::created(
        CommentView::project(&comment, state.blobs.as_ref(), current_time_millis()),
        "Comment added successfully",
    ))
}

pub async fn comments(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<PostId>,
) -> AppResult<ApiResponse<Vec<CommentView>>> {
    let now = current_time_millis();
    let comments = state.content.list_comments(vc.user_id, id).await?;
    Ok(ApiResponse::ok(
        comments
            .iter()
            .map(|entry| CommentView::project(entry, state.blobs.as_ref(), now))
            .collect(),
        "Comments fetched successfully",
    ))
}
