// Own profile, settings and user search

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    error::AppResult,
    infrastructure::{middleware::Vc, UploadKind},
    models::{NotificationPreferences, NotificationPreferencesUpdate, Visibility},
    services::{
        identity::ProfileUpdate,
        projections::{ProfileView, SearchResult, UserView},
    },
};

use super::{
    envelope::{ApiResponse, Empty},
    form::FormData,
    uploads,
    validation::Rules,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<SearchParams>,
) -> AppResult<ApiResponse<Vec<SearchResult>>> {
    let hits = state
        .identity
        .search(vc.user_id, params.search.as_deref())
        .await?;

    let results: Vec<_> = hits
        .iter()
        .map(|(user, is_following)| SearchResult::project(user, *is_following, state.blobs.as_ref()))
        .collect();
    let message = if results.is_empty() {
        "No users found"
    } else {
        "Users found"
    };
    Ok(ApiResponse::ok(results, message))
}

pub async fn profile(State(state): State<AppState>, vc: Vc) -> AppResult<ApiResponse<ProfileView>> {
    let (user, counts) = state.identity.profile(vc.user_id).await?;
    Ok(ApiResponse::ok(
        ProfileView {
            user: UserView::project(&user, state.blobs.as_ref()),
            counts,
        },
        "Profile fetched successfully",
    ))
}

pub async fn update(
    State(state): State<AppState>,
    vc: Vc,
    mut form: FormData,
) -> AppResult<ApiResponse<UserView>> {
    let profile_picture = form.take_file(UploadKind::ProfilePicture.field());
    let cover_photo = form.take_file(UploadKind::CoverPhoto.field());

    let mut rules = Rules::new();
    rules.max_chars("first_name", form.text("first_name"), 255);
    rules.max_chars("last_name", form.text("last_name"), 255);
    rules.email("email", form.text("email"));
    rules.max_chars("email", form.text("email"), 255);
    rules.max_chars("bio", form.text("bio"), 500);
    let profile_visibility = rules.required("profile_visibility", form.text("profile_visibility"));
    let profile_visibility: Option<Visibility> = rules.one_of("profile_visibility", profile_visibility);
    let post_visibility = rules.required("post_visibility", form.text("post_visibility"));
    let post_visibility: Option<Visibility> = rules.one_of("post_visibility", post_visibility);
    rules.upload(profile_picture.as_ref(), UploadKind::ProfilePicture)?;
    rules.upload(cover_photo.as_ref(), UploadKind::CoverPhoto)?;
    rules.finish()?;

    let profile_picture = uploads::store(&state, UploadKind::ProfilePicture, profile_picture).await?;
    let cover_photo = match uploads::store(&state, UploadKind::CoverPhoto, cover_photo).await {
        Ok(key) => key,
        Err(e) => return uploads::release_on_error(&state, Err(e), &[profile_picture.as_deref()]).await,
    };
    let stored = [profile_picture.clone(), cover_photo.clone()];

    let update = ProfileUpdate {
        first_name: form.text("first_name").map(str::to_owned),
        last_name: form.text("last_name").map(str::to_owned),
        email: form.text("email").map(str::to_owned),
        bio: form
            .has("bio")
            .then(|| form.text("bio").map(str::to_owned)),
        profile_visibility: profile_visibility.unwrap_or_default(),
        post_visibility: post_visibility.unwrap_or_default(),
        profile_picture,
        cover_photo,
    };
    let updated = state.identity.update_profile(vc.user_id, update).await;
    let user = uploads::release_on_error(
        &state,
        updated,
        &[stored[0].as_deref(), stored[1].as_deref()],
    )
    .await?;

    Ok(ApiResponse::ok(
        UserView::project(&user, state.blobs.as_ref()),
        "Profile updated successfully",
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    vc: Vc,
    form: FormData,
) -> AppResult<ApiResponse<Empty>> {
    let mut rules = Rules::new();
    let old_password = rules.required("old_password", form.text("old_password"));
    rules.min_chars("old_password", old_password, 8);
    let password = rules.required("password", form.text("password"));
    rules.min_chars("password", password, 8);
    rules.confirmed("password", password, form.text("password_confirmation"));
    rules.different("password", password, "old_password", old_password);
    rules.finish()?;

    state
        .identity
        .change_password(
            vc.user_id,
            old_password.unwrap_or_default(),
            password.unwrap_or_default(),
        )
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

pub async fn notification_preferences(
    State(state): State<AppState>,
    vc: Vc,
    form: FormData,
) -> AppResult<ApiResponse<NotificationPreferences>> {
    let mut rules = Rules::new();
    let update = NotificationPreferencesUpdate {
        follow: rules.boolean("follow", form.text("follow")),
        like: rules.boolean("like", form.text("like")),
        comment: rules.boolean("comment", form.text("comment")),
    };
    rules.finish()?;

    let prefs = state
        .identity
        .update_notification_preferences(vc.user_id, update)
        .await?;
    Ok(ApiResponse::ok(prefs, "Notification preferences updated"))
}
