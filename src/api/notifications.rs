// Notification inbox

use axum::extract::{Path, State};

use crate::{
    app_state::AppState,
    core::{current_time_millis, NotificationId},
    error::AppResult,
    infrastructure::middleware::Vc,
    services::projections::NotificationView,
};

use super::envelope::{ApiResponse, Empty};

pub async fn list(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<ApiResponse<Vec<NotificationView>>> {
    let now = current_time_millis();
    let notifications = state.notifications.list_for_user(vc.user_id).await?;
    Ok(ApiResponse::ok(
        notifications
            .iter()
            .map(|notification| NotificationView::project(notification, now))
            .collect(),
        "Notifications fetched successfully",
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<NotificationId>,
) -> AppResult<ApiResponse<Empty>> {
    state.notifications.mark_read(vc.user_id, id).await?;
    Ok(ApiResponse::message("Notification marked as read"))
}
