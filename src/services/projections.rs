// Read-model projections - derived response fields computed at assembly time

use serde::Serialize;

use crate::{
    core::{human_since, types::to_rfc3339, CommentId, NotificationId, PostId, Timestamp, UserId},
    infrastructure::blob_store::{resolve_media_url, BlobStore},
    models::{Notification, NotificationPreferences, NotificationType, User, Visibility},
};

use super::content::{CommentWithAuthor, PostDetails};
use super::identity::ProfileCounts;

pub const DEFAULT_AVATAR: &str = "avatar.jpg";
pub const DEFAULT_COVER: &str = "cover.jpg";

/// Stored avatar/cover reference as a URL, falling back to a bundled asset.
fn image_url(store: &dyn BlobStore, reference: Option<&str>, fallback: &str) -> String {
    resolve_media_url(store, reference).unwrap_or_else(|| store.asset_url(fallback))
}

/// The authenticated user's own view of their account.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub user_name: String,
    pub email: String,
    pub bio: Option<String>,
    pub profile_picture_url: String,
    pub cover_photo_url: String,
    pub profile_visibility: Visibility,
    pub post_visibility: Visibility,
    pub notification_preferences: NotificationPreferences,
    pub created_at: String,
    pub updated_at: String,
}

impl UserView {
    pub fn project(user: &User, store: &dyn BlobStore) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            profile_picture_url: image_url(store, user.profile_picture.as_deref(), DEFAULT_AVATAR),
            cover_photo_url: image_url(store, user.cover_photo.as_deref(), DEFAULT_COVER),
            profile_visibility: user.profile_visibility,
            post_visibility: user.post_visibility,
            notification_preferences: user.notification_preferences,
            created_at: to_rfc3339(user.created_at),
            updated_at: to_rfc3339(user.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    #[serde(flatten)]
    pub counts: ProfileCounts,
}

/// Minimal author projection: handle and name only.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub profile_picture_url: String,
}

impl UserSummary {
    pub fn project(user: &User, store: &dyn BlobStore) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            profile_picture_url: image_url(store, user.profile_picture.as_deref(), DEFAULT_AVATAR),
        }
    }
}

/// A search hit; never carries the email address.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub user: UserSummary,
    pub bio: Option<String>,
    pub cover_photo_url: String,
    pub is_following: bool,
}

impl SearchResult {
    pub fn project(user: &User, is_following: bool, store: &dyn BlobStore) -> Self {
        Self {
            user: UserSummary::project(user, store),
            bio: user.bio.clone(),
            cover_photo_url: image_url(store, user.cover_photo.as_deref(), DEFAULT_COVER),
            is_following,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub user_id: UserId,
    pub content: Option<String>,
    pub media: Option<String>,
    pub media_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked_by_user: bool,
    pub created_at: String,
    pub updated_at: String,
    pub created_at_human: String,
    pub user: UserSummary,
}

impl PostView {
    pub fn project(details: &PostDetails, store: &dyn BlobStore, now: Timestamp) -> Self {
        let post = &details.post;
        Self {
            id: post.id,
            user_id: post.user_id,
            content: post.content.clone(),
            media: post.media.clone(),
            media_url: resolve_media_url(store, post.media.as_deref()),
            likes_count: details.likes_count,
            comments_count: details.comments_count,
            is_liked_by_user: details.is_liked,
            created_at: to_rfc3339(post.created_at),
            updated_at: to_rfc3339(post.updated_at),
            created_at_human: human_since(post.created_at, now),
            user: UserSummary::project(&details.author, store),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: String,
    pub created_at_human: String,
    pub user: UserSummary,
}

impl CommentView {
    pub fn project(entry: &CommentWithAuthor, store: &dyn BlobStore, now: Timestamp) -> Self {
        let comment = &entry.comment;
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            comment: comment.comment.clone(),
            created_at: to_rfc3339(comment.created_at),
            created_at_human: human_since(comment.created_at, now),
            user: UserSummary::project(&entry.author, store),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub read: bool,
    pub created_at: String,
    pub created_at_human: String,
}

impl NotificationView {
    pub fn project(notification: &Notification, now: Timestamp) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message.clone(),
            read: notification.read,
            created_at: to_rfc3339(notification.created_at),
            created_at_human: human_since(notification.created_at, now),
        }
    }
}
