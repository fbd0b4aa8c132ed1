// Row types - raw SQLite shapes, converted into entities at the store boundary

use sqlx::FromRow;

use super::{Comment, Notification, NotificationPreferences, Post, User};
use crate::error::AppError;

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub profile_visibility: String,
    pub post_visibility: String,
    pub notify_follow: bool,
    pub notify_like: bool,
    pub notify_comment: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Column list matching [`UserRow`], prefixed for joins.
pub const USER_COLUMNS: &str = "u.id, u.first_name, u.last_name, u.user_name, u.email, \
    u.password_hash, u.bio, u.profile_picture, u.cover_photo, u.profile_visibility, \
    u.post_visibility, u.notify_follow, u.notify_like, u.notify_comment, \
    u.created_at, u.updated_at";

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            user_name: row.user_name,
            email: row.email,
            password_hash: row.password_hash,
            bio: row.bio,
            profile_picture: row.profile_picture,
            cover_photo: row.cover_photo,
            profile_visibility: row
                .profile_visibility
                .parse()
                .map_err(AppError::DatabaseError)?,
            post_visibility: row
                .post_visibility
                .parse()
                .map_err(AppError::DatabaseError)?,
            notification_preferences: NotificationPreferences {
                follow: row.notify_follow,
                like: row.notify_like,
                comment: row.notify_comment,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub content: Option<String>,
    pub media: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            media: row.media,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// A post joined with its engagement counters and the viewer's like flag.
#[derive(Debug, FromRow)]
pub struct PostStatsRow {
    #[sqlx(flatten)]
    pub post: PostRow,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse().map_err(AppError::DatabaseError)?,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
