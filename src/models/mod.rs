// Social graph entities - plain data, derived fields live in the projections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{CommentId, NotificationId, PostId, Timestamp, UserId};

/// Who may see a profile or a user's posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    FriendsOnly,
}

impl Visibility {
    pub const ALL: [Visibility; 3] = [
        Visibility::Public,
        Visibility::Private,
        Visibility::FriendsOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::FriendsOnly => "friends-only",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Visibility::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown visibility: {}", s))
    }
}

/// Per-user opt-outs for engagement notifications. Every flag defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub follow: bool,
    pub like: bool,
    pub comment: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            follow: true,
            like: true,
            comment: true,
        }
    }
}

impl NotificationPreferences {
    pub fn allows(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::Follow => self.follow,
            NotificationType::Like => self.like,
            NotificationType::Comment => self.comment,
        }
    }
}

/// Partial preference payload; missing flags fall back to the default (on).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NotificationPreferencesUpdate {
    pub follow: Option<bool>,
    pub like: Option<bool>,
    pub comment: Option<bool>,
}

impl From<NotificationPreferencesUpdate> for NotificationPreferences {
    fn from(update: NotificationPreferencesUpdate) -> Self {
        let defaults = NotificationPreferences::default();
        Self {
            follow: update.follow.unwrap_or(defaults.follow),
            like: update.like.unwrap_or(defaults.like),
            comment: update.comment.unwrap_or(defaults.comment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    /// Encoded Argon2id credential hash; never serialized.
    pub password_hash: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub profile_visibility: Visibility,
    pub post_visibility: Visibility,
    pub notification_preferences: NotificationPreferences,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub content: Option<String>,
    /// Blob-store key or absolute external URL.
    pub media: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub comment: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Follow,
    Like,
    Comment,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "follow",
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(NotificationType::Follow),
            "like" => Ok(NotificationType::Like),
            "comment" => Ok(NotificationType::Comment),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

/// Unread -> read is the only transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationType,
    pub message: String,
    pub read: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

pub mod rows;
