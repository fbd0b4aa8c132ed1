// Notification Fan-out - preference-gated notification records for graph and content events

use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    core::{current_time_millis, NotificationId, UserId},
    error::{AppError, AppResult},
    infrastructure::{
        database::{commit, SocialDatabase},
        id_generator::IdGenerator,
    },
    models::{rows::NotificationRow, Notification, NotificationType, User},
};

use super::identity::require_user;

/// Rendered message for an engagement event performed by `actor`.
pub fn render_message(kind: NotificationType, actor: &User) -> String {
    let action = match kind {
        NotificationType::Follow => "started following you.",
        NotificationType::Like => "liked your post.",
        NotificationType::Comment => "commented on your post.",
    };
    format!("{} {}", actor.full_name(), action)
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, message, read, created_at, updated_at, deleted_at";

/// Dispatches notifications on the caller's open transaction, so a failed
/// insert rolls the triggering mutation back with it.
#[derive(Clone)]
pub struct NotificationService {
    db: SocialDatabase,
    ids: Arc<IdGenerator>,
}

impl NotificationService {
    pub fn new(db: SocialDatabase, ids: Arc<IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Create a notification for `recipient_id` unless they opted out of
    /// `kind` or are the actor themselves. Returns the new id when one was
    /// written.
    #[instrument(skip(self, conn, actor), fields(actor_id = actor.id))]
    pub async fn notify_in(
        &self,
        conn: &mut SqliteConnection,
        recipient_id: UserId,
        kind: NotificationType,
        actor: &User,
    ) -> AppResult<Option<NotificationId>> {
        if recipient_id == actor.id {
            debug!("Skipping self notification");
            return Ok(None);
        }

        let recipient = require_user(&mut *conn, recipient_id).await?;
        if !recipient.notification_preferences.allows(kind) {
            debug!(kind = kind.as_str(), "Recipient opted out");
            return Ok(None);
        }

        let id = self.ids.next_id();
        let now = current_time_millis();
        sqlx::query(
            "INSERT INTO notifications (id, user_id, type, message, read, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(recipient_id)
        .bind(kind.as_str())
        .bind(render_message(kind, actor))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!(
                "Failed to create {} notification for {}: {}",
                kind.as_str(),
                recipient_id,
                e
            ))
        })?;

        Ok(Some(id))
    }

    /// Standalone variant of [`notify_in`](Self::notify_in) with its own transaction.
    pub async fn notify(
        &self,
        recipient_id: UserId,
        kind: NotificationType,
        actor: &User,
    ) -> AppResult<Option<NotificationId>> {
        let mut tx = self.db.begin().await?;
        let id = self.notify_in(&mut tx, recipient_id, kind, actor).await?;
        commit(tx).await?;
        Ok(id)
    }

    /// Live notifications, unread first, newest first within each group.
    pub async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications
             WHERE user_id = ? AND deleted_at IS NULL
             ORDER BY read ASC, created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Only the unread -> read transition touches the row; repeat calls
    /// still match it, so ownership failures stay distinguishable.
    pub async fn mark_read(&self, user_id: UserId, id: NotificationId) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications
             SET read = 1, updated_at = CASE WHEN read = 1 THEN updated_at ELSE ? END
             WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(current_time_millis())
        .bind(id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }
}
