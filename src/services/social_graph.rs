// Social Graph - directed follow edges between users

use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    core::{current_time_millis, UserId},
    error::{AppError, AppResult},
    infrastructure::database::{commit, SocialDatabase},
    models::{
        rows::{UserRow, USER_COLUMNS},
        NotificationType, User,
    },
};

use super::identity::require_user;
use super::notifications::NotificationService;

#[derive(Clone)]
pub struct SocialGraphService {
    db: SocialDatabase,
    notifications: Arc<NotificationService>,
}

impl SocialGraphService {
    pub fn new(db: SocialDatabase, notifications: Arc<NotificationService>) -> Self {
        Self { db, notifications }
    }

    /// Create `follower_id -> target_id`. An existing edge is left as is and
    /// does not notify again.
    #[instrument(skip(self))]
    pub async fn follow(&self, follower_id: UserId, target_id: UserId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        require_user(&mut *tx, target_id).await?;

        if follower_id == target_id {
            return Err(AppError::SelfReference("You cannot follow yourself".to_string()));
        }
        let follower = require_user(&mut *tx, follower_id).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO followers (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(target_id)
        .bind(current_time_millis())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            self.notifications
                .notify_in(&mut tx, target_id, NotificationType::Follow, &follower)
                .await?;
            info!(follower_id, target_id, "Follow edge created");
        }

        commit(tx).await
    }

    /// Remove the edge if present; a missing edge is fine, a missing user is not.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower_id: UserId, target_id: UserId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        require_user(&mut *tx, target_id).await?;

        let removed = sqlx::query("DELETE FROM followers WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        commit(tx).await?;
        if removed > 0 {
            info!(follower_id, target_id, "Follow edge removed");
        }
        Ok(())
    }

    pub async fn is_following(&self, subject_id: UserId, object_id: UserId) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM followers WHERE follower_id = ? AND following_id = ?")
            .bind(subject_id)
            .bind(object_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Users following `user_id`, oldest edge first.
    pub async fn list_followers(&self, user_id: UserId) -> AppResult<Vec<User>> {
        self.list_edges(user_id, "f.follower_id", "f.following_id").await
    }

    /// Users `user_id` follows, oldest edge first.
    pub async fn list_following(&self, user_id: UserId) -> AppResult<Vec<User>> {
        self.list_edges(user_id, "f.following_id", "f.follower_id").await
    }

    async fn list_edges(
        &self,
        user_id: UserId,
        join_column: &str,
        filter_column: &str,
    ) -> AppResult<Vec<User>> {
        require_user(self.db.pool(), user_id).await?;

        let sql = format!(
            "SELECT {} FROM followers f JOIN users u ON u.id = {}
             WHERE {} = ? ORDER BY f.created_at, u.id",
            USER_COLUMNS, join_column, filter_column
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::id_generator::IdGenerator;
    use crate::services::identity::tests::{identity, new_user};

    async fn setup() -> (SocialGraphService, Arc<NotificationService>, User, User) {
        let identity = identity().await;
        let alice = identity.register(new_user("alice")).await.unwrap();
        let bob = identity.register(new_user("bob")).await.unwrap();
        let db = identity.database().clone();
        let notifications = Arc::new(NotificationService::new(
            db.clone(),
            Arc::new(IdGenerator::new(3)),
        ));
        (
            SocialGraphService::new(db, notifications.clone()),
            notifications,
            alice,
            bob,
        )
    }

    #[tokio::test]
    async fn test_follow_then_unfollow_round_trips() {
        let (graph, _, alice, bob) = setup().await;
        let before = graph.list_following(alice.id).await.unwrap();

        graph.follow(alice.id, bob.id).await.unwrap();
        assert!(graph.is_following(alice.id, bob.id).await.unwrap());
        assert!(!graph.is_following(bob.id, alice.id).await.unwrap());
        assert_eq!(graph.list_followers(bob.id).await.unwrap()[0].id, alice.id);

        graph.unfollow(alice.id, bob.id).await.unwrap();
        assert_eq!(graph.list_following(alice.id).await.unwrap(), before);
        // Unfollowing again is harmless.
        graph.unfollow(alice.id, bob.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_self_follow_rejected_without_edge() {
        let (graph, notifications, alice, _) = setup().await;

        assert!(matches!(
            graph.follow(alice.id, alice.id).await,
            Err(AppError::SelfReference(_))
        ));
        assert!(graph.list_following(alice.id).await.unwrap().is_empty());
        assert!(notifications.list_for_user(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_unknown_user_is_not_found() {
        let (graph, _, alice, _) = setup().await;
        assert!(matches!(
            graph.follow(alice.id, 999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            graph.list_followers(999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repeat_follow_notifies_once() {
        let (graph, notifications, alice, bob) = setup().await;

        graph.follow(alice.id, bob.id).await.unwrap();
        graph.follow(alice.id, bob.id).await.unwrap();

        assert_eq!(graph.list_followers(bob.id).await.unwrap().len(), 1);
        let inbox = notifications.list_for_user(bob.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "ALICE Tester started following you.");
    }

    #[tokio::test]
    async fn test_follow_opt_out_skips_notification() {
        let (graph, notifications, alice, bob) = setup().await;
        sqlx::query("UPDATE users SET notify_follow = 0 WHERE id = ?")
            .bind(bob.id)
            .execute(graph.db.pool())
            .await
            .unwrap();

        graph.follow(alice.id, bob.id).await.unwrap();
        assert!(graph.is_following(alice.id, bob.id).await.unwrap());
        assert!(notifications.list_for_user(bob.id).await.unwrap().is_empty());
    }
}
