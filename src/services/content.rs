// Content Store - posts, like edges and comments

use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    core::{current_time_millis, PostId, UserId},
    error::{AppError, AppResult},
    infrastructure::{
        database::{commit, SocialDatabase},
        id_generator::IdGenerator,
    },
    models::{
        rows::{CommentRow, PostRow, PostStatsRow, UserRow, USER_COLUMNS},
        Comment, NotificationType, Post, User,
    },
};

use super::identity::require_user;
use super::notifications::NotificationService;
use super::social_graph::SocialGraphService;

/// Post columns plus engagement counters. The single placeholder is the
/// viewer id used for `is_liked`.
pub(crate) const POST_STATS_SELECT: &str = "SELECT p.id, p.user_id, p.content, p.media, \
    p.created_at, p.updated_at, p.deleted_at, \
    (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes_count, \
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comments_count, \
    EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = ?) AS is_liked \
    FROM posts p";

/// A live post with its author and read-side counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetails {
    pub post: Post,
    pub author: User,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author: User,
}

/// Batch-load users by id.
pub(crate) async fn load_users<'e, E>(executor: E, ids: &[UserId]) -> AppResult<HashMap<UserId, User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM users u WHERE u.id IN (",
        USER_COLUMNS
    ));
    let mut separated = qb.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    qb.push(")");

    let rows = qb
        .build_query_as::<UserRow>()
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to load users: {}", e)))?;

    rows.into_iter()
        .map(|row| User::try_from(row).map(|user| (user.id, user)))
        .collect()
}

/// Pair stats rows with their authors, preserving row order.
pub(crate) async fn attach_authors<'e, E>(
    executor: E,
    rows: Vec<PostStatsRow>,
) -> AppResult<Vec<PostDetails>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut author_ids: Vec<UserId> = rows.iter().map(|row| row.post.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let authors = load_users(executor, &author_ids).await?;

    rows.into_iter()
        .map(|row| {
            let author = authors
                .get(&row.post.user_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::DatabaseError(format!("Post {} has no author", row.post.id))
                })?;
            Ok(PostDetails {
                post: Post::from(row.post),
                author,
                likes_count: row.likes_count,
                comments_count: row.comments_count,
                is_liked: row.is_liked,
            })
        })
        .collect()
}

async fn fetch_live_post(conn: &mut SqliteConnection, post_id: PostId) -> AppResult<Post> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT id, user_id, content, media, created_at, updated_at, deleted_at
         FROM posts WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(post_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Post::from)
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

#[derive(Clone)]
pub struct ContentService {
    db: SocialDatabase,
    ids: Arc<IdGenerator>,
    notifications: Arc<NotificationService>,
    graph: SocialGraphService,
}

impl ContentService {
    pub fn new(
        db: SocialDatabase,
        ids: Arc<IdGenerator>,
        notifications: Arc<NotificationService>,
        graph: SocialGraphService,
    ) -> Self {
        Self {
            db,
            ids,
            notifications,
            graph,
        }
    }

    /// Posts by `author` are readable by `viewer_id` when they are the
    /// author, the author posts publicly, or the viewer follows them.
    async fn ensure_visible(&self, viewer_id: UserId, author: &User) -> AppResult<()> {
        if author.id == viewer_id
            || author.post_visibility.is_public()
            || self.graph.is_following(viewer_id, author.id).await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound("Post not found".to_string()))
        }
    }

    /// A live post owned by `author_id`; anyone else's post reads as missing.
    pub async fn owned_post(&self, author_id: UserId, post_id: PostId) -> AppResult<Post> {
        let mut conn = self.db.pool().acquire().await?;
        let post = fetch_live_post(&mut conn, post_id).await?;
        if post.user_id != author_id {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(post)
    }

    async fn details(&self, viewer_id: UserId, post_id: PostId) -> AppResult<PostDetails> {
        let sql = format!("{} WHERE p.id = ? AND p.deleted_at IS NULL", POST_STATS_SELECT);
        let row = sqlx::query_as::<_, PostStatsRow>(&sql)
            .bind(viewer_id)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        attach_authors(self.db.pool(), vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    #[instrument(skip(self, content, media))]
    pub async fn create_post(
        &self,
        author_id: UserId,
        content: Option<String>,
        media: Option<String>,
    ) -> AppResult<PostDetails> {
        let id = self.ids.next_id();
        let now = current_time_millis();

        let mut tx = self.db.begin().await?;
        require_user(&mut *tx, author_id).await?;
        sqlx::query(
            "INSERT INTO posts (id, user_id, content, media, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(author_id)
        .bind(content)
        .bind(media)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create post: {}", e)))?;
        commit(tx).await?;

        info!(post_id = id, "Post created");
        self.details(author_id, id).await
    }

    /// Replace the text of an owned post. `media: None` keeps the stored reference.
    #[instrument(skip(self, content, media))]
    pub async fn update_post(
        &self,
        author_id: UserId,
        post_id: PostId,
        content: Option<String>,
        media: Option<String>,
    ) -> AppResult<PostDetails> {
        let result = sqlx::query(
            "UPDATE posts SET content = ?, media = COALESCE(?, media), updated_at = ?
             WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(content)
        .bind(media)
        .bind(current_time_millis())
        .bind(post_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        self.details(author_id, post_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, author_id: UserId, post_id: PostId) -> AppResult<()> {
        let now = current_time_millis();
        let result = sqlx::query(
            "UPDATE posts SET deleted_at = ?, updated_at = ?
             WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(post_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        info!(post_id, "Post soft-deleted");
        Ok(())
    }

    /// A post the viewer may read: their own, from a public-post author,
    /// or from someone they follow.
    pub async fn show_post(&self, viewer_id: UserId, post_id: PostId) -> AppResult<PostDetails> {
        let details = self.details(viewer_id, post_id).await?;
        self.ensure_visible(viewer_id, &details.author).await?;
        Ok(details)
    }

    /// Idempotent; only the first like notifies the author.
    #[instrument(skip(self))]
    pub async fn like(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let post = fetch_live_post(&mut tx, post_id).await?;
        let liker = require_user(&mut *tx, user_id).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO post_likes (user_id, post_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(current_time_millis())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            self.notifications
                .notify_in(&mut tx, post.user_id, NotificationType::Like, &liker)
                .await?;
        }
        commit(tx).await
    }

    #[instrument(skip(self))]
    pub async fn unlike(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        fetch_live_post(&mut tx, post_id).await?;

        sqlx::query("DELETE FROM post_likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        commit(tx).await
    }

    #[instrument(skip(self, body))]
    pub async fn comment(
        &self,
        user_id: UserId,
        post_id: PostId,
        body: &str,
    ) -> AppResult<CommentWithAuthor> {
        let id = self.ids.next_id();
        let now = current_time_millis();

        let mut tx = self.db.begin().await?;
        let post = fetch_live_post(&mut tx, post_id).await?;
        let author = require_user(&mut *tx, user_id).await?;

        sqlx::query(
            "INSERT INTO comments (id, post_id, user_id, comment, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(post_id)
        .bind(user_id)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comment: {}", e)))?;

        self.notifications
            .notify_in(&mut tx, post.user_id, NotificationType::Comment, &author)
            .await?;
        commit(tx).await?;

        info!(comment_id = id, "Comment added");
        Ok(CommentWithAuthor {
            comment: Comment {
                id,
                post_id,
                user_id,
                comment: body.to_string(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
            author,
        })
    }

    /// Live comments on a post the viewer may read, oldest first.
    pub async fn list_comments(
        &self,
        viewer_id: UserId,
        post_id: PostId,
    ) -> AppResult<Vec<CommentWithAuthor>> {
        let post = {
            let mut conn = self.db.pool().acquire().await?;
            fetch_live_post(&mut conn, post_id).await?
        };
        let post_author = require_user(self.db.pool(), post.user_id).await?;
        self.ensure_visible(viewer_id, &post_author).await?;

        let mut conn = self.db.pool().acquire().await?;

        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, user_id, comment, created_at, updated_at, deleted_at
             FROM comments WHERE post_id = ? AND deleted_at IS NULL
             ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut author_ids: Vec<UserId> = rows.iter().map(|row| row.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors = load_users(&mut *conn, &author_ids).await?;

        rows.into_iter()
            .map(|row| {
                let author = authors.get(&row.user_id).cloned().ok_or_else(|| {
                    AppError::DatabaseError(format!("Comment {} has no author", row.id))
                })?;
                Ok(CommentWithAuthor {
                    comment: Comment::from(row),
                    author,
                })
            })
            .collect()
    }
}
