// Feed Composer - chronological post pages filtered by graph membership

use serde::Serialize;
use tracing::debug;

use crate::{
    core::UserId,
    error::AppResult,
    infrastructure::database::SocialDatabase,
    models::rows::PostStatsRow,
};

use super::content::{attach_authors, PostDetails, POST_STATS_SELECT};

pub const DEFAULT_PAGE_SIZE: i64 = 5;

/// One page of an offset-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, current_page: i64, per_page: i64, total: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            data,
            current_page,
            per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

/// Which posts a listing draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedScope {
    Own,
    Relevant,
}

impl FeedScope {
    /// Filter appended after `FROM posts p JOIN users u`. Both placeholders
    /// take the viewer id.
    fn filter(&self) -> &'static str {
        match self {
            FeedScope::Own => "p.deleted_at IS NULL AND p.user_id = ?",
            // friends-only is only reachable through the follow edge, like private.
            FeedScope::Relevant => {
                "p.deleted_at IS NULL AND (u.post_visibility = 'public' \
                 OR p.user_id IN (SELECT following_id FROM followers WHERE follower_id = ?))"
            }
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    db: SocialDatabase,
    page_size: i64,
}

impl FeedService {
    pub fn new(db: SocialDatabase) -> Self {
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The viewer's own live posts at any visibility, newest first.
    pub async fn my_posts(&self, viewer_id: UserId, page: i64) -> AppResult<Page<PostDetails>> {
        self.compose(FeedScope::Own, viewer_id, page).await
    }

    /// Posts from public-post authors or authors the viewer follows, newest first.
    pub async fn relevant_feed(&self, viewer_id: UserId, page: i64) -> AppResult<Page<PostDetails>> {
        self.compose(FeedScope::Relevant, viewer_id, page).await
    }

    async fn compose(
        &self,
        scope: FeedScope,
        viewer_id: UserId,
        page: i64,
    ) -> AppResult<Page<PostDetails>> {
        let page = page.max(1);
        // Past-the-end pages stay past the end instead of wrapping.
        let offset = (page - 1).saturating_mul(self.page_size);

        let count_sql = format!(
            "SELECT COUNT(*) FROM posts p JOIN users u ON u.id = p.user_id WHERE {}",
            scope.filter()
        );
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(viewer_id)
            .fetch_one(self.db.pool())
            .await?;

        let page_sql = format!(
            "{} JOIN users u ON u.id = p.user_id WHERE {}
             ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_STATS_SELECT,
            scope.filter()
        );
        let rows = sqlx::query_as::<_, PostStatsRow>(&page_sql)
            .bind(viewer_id)
            .bind(viewer_id)
            .bind(self.page_size)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        debug!(?scope, viewer_id, page, total, returned = rows.len(), "Composed feed page");
        let data = attach_authors(self.db.pool(), rows).await?;
        Ok(Page::new(data, page, self.page_size, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use crate::services::content::tests::fixture;
    use crate::services::identity::tests::new_user;
    use std::collections::HashSet;

    async fn set_post_visibility(db: &SocialDatabase, user_id: UserId, visibility: Visibility) {
        sqlx::query("UPDATE users SET post_visibility = ? WHERE id = ?")
            .bind(visibility.as_str())
            .bind(user_id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    async fn follow(db: &SocialDatabase, follower: UserId, target: UserId) {
        sqlx::query("INSERT INTO followers (follower_id, following_id, created_at) VALUES (?, ?, 0)")
            .bind(follower)
            .bind(target)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[test]
    fn test_page_arithmetic() {
        let page = Page::new(vec![1, 2], 3, 5, 12);
        assert_eq!(page.last_page, 3);
        assert_eq!(Page::<i32>::new(vec![], 1, 5, 0).last_page, 1);
        assert_eq!(page.map(|n| n * 10).data, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_relevant_feed_is_public_or_followed() {
        let f = fixture().await;
        let db = f.identity.database().clone();
        let feed = FeedService::new(db.clone()).with_page_size(50);

        let viewer = f.identity.register(new_user("viewer")).await.unwrap();
        let open = f.identity.register(new_user("open")).await.unwrap();
        let closed = f.identity.register(new_user("closed")).await.unwrap();
        let friend = f.identity.register(new_user("friend")).await.unwrap();
        let circle = f.identity.register(new_user("circle")).await.unwrap();
        set_post_visibility(&db, closed.id, Visibility::Private).await;
        set_post_visibility(&db, friend.id, Visibility::Private).await;
        set_post_visibility(&db, circle.id, Visibility::FriendsOnly).await;
        follow(&db, viewer.id, friend.id).await;

        let open_post = f.content.create_post(open.id, None, None).await.unwrap().post;
        let closed_post = f.content.create_post(closed.id, None, None).await.unwrap().post;
        let friend_post = f.content.create_post(friend.id, None, None).await.unwrap().post;
        let circle_post = f.content.create_post(circle.id, None, None).await.unwrap().post;
        let gone = f.content.create_post(open.id, None, None).await.unwrap().post;
        f.content.delete_post(open.id, gone.id).await.unwrap();

        let page = feed.relevant_feed(viewer.id, 1).await.unwrap();
        let ids: HashSet<_> = page.data.iter().map(|d| d.post.id).collect();

        assert!(ids.contains(&open_post.id));
        assert!(ids.contains(&friend_post.id));
        assert!(!ids.contains(&closed_post.id));
        assert!(!ids.contains(&circle_post.id));
        assert!(!ids.contains(&gone.id));
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_my_posts_paginates_newest_first() {
        let f = fixture().await;
        let feed = FeedService::new(f.identity.database().clone());
        let alice = f.identity.register(new_user("alice")).await.unwrap();
        let bob = f.identity.register(new_user("bob")).await.unwrap();
        set_post_visibility(f.identity.database(), alice.id, Visibility::Private).await;

        let mut created = Vec::new();
        for n in 0..7 {
            let post = f
                .content
                .create_post(alice.id, Some(format!("post {}", n)), None)
                .await
                .unwrap()
                .post;
            created.push(post.id);
        }
        f.content.create_post(bob.id, None, None).await.unwrap();

        let first = feed.my_posts(alice.id, 1).await.unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.per_page, DEFAULT_PAGE_SIZE);
        assert_eq!(first.last_page, 2);
        assert_eq!(first.data.len(), 5);
        assert_eq!(first.data[0].post.id, created[6]);

        let second = feed.my_posts(alice.id, 2).await.unwrap();
        assert_eq!(second.data.len(), 2);
        assert_eq!(second.data[1].post.id, created[0]);

        // Out-of-range page numbers clamp to the first page.
        assert_eq!(feed.my_posts(alice.id, 0).await.unwrap().current_page, 1);
    }

    #[tokio::test]
    async fn test_oversized_page_is_empty() {
        let f = fixture().await;
        let feed = FeedService::new(f.identity.database().clone());
        let alice = f.identity.register(new_user("alice")).await.unwrap();
        f.content.create_post(alice.id, None, None).await.unwrap();

        for page in [3, i64::MAX / DEFAULT_PAGE_SIZE + 1, i64::MAX] {
            let listing = feed.relevant_feed(alice.id, page).await.unwrap();
            assert!(listing.data.is_empty());
            assert_eq!(listing.current_page, page);
            assert_eq!(listing.total, 1);
            assert_eq!(listing.last_page, 1);
        }
    }
}
