// Identity Store - user records, credentials, visibility and notification preferences

use serde::Serialize;
use sqlx::{Executor, Sqlite};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    core::{current_time_millis, UserId},
    error::{AppError, AppResult, FieldErrors},
    infrastructure::{
        database::{commit, is_unique_violation, SocialDatabase},
        id_generator::IdGenerator,
        security::{IssuedToken, SecurityService},
        viewer::ViewerContext,
    },
    models::{
        rows::{UserRow, USER_COLUMNS},
        NotificationPreferences, NotificationPreferencesUpdate, User, Visibility,
    },
};

/// Registration payload, already shape-checked by the request validator.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Profile changes. `None` leaves a field untouched; for `bio`,
/// `Some(None)` clears it.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<Option<String>>,
    pub profile_visibility: Visibility,
    pub post_visibility: Visibility,
    /// Blob key of a newly stored avatar.
    pub profile_picture: Option<String>,
    /// Blob key of a newly stored cover image.
    pub cover_photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileCounts {
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

/// Load a user by id on any executor (pool or open transaction).
pub async fn fetch_user<'e, E>(executor: E, id: UserId) -> AppResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS);
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get user {}: {}", id, e)))?;
    row.map(User::try_from).transpose()
}

/// Like [`fetch_user`] but absence is a `NotFound`.
pub async fn require_user<'e, E>(executor: E, id: UserId) -> AppResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    fetch_user(executor, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Clone)]
pub struct IdentityService {
    db: SocialDatabase,
    ids: Arc<IdGenerator>,
    security: Arc<SecurityService>,
}

impl IdentityService {
    pub fn new(db: SocialDatabase, ids: Arc<IdGenerator>, security: Arc<SecurityService>) -> Self {
        Self { db, ids, security }
    }

    pub fn database(&self) -> &SocialDatabase {
        &self.db
    }

    pub fn security(&self) -> &SecurityService {
        &self.security
    }

    pub async fn get(&self, id: UserId) -> AppResult<User> {
        require_user(self.db.pool(), id).await
    }

    async fn field_taken(&self, column: &str, value: &str, except: Option<UserId>) -> AppResult<bool> {
        let sql = format!("SELECT 1 FROM users WHERE {} = ? AND id <> ?", column);
        let row = sqlx::query(&sql)
            .bind(value)
            .bind(except.unwrap_or(0))
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self, new_user), fields(user_name = %new_user.user_name))]
    pub async fn register(&self, new_user: NewUser) -> AppResult<User> {
        let mut errors = FieldErrors::new();
        if self.field_taken("user_name", &new_user.user_name, None).await? {
            errors.add("user_name", "The user name has already been taken.");
        }
        if self.field_taken("email", &new_user.email, None).await? {
            errors.add("email", "The email has already been taken.");
        }
        errors.into_result()?;

        let password_hash = self.security.hash_password(&new_user.password).await?;
        let id = self.ids.next_id();
        let now = current_time_millis();

        let inserted = sqlx::query(
            "INSERT INTO users (id, first_name, last_name, user_name, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.user_name)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await;

        match inserted {
            Ok(_) => {}
            // Lost a race with a concurrent registration.
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Validation(FieldErrors::single(
                    "email",
                    "The email or user name has already been taken.",
                )))
            }
            Err(e) => {
                return Err(AppError::DatabaseError(format!(
                    "Failed to create user {}: {}",
                    new_user.user_name, e
                )))
            }
        }

        info!(user_id = id, "User registered");
        self.get(id).await
    }

    /// Check credentials; unknown email and wrong password look the same.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let sql = format!("SELECT {} FROM users u WHERE u.email = ?", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
        let user = User::try_from(row.ok_or_else(invalid)?)?;
        if !self.security.verify_password(password, &user.password_hash).await? {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(invalid());
        }
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<(User, IssuedToken)> {
        let user = self.authenticate(email, password).await?;
        let token = self.security.issue_token(user.id)?;
        info!(user_id = user.id, "User logged in");
        Ok((user, token))
    }

    /// Revoke the caller's current bearer token.
    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn logout(&self, viewer: &ViewerContext) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO revoked_tokens (jti, user_id, expires_at, revoked_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&viewer.token_id)
        .bind(viewer.user_id)
        .bind(viewer.token_expires_at)
        .bind(current_time_millis())
        .execute(self.db.pool())
        .await?;

        // Revocations only matter until the token would have expired anyway.
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(current_time_millis())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM revoked_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn profile(&self, id: UserId) -> AppResult<(User, ProfileCounts)> {
        let user = self.get(id).await?;
        let (followers_count, following_count, posts_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM followers WHERE following_id = ?1),
                (SELECT COUNT(*) FROM followers WHERE follower_id = ?1),
                (SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(self.db.pool())
        .await?;

        Ok((
            user,
            ProfileCounts {
                followers_count,
                following_count,
                posts_count,
            },
        ))
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> AppResult<User> {
        let current = self.get(id).await?;

        if let Some(email) = update.email.as_deref() {
            if self.field_taken("email", email, Some(id)).await? {
                return Err(AppError::Validation(FieldErrors::single(
                    "email",
                    "The email has already been taken.",
                )));
            }
        }

        let bio = match update.bio {
            Some(bio) => bio,
            None => current.bio,
        };

        sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, email = ?, bio = ?,
                profile_visibility = ?, post_visibility = ?,
                profile_picture = ?, cover_photo = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(update.first_name.unwrap_or(current.first_name))
        .bind(update.last_name.unwrap_or(current.last_name))
        .bind(update.email.unwrap_or(current.email))
        .bind(bio)
        .bind(update.profile_visibility.as_str())
        .bind(update.post_visibility.as_str())
        .bind(update.profile_picture.or(current.profile_picture))
        .bind(update.cover_photo.or(current.cover_photo))
        .bind(current_time_millis())
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(FieldErrors::single("email", "The email has already been taken."))
            } else {
                AppError::DatabaseError(format!("Failed to update user {}: {}", id, e))
            }
        })?;

        info!(user_id = id, "Profile updated");
        self.get(id).await
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get(id).await?;
        if !self.security.verify_password(old_password, &user.password_hash).await? {
            return Err(AppError::BadRequest("Old password is incorrect".to_string()));
        }

        let password_hash = self.security.hash_password(new_password).await?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(current_time_millis())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        info!(user_id = id, "Password changed");
        Ok(())
    }

    /// Replace the preference record; flags left out revert to on.
    pub async fn update_notification_preferences(
        &self,
        id: UserId,
        update: NotificationPreferencesUpdate,
    ) -> AppResult<NotificationPreferences> {
        let prefs = NotificationPreferences::from(update);
        let mut tx = self.db.begin().await?;
        require_user(&mut *tx, id).await?;

        sqlx::query(
            "UPDATE users SET notify_follow = ?, notify_like = ?, notify_comment = ?, updated_at = ? WHERE id = ?",
        )
        .bind(prefs.follow)
        .bind(prefs.like)
        .bind(prefs.comment)
        .bind(current_time_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        commit(tx).await?;

        Ok(prefs)
    }

    /// Public profiles whose handle contains `query`, minus the viewer,
    /// each paired with whether the viewer follows them.
    pub async fn search(&self, viewer_id: UserId, query: Option<&str>) -> AppResult<Vec<(User, bool)>> {
        let pattern = like_pattern(query.map(str::trim).unwrap_or_default());
        let sql = format!(
            "SELECT {}, EXISTS(
                    SELECT 1 FROM followers f WHERE f.follower_id = ?1 AND f.following_id = u.id
                ) AS is_following
             FROM users u
             WHERE u.profile_visibility = 'public' AND u.id <> ?1
               AND u.user_name LIKE ?2 ESCAPE '\\'
             ORDER BY u.user_name",
            USER_COLUMNS
        );

        #[derive(sqlx::FromRow)]
        struct SearchRow {
            #[sqlx(flatten)]
            user: UserRow,
            is_following: bool,
        }

        let rows = sqlx::query_as::<_, SearchRow>(&sql)
            .bind(viewer_id)
            .bind(pattern)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter()
            .map(|row| Ok((User::try_from(row.user)?, row.is_following)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::security::SecurityConfig;

    pub(crate) async fn identity() -> IdentityService {
        let db = SocialDatabase::new_in_memory().await.unwrap();
        IdentityService::new(
            db,
            Arc::new(IdGenerator::new(1)),
            Arc::new(SecurityService::new(SecurityConfig::for_tests()).unwrap()),
        )
    }

    pub(crate) fn new_user(handle: &str) -> NewUser {
        NewUser {
            first_name: handle.to_uppercase(),
            last_name: "Tester".to_string(),
            user_name: handle.to_string(),
            email: format!("{}@example.com", handle),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_applies_defaults() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();

        assert_eq!(user.profile_visibility, Visibility::Public);
        assert_eq!(user.post_visibility, Visibility::Public);
        assert_eq!(user.notification_preferences, NotificationPreferences::default());
        assert_ne!(user.password_hash, "password123");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_per_field() {
        let identity = identity().await;
        identity.register(new_user("ada")).await.unwrap();

        let err = identity.register(new_user("ada")).await.unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.get("user_name").is_some());
                assert!(errors.get("email").is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_and_bad_credentials() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();

        let (logged_in, token) = identity.login("ada@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(token.claims.user_id().unwrap(), user.id);

        assert!(matches!(
            identity.login("ada@example.com", "wrong-password").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            identity.login("nobody@example.com", "password123").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();
        let (_, token) = identity.login("ada@example.com", "password123").await.unwrap();

        let viewer = ViewerContext::new(
            user.id,
            token.claims.jti.clone(),
            token.claims.exp as i64 * 1000,
        );
        assert!(!identity.is_token_revoked(&viewer.token_id).await.unwrap());
        identity.logout(&viewer).await.unwrap();
        assert!(identity.is_token_revoked(&viewer.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();

        assert!(matches!(
            identity.change_password(user.id, "not-it-at-all", "newpassword1").await,
            Err(AppError::BadRequest(_))
        ));

        identity
            .change_password(user.id, "password123", "newpassword1")
            .await
            .unwrap();
        identity.authenticate("ada@example.com", "newpassword1").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_profile_preserves_unsent_fields() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();
        let other = identity.register(new_user("bob")).await.unwrap();

        let updated = identity
            .update_profile(
                user.id,
                ProfileUpdate {
                    first_name: None,
                    last_name: Some("Byron".to_string()),
                    email: None,
                    bio: Some(Some("Analyst".to_string())),
                    profile_visibility: Visibility::Private,
                    post_visibility: Visibility::FriendsOnly,
                    profile_picture: Some("profile_pictures/a.png".to_string()),
                    cover_photo: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, user.first_name);
        assert_eq!(updated.full_name(), "ADA Byron");
        assert_eq!(updated.bio.as_deref(), Some("Analyst"));
        assert_eq!(updated.post_visibility, Visibility::FriendsOnly);
        assert_eq!(updated.profile_picture.as_deref(), Some("profile_pictures/a.png"));

        let err = identity
            .update_profile(
                user.id,
                ProfileUpdate {
                    first_name: None,
                    last_name: None,
                    email: Some(other.email.clone()),
                    bio: None,
                    profile_visibility: Visibility::Public,
                    post_visibility: Visibility::Public,
                    profile_picture: None,
                    cover_photo: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_preferences_replace_with_defaults() {
        let identity = identity().await;
        let user = identity.register(new_user("ada")).await.unwrap();

        let prefs = identity
            .update_notification_preferences(
                user.id,
                NotificationPreferencesUpdate {
                    follow: Some(false),
                    like: Some(false),
                    comment: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            prefs,
            NotificationPreferences {
                follow: false,
                like: false,
                comment: true
            }
        );
        assert_eq!(identity.get(user.id).await.unwrap().notification_preferences, prefs);
    }

    #[tokio::test]
    async fn test_search_filters_private_and_self() {
        let identity = identity().await;
        let viewer = identity.register(new_user("ada_viewer")).await.unwrap();
        identity.register(new_user("ada_public")).await.unwrap();
        let hidden = identity.register(new_user("ada_hidden")).await.unwrap();
        identity.register(new_user("bob")).await.unwrap();

        identity
            .update_profile(
                hidden.id,
                ProfileUpdate {
                    first_name: None,
                    last_name: None,
                    email: None,
                    bio: None,
                    profile_visibility: Visibility::Private,
                    post_visibility: Visibility::Public,
                    profile_picture: None,
                    cover_photo: None,
                },
            )
            .await
            .unwrap();

        let results = identity.search(viewer.id, Some("ADA")).await.unwrap();
        let handles: Vec<_> = results.iter().map(|(u, _)| u.user_name.as_str()).collect();
        assert_eq!(handles, vec!["ada_public"]);
        assert!(!results[0].1);

        // `_` is literal, not a single-character wildcard.
        assert!(identity.search(viewer.id, Some("a_a")).await.unwrap().is_empty());
        assert_eq!(identity.search(viewer.id, None).await.unwrap().len(), 2);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a_b%c\\"), "%a\\_b\\%c\\\\%");
    }
}
