// Viewer Context - the authenticated caller, threaded explicitly through every operation

use crate::core::{Timestamp, UserId};

/// Request-scoped identity produced by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: UserId,
    /// `jti` of the bearer token, needed to revoke it on logout.
    pub token_id: String,
    /// Token expiry in milliseconds since epoch.
    pub token_expires_at: Timestamp,
    pub request_id: String,
}

impl ViewerContext {
    pub fn new(user_id: UserId, token_id: String, token_expires_at: Timestamp) -> Self {
        ViewerContext {
            user_id,
            token_id,
            token_expires_at,
            request_id: format!("req-{}", uuid::Uuid::new_v4()),
        }
    }
}
