// Core types and primitives shared by every layer

pub mod relative_time;
pub mod types;

pub use relative_time::human_since;
pub use types::{current_time_millis, CommentId, NotificationId, PostId, Timestamp, UserId};
