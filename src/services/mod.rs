// Domain services: one per component, sharing the SQLite store

pub mod content;
pub mod feed;
pub mod identity;
pub mod notifications;
pub mod projections;
pub mod social_graph;

pub use content::ContentService;
pub use feed::{FeedService, Page};
pub use identity::IdentityService;
pub use notifications::NotificationService;
pub use social_graph::SocialGraphService;
