// Social Graph - social networking backend: follow graph, posts, feeds and notifications

// Core types and primitives
pub mod core;

// Infrastructure - SQLite store, blob storage, auth primitives, viewer context
pub mod infrastructure;

// Entities and their row shapes
pub mod models;

// Domain services - identity, graph, content, fan-out, feed
pub mod services;

// HTTP surface
pub mod api;

// Common utilities
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};
