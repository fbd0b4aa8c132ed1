// Core infrastructure modules
pub mod blob_store;            // Upload storage and URL resolution
pub mod database;              // SQLite pool, schema, transactions
pub mod id_generator;          // ID generation system
pub mod middleware;            // Bearer auth middleware and extractor
pub mod security;              // Password hashing and bearer tokens
pub mod viewer;                // Viewer context

pub use blob_store::{BlobStore, LocalBlobStore, Upload, UploadKind};
pub use database::{DatabaseTransaction, SocialDatabase};
pub use id_generator::IdGenerator;
pub use security::{SecurityConfig, SecurityService};
pub use viewer::ViewerContext;
