use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use crate::{
    config::{AuthConfig, Config, DatabaseConfig, ServerConfig, StorageConfig},
    infrastructure::{
        middleware::HasIdentity, BlobStore, IdGenerator, LocalBlobStore, SecurityConfig,
        SecurityService, SocialDatabase,
    },
    services::{ContentService, FeedService, IdentityService, NotificationService, SocialGraphService},
};

#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub graph: SocialGraphService,
    pub content: ContentService,
    pub feed: FeedService,
    pub notifications: Arc<NotificationService>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = SocialDatabase::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to open database")?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
            &config.storage.root,
            &config.storage.public_url,
        ));
        let security = SecurityService::new(SecurityConfig::from(&config.auth))
            .context("invalid auth configuration")?;

        Ok(Self::assemble(database, blobs, security, config))
    }

    /// Fully wired state on an in-memory database with cheap hashing.
    pub async fn in_memory(storage_root: &Path) -> anyhow::Result<Self> {
        let public_url = "http://localhost:3000".to_string();
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                node_id: 0,
            },
            storage: StorageConfig {
                root: storage_root.display().to_string(),
                public_url: public_url.clone(),
            },
            auth: AuthConfig::default(),
        };

        let database = SocialDatabase::new_in_memory()
            .await
            .context("failed to open in-memory database")?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(storage_root, &public_url));
        let security = SecurityService::new(SecurityConfig::for_tests())
            .context("invalid test auth configuration")?;

        Ok(Self::assemble(database, blobs, security, config))
    }

    fn assemble(
        database: SocialDatabase,
        blobs: Arc<dyn BlobStore>,
        security: SecurityService,
        config: Config,
    ) -> Self {
        let ids = Arc::new(IdGenerator::new(config.server.node_id));
        let notifications = Arc::new(NotificationService::new(database.clone(), ids.clone()));
        let graph = SocialGraphService::new(database.clone(), notifications.clone());

        Self {
            identity: IdentityService::new(database.clone(), ids.clone(), Arc::new(security)),
            content: ContentService::new(database.clone(), ids, notifications.clone(), graph.clone()),
            feed: FeedService::new(database),
            graph,
            notifications,
            blobs,
            config,
        }
    }
}

impl HasIdentity for AppState {
    fn identity(&self) -> &IdentityService {
        &self.identity
    }
}
