use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub node_id: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            token_ttl_secs: 24 * 3600,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let auth_defaults = AuthConfig::default();
        Ok(Self {
            database: DatabaseConfig {
                url: var_or("DATABASE_URL", "sqlite:data/social_graph.db"),
                max_connections: parsed_var_or("DB_MAX_CONNECTIONS", 5)?,
            },
            server: ServerConfig {
                host: var_or("SERVER_HOST", "0.0.0.0"),
                port: parsed_var_or("SERVER_PORT", 3000)?,
                node_id: parsed_var_or("NODE_ID", 0)?,
            },
            storage: StorageConfig {
                root: var_or("STORAGE_ROOT", "data/storage"),
                public_url: var_or("PUBLIC_URL", "http://localhost:3000"),
            },
            auth: AuthConfig {
                jwt_secret: var_or("JWT_SECRET", &auth_defaults.jwt_secret),
                token_ttl_secs: parsed_var_or("TOKEN_TTL_SECS", auth_defaults.token_ttl_secs)?,
                argon2_memory_kib: parsed_var_or(
                    "ARGON2_MEMORY_KIB",
                    auth_defaults.argon2_memory_kib,
                )?,
                argon2_iterations: parsed_var_or(
                    "ARGON2_ITERATIONS",
                    auth_defaults.argon2_iterations,
                )?,
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
