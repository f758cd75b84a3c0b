use std::env;

use anyhow::{Context, Result};

pub const DEFAULT_PUSH_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";
const DEFAULT_NOTIFICATION_PAGE_LIMIT: i64 = 50;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub push: PushConfig,
    pub notification: NotificationConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: env::var("DATABASE_HOST").context("DATABASE_HOST is not set")?,
            port: env::var("DATABASE_PORT")
                .context("DATABASE_PORT is not set")?
                .parse()
                .context("DATABASE_PORT must be a port number")?,
            username: env::var("DATABASE_USERNAME").context("DATABASE_USERNAME is not set")?,
            password: env::var("DATABASE_PASSWORD").context("DATABASE_PASSWORD is not set")?,
            database: env::var("DATABASE_NAME").context("DATABASE_NAME is not set")?,
        };
        let push = PushConfig {
            endpoint: env::var("PUSH_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_PUSH_ENDPOINT.to_string()),
            server_key: env::var("PUSH_SERVER_KEY").ok().filter(|k| !k.is_empty()),
        };
        let notification = NotificationConfig {
            page_limit: match env::var("NOTIFICATION_PAGE_LIMIT") {
                Ok(v) => v
                    .parse()
                    .context("NOTIFICATION_PAGE_LIMIT must be an integer")?,
                Err(_) => DEFAULT_NOTIFICATION_PAGE_LIMIT,
            },
        };
        let server = ServerConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        };
        Ok(Self {
            database,
            push,
            notification,
            server,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Clone)]
pub struct PushConfig {
    pub endpoint: String,
    // 未設定の場合はプッシュ通知を送らない（通知一覧のポーリングで補う）
    pub server_key: Option<String>,
}

#[derive(Clone, Copy)]
pub struct NotificationConfig {
    pub page_limit: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_NOTIFICATION_PAGE_LIMIT,
        }
    }
}

pub struct ServerConfig {
    pub bind_addr: String,
}
