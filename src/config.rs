//! Runtime configuration from flags, environment and `.env`

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use tracing::info;
use uuid::Uuid;

use crate::client::{HttpBackend, UserId};
use crate::db::LocalBackend;
use crate::session::Session;

/// Demo account used until authentication exists
pub const DEFAULT_USER_ID: &str = "763b9c95-4bae-4044-9d30-7ae513286b37";
pub const DEFAULT_DB_PATH: &str = "titanlift.db";

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// TitanLift API root, e.g. http://localhost:3000/api (uses the local database when unset)
    #[arg(long, global = true, env = "TITANLIFT_API_URL")]
    pub api_url: Option<String>,

    /// SQLite database for offline use
    #[arg(long = "db", global = true, env = "TITANLIFT_DB", default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// User the session acts for
    #[arg(long = "user", global = true, env = "TITANLIFT_USER_ID", default_value = DEFAULT_USER_ID)]
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Http { base_url: String },
    Local { db_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
    pub user_id: UserId,
}

impl Config {
    pub fn from_args(args: ConfigArgs) -> Result<Self> {
        let backend = match args.api_url.map(|url| url.trim().to_string()) {
            Some(url) if url.is_empty() => bail!("api url is empty"),
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                bail!("api url must start with http:// or https://, got {}", url)
            }
            Some(base_url) => BackendKind::Http { base_url },
            None => BackendKind::Local { db_path: args.db_path },
        };
        Ok(Self { backend, user_id: args.user_id })
    }

    /// Build a session over the configured backend
    pub fn open_session(&self) -> Result<Session> {
        let session = match &self.backend {
            BackendKind::Http { base_url } => {
                info!("using TitanLift API at {}", base_url);
                Session::with_backend(self.user_id, Arc::new(HttpBackend::new(base_url.as_str())))
            }
            BackendKind::Local { db_path } => {
                info!("using local database {}", db_path);
                Session::with_backend(self.user_id, Arc::new(LocalBackend::open(db_path)?))
            }
        };
        Ok(session)
    }
}
