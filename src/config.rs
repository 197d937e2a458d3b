//! Runtime configuration, read from flags with environment fallbacks.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Multi-account task manager", long_about = None)]
pub struct Config {
    /// SQLite connection string; the file is created if missing.
    #[arg(long, env = "TODO_DATABASE_URL", default_value = "sqlite://todo.db")]
    pub database_url: String,

    #[arg(long, env = "TODO_BIND", default_value = "127.0.0.1:5001")]
    pub bind: SocketAddr,

    /// Directory holding uploaded attachments.
    #[arg(long, env = "TODO_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Secret used to sign session cookies. A random key is generated when
    /// unset, which logs everyone out on restart.
    #[arg(long, env = "TODO_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "TODO_COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,

    /// Sessions expire after this many days without a request.
    #[arg(long, env = "TODO_SESSION_DAYS", default_value_t = 7)]
    pub session_days: i64,

    #[arg(long, env = "TODO_MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}
