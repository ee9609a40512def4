use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// SQLite connection url
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://database/dsaforge.db")]
    pub database_url: String,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "DSAForge REST API server", long_about = None)]
pub struct ServerArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(short, long, env = "PORT", default_value_t = 5001)]
    pub port: u16,
    /// Secret used to sign bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
    /// Bearer token lifetime, at most ten years
    #[arg(
        long,
        env = "TOKEN_TTL_DAYS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=3650)
    )]
    pub token_ttl_days: i64,
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,
    /// Write logs to a daily rotated file in this directory instead of stdout
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    /// Built client bundle to serve for non-API paths
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServerArgs {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }

    pub fn token_ttl(&self) -> time::Duration {
        time::Duration::days(self.token_ttl_days)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
