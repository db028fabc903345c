use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("TIMELINE_HOST", "0.0.0.0");
        let port: u16 = var("TIMELINE_PORT", "5000")
            .parse()
            .context("TIMELINE_PORT must be a port number")?;
        // IP literals (bare IPv6 included) or a resolvable hostname.
        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .with_context(|| format!("invalid TIMELINE_HOST {:?}", host))?
            .next()
            .with_context(|| format!("TIMELINE_HOST {:?} resolved to no address", host))?;

        let jwt_secret = lookup("TIMELINE_JWT_SECRET").unwrap_or_default();
        let allow_dev = lookup("TIMELINE_ALLOW_DEV_SECRET").is_some_and(|v| v == "1");
        if jwt_secret.is_empty() {
            bail!("TIMELINE_JWT_SECRET is unset");
        }
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) && !allow_dev {
            bail!(
                "TIMELINE_JWT_SECRET is still a placeholder; set a random value \
                 or TIMELINE_ALLOW_DEV_SECRET=1 for local development"
            );
        }

        Ok(Self {
            addr,
            db_path: var("TIMELINE_DB_PATH", "timeline.db").into(),
            upload_dir: var("TIMELINE_UPLOAD_DIR", "./uploads").into(),
            jwt_secret,
        })
    }
}
