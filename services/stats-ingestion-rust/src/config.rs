//! Environment configuration.
//!
//! Secrets come from environment variables, falling back to Docker secret
//! files under `/run/secrets` when the variable is absent.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::Path;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.sportsgameodds.com/v1";
pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

#[derive(Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub provider_api_key: Option<String>,
    pub provider_base_url: String,
    pub requests_per_minute: u32,
    pub redis_url: Option<String>,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok(), Path::new(DEFAULT_SECRETS_DIR))
    }

    /// Builds the config from any variable lookup. `secrets_dir` holds the
    /// fallback secret files.
    pub fn from_lookup<F>(var: F, secrets_dir: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = secret(&var, "DATABASE_URL", &secrets_dir.join("database_url"))?;

        let provider_api_key = secret(&var, "PROVIDER_API_KEY", &secrets_dir.join("provider_api_key"))?;
        if let Some(key) = &provider_api_key {
            reject_placeholder(key)?;
        }

        let redis_url = match var("REDIS_URL") {
            Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            _ => None,
        };

        Ok(Self {
            database_url,
            provider_api_key,
            provider_base_url: var("PROVIDER_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string()),
            requests_per_minute: parse_or(&var, "PROVIDER_REQUESTS_PER_MINUTE", 60)?,
            redis_url,
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow!("DATABASE_URL is not set and no database_url secret is mounted")
        })
    }

    pub fn provider_api_key(&self) -> Result<&str> {
        self.provider_api_key.as_deref().ok_or_else(|| {
            anyhow!("PROVIDER_API_KEY is not set and no provider_api_key secret is mounted")
        })
    }
}

/// Environment variable first, then the secret file. A variable that is set
/// but blank is an error rather than a silent fallback.
fn secret<F>(var: &F, name: &str, secret_path: &Path) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(v) if !v.trim().is_empty() => Ok(Some(v.trim().to_string())),
        Some(_) => Err(anyhow!("{} is set but empty", name)),
        None if secret_path.exists() => read_secret_file(secret_path, name).map(Some),
        None => Ok(None),
    }
}

fn read_secret_file(path: &Path, secret_name: &str) -> Result<String> {
    let value = std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Failed to read secret file {} ({})", path.display(), secret_name))?;
    if value.is_empty() {
        return Err(anyhow!("Secret file {} is empty", path.display()));
    }
    Ok(value)
}

fn reject_placeholder(key: &str) -> Result<()> {
    let lower = key.trim().to_lowercase();
    if lower.contains("change_me") || lower.contains("your_") || lower.starts_with("sample") {
        return Err(anyhow!(
            "PROVIDER_API_KEY appears to be a placeholder value; replace with your real key"
        ));
    }
    Ok(())
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", name, v, e)),
        _ => Ok(default),
    }
}
