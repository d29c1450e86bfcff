use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const MAX_DEADLINE_HEADROOM: Duration = Duration::from_secs(5);

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    /// Key for signing download URLs. Random per process when not configured.
    pub session_secret: String,
    pub session_secret_generated: bool,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: u64,
    pub request_timeout: Duration,
    pub llm_timeout: Duration,
    pub llm_max_attempts: u32,
    pub download_ttl: Duration,
    /// Root for request workspaces and parked downloads.
    pub scratch_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let anthropic_api_key = lookup("ANTHROPIC_API_KEY").with_context(|| {
            "Required environment variable 'ANTHROPIC_API_KEY' is not set; \
             the formatter cannot reach the AI service without it"
        })?;

        let (session_secret, session_secret_generated) =
            match lookup("SESSION_SECRET").or_else(|| lookup("FLASK_SECRET_KEY")) {
                Some(secret) => (secret, false),
                None => (
                    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
                    true,
                ),
            };

        let llm_max_attempts: u32 = parse_or(&lookup, "LLM_MAX_ATTEMPTS", 2)?;
        if !(1..=5).contains(&llm_max_attempts) {
            bail!("LLM_MAX_ATTEMPTS must be between 1 and 5, got {llm_max_attempts}");
        }

        let max_upload_bytes: u64 = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }

        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120)?);
        if request_timeout.is_zero() {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            anthropic_api_key,
            anthropic_base_url: lookup("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            session_secret,
            session_secret_generated,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            max_upload_bytes,
            request_timeout,
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 110)?),
            llm_max_attempts,
            download_ttl: Duration::from_secs(parse_or(&lookup, "DOWNLOAD_TTL_SECS", 600)?),
            scratch_dir: lookup("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }

    /// Total budget for one AI formatting call, retries included. Always ends
    /// before `request_timeout`, so a slow model still yields an error body.
    pub fn llm_deadline(&self) -> Duration {
        let headroom = (self.request_timeout / 10).min(MAX_DEADLINE_HEADROOM);
        self.request_timeout.saturating_sub(headroom)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
