use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Runtime settings for the relay, read from the environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the Ollama server, without a trailing slash.
    pub backend_url: String,
    pub static_dir: PathBuf,
    pub connect_timeout: Duration,
    /// Applies to the response headers and to every body chunk.
    pub read_timeout: Duration,
    /// Fragments queued between a session pump and its client.
    pub channel_capacity: usize,
    /// Largest partial NDJSON line the decoder will hold.
    pub max_frame_bytes: usize,
    /// Permissive CORS, for a UI dev server on another origin.
    pub cors_enabled: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            backend_url: "http://localhost:11434".to_string(),
            static_dir: PathBuf::from("./dist"),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
            channel_capacity: 32,
            max_frame_bytes: 1024 * 1024,
            cors_enabled: true,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend_url = lookup("OLLAMA_URL")
            .unwrap_or(defaults.backend_url)
            .trim_end_matches('/')
            .to_string();
        if backend_url.is_empty() {
            bail!("OLLAMA_URL must not be empty");
        }

        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            backend_url,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            read_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_READ_TIMEOUT_SECS",
                defaults.read_timeout.as_secs(),
            )?),
            channel_capacity: parse_or(&lookup, "RELAY_CHANNEL_CAPACITY", defaults.channel_capacity)?,
            max_frame_bytes: parse_or(&lookup, "RELAY_MAX_FRAME_BYTES", defaults.max_frame_bytes)?,
            cors_enabled: parse_or(&lookup, "RELAY_CORS", defaults.cors_enabled)?,
        };

        if config.connect_timeout.is_zero() || config.read_timeout.is_zero() {
            bail!("relay timeouts must be greater than zero");
        }
        if config.channel_capacity == 0 {
            bail!("RELAY_CHANNEL_CAPACITY must be greater than zero");
        }
        if config.max_frame_bytes == 0 {
            bail!("RELAY_MAX_FRAME_BYTES must be greater than zero");
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
