use serde::Deserialize;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::str::FromStr;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

pub const DEFAULT_TOP_N: usize = 7;
pub const DEFAULT_CACHE_CAPACITY: u64 = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub cache_capacity: u64,
    pub default_top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_file_size: default_max_file_size(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Config {
            bind_addr: parse_var(&lookup, "MIGRATION_LENS_ADDR")?.unwrap_or(defaults.bind_addr),
            max_file_size: parse_var(&lookup, "MIGRATION_LENS_MAX_FILE_SIZE")?
                .unwrap_or(defaults.max_file_size),
            cache_capacity: parse_var(&lookup, "MIGRATION_LENS_CACHE_CAPACITY")?
                .unwrap_or(defaults.cache_capacity),
            default_top_n: parse_var(&lookup, "MIGRATION_LENS_TOP_N")?
                .unwrap_or(defaults.default_top_n),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        None => Ok(None),
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::info!(
        "Configuration loaded: addr={}, max_file_size={}B, cache_capacity={}, top_n={}",
        config.bind_addr,
        config.max_file_size,
        config.cache_capacity,
        config.default_top_n
    );
    Ok(config)
}
