use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::recognition::MatcherSettings;
use crate::recognition::matcher::DEFAULT_THRESHOLD;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_identify_per_min: u32,

    // Feature extractor
    pub extractor_url: String,
    pub extractor_timeout_ms: u64,
    pub extractor_concurrency: usize,
    pub match_threshold: f32,

    // Object store
    pub object_store_url: String,
    pub object_store_token: String,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_identify_per_min: or_default("RATE_IDENTIFY_PER_MIN", 120)?,

            extractor_url: required("EXTRACTOR_URL")?,
            extractor_timeout_ms: or_default("EXTRACTOR_TIMEOUT_MS", 5000)?, // 5s per image
            extractor_concurrency: or_default("EXTRACTOR_CONCURRENCY", 4)?,
            match_threshold: or_default("MATCH_THRESHOLD", DEFAULT_THRESHOLD)?,

            object_store_url: required("OBJECT_STORE_URL")?,
            object_store_token: env::var("OBJECT_STORE_TOKEN").unwrap_or_default(),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: or_default("LOG_LEVEL", tracing::Level::DEBUG)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 2.0) {
            bail!("MATCH_THRESHOLD must be in (0, 2], got {}", self.match_threshold);
        }
        if self.extractor_concurrency == 0 {
            bail!("EXTRACTOR_CONCURRENCY must be at least 1");
        }
        if self.extractor_timeout_ms == 0 {
            bail!("EXTRACTOR_TIMEOUT_MS must be positive");
        }
        Ok(())
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }

    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            threshold: self.match_threshold,
            timeout: self.extractor_timeout(),
            concurrency: self.extractor_concurrency,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "mysql://localhost/attendance".into(),
        jwt_secret: "test-secret".into(),
        server_addr: "127.0.0.1:8080".into(),
        api_prefix: "/api".into(),
        rate_protected_per_min: 1000,
        rate_identify_per_min: 120,
        extractor_url: "http://localhost:9000".into(),
        extractor_timeout_ms: 5000,
        extractor_concurrency: 4,
        match_threshold: DEFAULT_THRESHOLD,
        object_store_url: "http://localhost:9100".into(),
        object_store_token: String::new(),
        log_dir: "logs".into(),
        log_level: tracing::Level::DEBUG,
    }
}
