// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::bundle::BundleSettings;

/// Default upload limit for answer PDFs (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub bundle: BundleSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = rust_log_from_env();

        let cors_origins = parse_list(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        );

        let defaults = BundleSettings::default();
        let bundle = BundleSettings {
            qr_module_px: env_or("BUNDLE_QR_MODULE_PX", defaults.qr_module_px),
            chunk_bytes: env_or("BUNDLE_CHUNK_BYTES", defaults.chunk_bytes),
            channel_capacity: env_or("BUNDLE_CHANNEL_CAPACITY", defaults.channel_capacity),
            student_timeout: env_secs("BUNDLE_STUDENT_TIMEOUT_SECS"),
            total_timeout: env_secs("BUNDLE_TOTAL_TIMEOUT_SECS"),
        };

        Self {
            database_url,
            jwt_secret,
            rust_log,
            port: env_or("PORT", 5000),
            cors_origins,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            bundle,
        }
    }
}

/// Log filter from `RUST_LOG`, readable before the rest of the config so that
/// tracing is up when the optional values are parsed.
pub fn rust_log_from_env() -> String {
    log_filter(env::var("RUST_LOG").ok())
}

fn log_filter(raw: Option<String>) -> String {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Reads and parses an optional variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    parse_secs(key, &raw)
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
            default
        }
    }
}

/// Zero or unparsable values disable the deadline.
fn parse_secs(key: &str, raw: &str) -> Option<Duration> {
    match parse_or::<u64>(key, raw, 0) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
