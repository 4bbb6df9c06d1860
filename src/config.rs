//! Runtime configuration, read from the environment (`.env` is loaded by the
//! binaries through dotenvy before this runs).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    /// Root for uploaded files; avatars land in `<public_dir>/avatars`.
    pub public_dir: PathBuf,
    pub token_secret: String,
    pub refresh_secret: String,
    pub token_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
    pub allow_registration: bool,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = match get("HOST") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "HOST", value: v })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };
        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?,
            None => 3000,
        };
        let token_ttl = match get("AUTH_EXPIRATION") {
            Some(v) => parse_duration(&v).ok_or(ConfigError::Invalid { key: "AUTH_EXPIRATION", value: v })?,
            None => Duration::from_secs(24 * 60 * 60),
        };
        let refresh_ttl = match get("REFRESH_TOKEN_EXPIRATION") {
            Some(v) => parse_duration(&v).ok_or(ConfigError::Invalid {
                key: "REFRESH_TOKEN_EXPIRATION",
                value: v,
            })?,
            None => Duration::from_secs(30 * 24 * 60 * 60),
        };
        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(v) => match v.parse::<u32>() {
                Ok(cost) if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) => cost,
                _ => return Err(ConfigError::Invalid { key: "BCRYPT_COST", value: v }),
            },
            None => 10,
        };
        let allow_registration = match get("ALLOW_REGISTRATION") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid { key: "ALLOW_REGISTRATION", value: v })?,
            None => false,
        };
        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            db_path: get("DB_PATH").unwrap_or_else(|| "pmbook_data".to_string()).into(),
            public_dir: get("PUBLIC_DIR").unwrap_or_else(|| "public".to_string()).into(),
            token_secret: get("SECRET").ok_or(ConfigError::Missing("SECRET"))?,
            refresh_secret: get("REFRESH_TOKEN_SECRET").ok_or(ConfigError::Missing("REFRESH_TOKEN_SECRET"))?,
            token_ttl,
            refresh_ttl,
            bcrypt_cost,
            allow_registration,
            log_format,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.public_dir.join("avatars")
    }
}

/// Accepts plain seconds (`3600`) or a number with an `s`/`m`/`h`/`d` suffix (`1d`).
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&raw[..i], c),
        _ => (raw, 's'),
    };
    let n: u64 = digits.trim().parse().ok()?;
    let secs = match unit {
        's' => n,
        'm' => n.checked_mul(60)?,
        'h' => n.checked_mul(60 * 60)?,
        'd' => n.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
