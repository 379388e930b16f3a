use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub fcm: FcmConfig,
    pub apns: ApnsSettings,
    pub dispatch: DispatchConfig,
    pub worker: WorkerConfig,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct FcmConfig {
    pub api_key: Option<String>,
    /// Gateway URL override; the public FCM endpoint when unset
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ApnsSettings {
    pub certificate_file: Option<String>,
    pub certificate_passphrase: Option<String>,
    pub bundle_id: Option<String>,
    pub sandbox: bool,
}

impl std::fmt::Debug for ApnsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsSettings")
            .field("certificate_file", &self.certificate_file)
            .field(
                "certificate_passphrase",
                &self.certificate_passphrase.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bundle_id", &self.bundle_id)
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Devices per scheduled batch (default: 1000)
    pub batch_size: usize,
    /// Bound on a single provider send (default: 10s)
    pub send_timeout: Duration,
    /// Age after which sent notifications are purged; retention refuses to run without it
    pub notification_max_age: Option<chrono::Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            send_timeout: Duration::from_secs(10),
            notification_max_age: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub sweep_interval: Duration,
    pub retention_interval: Duration,
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            retention_interval: Duration::from_secs(3600),
            concurrency: 32,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = match optional("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let batch_size: usize = parse_or("PUSH_BATCH_SIZE", 1000)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PUSH_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let max_age_days: Option<i64> = match optional("PUSH_NOTIFICATION_MAX_AGE_DAYS") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PUSH_NOTIFICATION_MAX_AGE_DAYS",
                value: raw,
            })?),
            None => None,
        };

        Ok(Config {
            database,
            fcm: FcmConfig {
                api_key: optional("PUSH_FCM_API_KEY"),
                endpoint: optional("PUSH_FCM_ENDPOINT"),
            },
            apns: ApnsSettings {
                certificate_file: optional("PUSH_APNS_CERTIFICATE_FILE"),
                certificate_passphrase: optional("PUSH_APNS_CERTIFICATE_PASSPHRASE"),
                bundle_id: optional("PUSH_APNS_BUNDLE_ID"),
                sandbox: parse_or("PUSH_APNS_SANDBOX", false)?,
            },
            dispatch: DispatchConfig {
                batch_size,
                send_timeout: Duration::from_secs(parse_or("PUSH_SEND_TIMEOUT_SECS", 10)?),
                notification_max_age: max_age_days.map(chrono::Duration::days),
            },
            worker: WorkerConfig {
                sweep_interval: Duration::from_secs(parse_or("PUSH_SWEEP_INTERVAL_SECS", 60)?),
                retention_interval: Duration::from_secs(parse_or(
                    "PUSH_RETENTION_INTERVAL_SECS",
                    3600,
                )?),
                concurrency: parse_or("PUSH_WORKER_CONCURRENCY", 32)?,
            },
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}
