use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::enrollment::window::{
    DEFAULT_HOLIDAY_CAMP_WINDOW_DAYS, DEFAULT_WEEKEND_CLUB_WINDOW_DAYS,
};

pub const DEFAULT_ARCHIVE_RETRY_ATTEMPTS: u8 = 2;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub enrollment: EnrollmentSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            enrollment: EnrollmentSettings::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Policy dials for the enrollment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentSettings {
    pub weekend_club_window_days: i64,
    pub holiday_camp_window_days: i64,
    /// Extra attempts for an occupant whose completion hit a transient storage failure.
    pub archive_retry_attempts: u8,
}

impl EnrollmentSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            weekend_club_window_days: parse_window(
                "APP_WEEKEND_CLUB_WINDOW_DAYS",
                defaults.weekend_club_window_days,
            )?,
            holiday_camp_window_days: parse_window(
                "APP_HOLIDAY_CAMP_WINDOW_DAYS",
                defaults.holiday_camp_window_days,
            )?,
            archive_retry_attempts: match env::var("APP_ARCHIVE_RETRY_ATTEMPTS") {
                Ok(raw) => raw
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| ConfigError::InvalidSetting {
                        key: "APP_ARCHIVE_RETRY_ATTEMPTS",
                    })?,
                Err(_) => defaults.archive_retry_attempts,
            },
        })
    }
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            weekend_club_window_days: DEFAULT_WEEKEND_CLUB_WINDOW_DAYS,
            holiday_camp_window_days: DEFAULT_HOLIDAY_CAMP_WINDOW_DAYS,
            archive_retry_attempts: DEFAULT_ARCHIVE_RETRY_ATTEMPTS,
        }
    }
}

fn parse_window(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<i64>() {
        Ok(days) if days >= 0 => Ok(days),
        _ => Err(ConfigError::InvalidSetting { key }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSetting { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSetting { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidSetting { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
