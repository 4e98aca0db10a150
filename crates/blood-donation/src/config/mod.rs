use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::distance::FacilityAddress;

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
    pub maps: MapsConfig,
    pub schedule: ScheduleConfig,
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

        let maps = MapsConfig {
            api_key: optional_var("GOOGLE_MAPS_API_KEY"),
            facility: FacilityAddress {
                street: optional_var("FACILITY_STREET_ADDRESS"),
                district: optional_var("FACILITY_DISTRICT"),
                city: optional_var("FACILITY_CITY"),
                state: optional_var("FACILITY_STATE"),
            },
        };

        let schedule = ScheduleConfig {
            eligibility_scan_interval: Duration::from_secs(positive_var(
                "ELIGIBILITY_SCAN_INTERVAL_SECS",
                86_400,
            )?),
            verification_code_ttl_minutes: positive_var("VERIFICATION_CODE_TTL_MINUTES", 10)?,
            verification_sweep_interval: Duration::from_secs(positive_var(
                "VERIFICATION_SWEEP_INTERVAL_SECS",
                600,
            )?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            maps,
            schedule,
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Distance Matrix credentials and the facility donors travel to.
#[derive(Debug, Clone, Default)]
pub struct MapsConfig {
    pub api_key: Option<String>,
    pub facility: FacilityAddress,
}

/// Background task cadence and verification code lifetime.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub eligibility_scan_interval: Duration,
    pub verification_code_ttl_minutes: u64,
    pub verification_sweep_interval: Duration,
}

impl ScheduleConfig {
    pub fn verification_code_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.verification_code_ttl_minutes as i64)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive integer, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const KEYS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "GOOGLE_MAPS_API_KEY",
        "FACILITY_STREET_ADDRESS",
        "FACILITY_DISTRICT",
        "FACILITY_CITY",
        "FACILITY_STATE",
        "ELIGIBILITY_SCAN_INTERVAL_SECS",
        "VERIFICATION_CODE_TTL_MINUTES",
        "VERIFICATION_SWEEP_INTERVAL_SECS",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.maps.api_key, None);
        assert_eq!(
            config.schedule.eligibility_scan_interval,
            Duration::from_secs(86_400)
        );
        assert_eq!(config.schedule.verification_code_ttl(), chrono::Duration::minutes(10));
        assert_eq!(
            config.schedule.verification_sweep_interval,
            Duration::from_secs(600)
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_maps_and_facility_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GOOGLE_MAPS_API_KEY", " maps-key ");
        env::set_var("FACILITY_STREET_ADDRESS", "201B Nguyen Chi Thanh");
        env::set_var("FACILITY_CITY", "Ho Chi Minh City");
        env::set_var("FACILITY_STATE", "");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.maps.api_key.as_deref(), Some("maps-key"));
        assert_eq!(
            config.maps.facility.formatted(),
            "201B Nguyen Chi Thanh, Ho Chi Minh City"
        );
        reset_env();
    }

    #[test]
    fn rejects_non_positive_intervals() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VERIFICATION_SWEEP_INTERVAL_SECS", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key, value }) => {
                assert_eq!(key, "VERIFICATION_SWEEP_INTERVAL_SECS");
                assert_eq!(value, "0");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }
}
