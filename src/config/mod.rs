use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::loan::PipelineRules;

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
    pub pipeline: PipelineRules,
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

        let pipeline = load_pipeline_rules()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
        })
    }
}

/// Business-rule overrides for the loan pipeline. Unset variables keep the
/// built-in defaults; a timeout of 0 seconds disables enforcement.
fn load_pipeline_rules() -> Result<PipelineRules, ConfigError> {
    let mut rules = PipelineRules::default();

    if let Ok(raw) = env::var("APP_MAX_DTI_RATIO") {
        let ratio = raw
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidDtiRatio)?;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ConfigError::InvalidDtiRatio);
        }
        rules.max_dti_ratio = ratio;
    }

    if let Ok(raw) = env::var("APP_HARD_SCORE_FLOOR") {
        rules.hard_score_floor = raw.parse::<u16>().map_err(|_| ConfigError::InvalidScoreFloor {
            var: "APP_HARD_SCORE_FLOOR",
        })?;
    }

    if let Ok(raw) = env::var("APP_SOFT_SCORE_FLOOR") {
        rules.soft_score_floor = raw.parse::<u16>().map_err(|_| ConfigError::InvalidScoreFloor {
            var: "APP_SOFT_SCORE_FLOOR",
        })?;
    }

    if rules.hard_score_floor > rules.soft_score_floor {
        return Err(ConfigError::FloorsOutOfOrder);
    }

    rules.stage_timeout = load_timeout("APP_STAGE_TIMEOUT_SECS", rules.stage_timeout)?;
    rules.pipeline_timeout = load_timeout("APP_PIPELINE_TIMEOUT_SECS", rules.pipeline_timeout)?;

    Ok(rules)
}

fn load_timeout(
    var: &'static str,
    default: Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    match env::var(var) {
        Ok(raw) => {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout { var })?;
            Ok((secs > 0).then(|| Duration::from_secs(secs)))
        }
        Err(_) => Ok(default),
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
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDtiRatio,
    InvalidScoreFloor { var: &'static str },
    FloorsOutOfOrder,
    InvalidTimeout { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDtiRatio => {
                write!(f, "APP_MAX_DTI_RATIO must be a positive fraction")
            }
            ConfigError::InvalidScoreFloor { var } => {
                write!(f, "{var} must be a valid credit score")
            }
            ConfigError::FloorsOutOfOrder => write!(
                f,
                "APP_HARD_SCORE_FLOOR must not exceed APP_SOFT_SCORE_FLOOR"
            ),
            ConfigError::InvalidTimeout { var } => {
                write!(f, "{var} must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
