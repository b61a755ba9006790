use dotenv::dotenv;
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub validation: ValidationConfig,
    pub rating: RatingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Knobs for the dispute window, reporting and the background processor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationConfig {
    pub dispute_window_hours: i64,
    pub dispute_threshold: u32,
    pub processing_interval_secs: u64,
    pub batch_size_limit: usize,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub max_consecutive_failures: u32,
    pub error_log_capacity: usize,
    /// How long past its deadline an unresolvable match may linger before it expires.
    pub expiry_grace_hours: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            dispute_window_hours: 24,
            dispute_threshold: 2,
            processing_interval_secs: 300, // 5 minutes
            batch_size_limit: 50,
            max_retry_attempts: 3,
            retry_base_delay_ms: 1000,
            max_consecutive_failures: 5,
            error_log_capacity: 20,
            expiry_grace_hours: 168, // 7 days
        }
    }
}

impl ValidationConfig {
    pub fn dispute_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.dispute_window_hours)
    }

    pub fn expiry_grace(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiry_grace_hours)
    }

    pub fn processing_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.processing_interval_secs)
    }

    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn retry_delay(&self, attempt: u32) -> std::time::Duration {
        let factor = 2u64.saturating_pow(attempt);
        std::time::Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.dispute_window_hours <= 0 {
            return Err("Dispute window must be at least one hour".into());
        }
        if self.dispute_threshold == 0 {
            return Err("Dispute threshold cannot be 0".into());
        }
        if self.processing_interval_secs == 0 {
            return Err("Processing interval cannot be 0".into());
        }
        if self.batch_size_limit == 0 {
            return Err("Batch size limit cannot be 0".into());
        }
        if self.max_consecutive_failures == 0 {
            return Err("Consecutive failure cap cannot be 0".into());
        }
        if self.error_log_capacity == 0 {
            return Err("Error log capacity cannot be 0".into());
        }
        if self.expiry_grace_hours < 0 {
            return Err("Expiry grace cannot be negative".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RatingConfig {
    pub tau: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self { tau: 0.5 }
    }
}

fn parse_or<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {}={:?}, using default", key, raw);
                default
            }
        },
        None => default,
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // ENV_FILE_PATH overrides the usual .env / .env.<environment> lookup
        match env::var("ENV_FILE_PATH") {
            Ok(path) if !path.is_empty() => {
                info!("Loading environment from ENV_FILE_PATH: {}", path);
                dotenv::from_filename(&path).ok();
            }
            _ => {
                dotenv().ok();
                let hint: Environment = env::var("RUST_ENV")
                    .unwrap_or_else(|_| "development".to_string())
                    .parse()
                    .unwrap_or_default();
                let env_file = format!(".env.{:?}", hint).to_lowercase();
                if env_file != ".env.development" {
                    let _ = dotenv::from_filename(&env_file);
                }
            }
        }

        let environment = env::var("RUST_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()
            .unwrap_or_default();

        info!("Loading configuration for environment: {:?}", environment);

        let config = Self::from_lookup(environment, &|key| env::var(key).ok())?;
        config.log_configuration();
        Ok(config)
    }

    /// Builds and validates a configuration from an arbitrary key lookup.
    pub fn from_lookup(
        environment: Environment,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = ValidationConfig::default();
        let default_workers = match environment {
            Environment::Production => 8,
            Environment::Development | Environment::Test => 1,
        };

        let config = Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(lookup, "SERVER_PORT", 50003),
                workers: parse_or(lookup, "BACKEND_WORKERS", default_workers),
            },
            validation: ValidationConfig {
                dispute_window_hours: parse_or(lookup, "DISPUTE_WINDOW_HOURS", defaults.dispute_window_hours),
                dispute_threshold: parse_or(lookup, "DISPUTE_THRESHOLD", defaults.dispute_threshold),
                processing_interval_secs: parse_or(lookup, "PROCESSING_INTERVAL_SECS", defaults.processing_interval_secs),
                batch_size_limit: parse_or(lookup, "BATCH_SIZE_LIMIT", defaults.batch_size_limit),
                max_retry_attempts: parse_or(lookup, "MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts),
                retry_base_delay_ms: parse_or(lookup, "RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
                max_consecutive_failures: parse_or(lookup, "MAX_CONSECUTIVE_FAILURES", defaults.max_consecutive_failures),
                error_log_capacity: parse_or(lookup, "ERROR_LOG_CAPACITY", defaults.error_log_capacity),
                expiry_grace_hours: parse_or(lookup, "EXPIRY_GRACE_HOURS", defaults.expiry_grace_hours),
            },
            rating: RatingConfig {
                tau: parse_or(lookup, "GLICKO_TAU", RatingConfig::default().tau),
            },
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".into());
        }
        if self.server.workers == 0 {
            return Err("Worker count cannot be 0".into());
        }
        if !(self.rating.tau > 0.0) {
            return Err("Glicko tau must be positive".into());
        }
        self.validation.validate()
    }

    fn log_configuration(&self) {
        info!("Configuration loaded successfully");
        info!("Environment: {:?}", self.environment);
        info!("Server: {}:{} (workers: {})", self.server.host, self.server.port, self.server.workers);
        info!(
            "Validation: window {}h, dispute threshold {}, every {}s, batch {}",
            self.validation.dispute_window_hours,
            self.validation.dispute_threshold,
            self.validation.processing_interval_secs,
            self.validation.batch_size_limit
        );
        info!(
            "Retries: {} attempts from {}ms, suspend after {} failed runs",
            self.validation.max_retry_attempts,
            self.validation.retry_base_delay_ms,
            self.validation.max_consecutive_failures
        );

        if self.environment == Environment::Development {
            warn!("Running in development mode - stores are in-memory only");
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
