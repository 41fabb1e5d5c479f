use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub wait_secs: u64,
    pub visibility_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub sample_size: usize,
    pub call_timeout_secs: u64,
    pub verification_timeout_secs: u64,
    pub verification_poll_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub base_url: String,
    pub api_token: SecretString,
    pub sender: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub delivery_base_url: Option<String>,
    pub delivery_api_token: Option<String>,
    pub delivery_sender: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://dinely.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            queue: QueueConfig { batch_size: 10, wait_secs: 5, visibility_timeout_secs: 60 },
            worker: WorkerConfig {
                sample_size: 5,
                call_timeout_secs: 10,
                verification_timeout_secs: 120,
                verification_poll_secs: 5,
            },
            delivery: DeliveryConfig {
                base_url: "https://email.us-east-1.amazonaws.com".to_string(),
                api_token: String::new().into(),
                sender: "concierge@dinely.app".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dinely.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(queue) = patch.queue {
            if let Some(batch_size) = queue.batch_size {
                self.queue.batch_size = batch_size;
            }
            if let Some(wait_secs) = queue.wait_secs {
                self.queue.wait_secs = wait_secs;
            }
            if let Some(visibility_timeout_secs) = queue.visibility_timeout_secs {
                self.queue.visibility_timeout_secs = visibility_timeout_secs;
            }
        }

        if let Some(worker) = patch.worker {
            if let Some(sample_size) = worker.sample_size {
                self.worker.sample_size = sample_size;
            }
            if let Some(call_timeout_secs) = worker.call_timeout_secs {
                self.worker.call_timeout_secs = call_timeout_secs;
            }
            if let Some(verification_timeout_secs) = worker.verification_timeout_secs {
                self.worker.verification_timeout_secs = verification_timeout_secs;
            }
            if let Some(verification_poll_secs) = worker.verification_poll_secs {
                self.worker.verification_poll_secs = verification_poll_secs;
            }
        }

        if let Some(delivery) = patch.delivery {
            if let Some(base_url) = delivery.base_url {
                self.delivery.base_url = base_url;
            }
            if let Some(api_token_value) = delivery.api_token {
                self.delivery.api_token = secret_value(api_token_value);
            }
            if let Some(sender) = delivery.sender {
                self.delivery.sender = sender;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DINELY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DINELY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DINELY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DINELY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DINELY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DINELY_QUEUE_BATCH_SIZE") {
            self.queue.batch_size = parse_usize("DINELY_QUEUE_BATCH_SIZE", &value)?;
        }
        if let Some(value) = read_env("DINELY_QUEUE_WAIT_SECS") {
            self.queue.wait_secs = parse_u64("DINELY_QUEUE_WAIT_SECS", &value)?;
        }
        if let Some(value) = read_env("DINELY_QUEUE_VISIBILITY_TIMEOUT_SECS") {
            self.queue.visibility_timeout_secs =
                parse_u64("DINELY_QUEUE_VISIBILITY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DINELY_WORKER_SAMPLE_SIZE") {
            self.worker.sample_size = parse_usize("DINELY_WORKER_SAMPLE_SIZE", &value)?;
        }
        if let Some(value) = read_env("DINELY_WORKER_CALL_TIMEOUT_SECS") {
            self.worker.call_timeout_secs = parse_u64("DINELY_WORKER_CALL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DINELY_WORKER_VERIFICATION_TIMEOUT_SECS") {
            self.worker.verification_timeout_secs =
                parse_u64("DINELY_WORKER_VERIFICATION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DINELY_WORKER_VERIFICATION_POLL_SECS") {
            self.worker.verification_poll_secs =
                parse_u64("DINELY_WORKER_VERIFICATION_POLL_SECS", &value)?;
        }

        if let Some(value) = read_env("DINELY_DELIVERY_BASE_URL") {
            self.delivery.base_url = value;
        }
        if let Some(value) = read_env("DINELY_DELIVERY_API_TOKEN") {
            self.delivery.api_token = secret_value(value);
        }
        if let Some(value) = read_env("DINELY_DELIVERY_SENDER") {
            self.delivery.sender = value;
        }

        if let Some(value) = read_env("DINELY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DINELY_SERVER_PORT") {
            self.server.port = parse_u16("DINELY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DINELY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DINELY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("DINELY_LOGGING_LEVEL").or_else(|| read_env("DINELY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DINELY_LOGGING_FORMAT").or_else(|| read_env("DINELY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.delivery_base_url {
            self.delivery.base_url = base_url;
        }
        if let Some(api_token) = overrides.delivery_api_token {
            self.delivery.api_token = secret_value(api_token);
        }
        if let Some(sender) = overrides.delivery_sender {
            self.delivery.sender = sender;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_queue(&self.queue)?;
        validate_worker(&self.worker)?;
        validate_delivery(&self.delivery)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dinely.toml"), PathBuf::from("config/dinely.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_queue(queue: &QueueConfig) -> Result<(), ConfigError> {
    if queue.batch_size == 0 || queue.batch_size > 10 {
        return Err(ConfigError::Validation(
            "queue.batch_size must be in range 1..=10".to_string(),
        ));
    }

    if queue.visibility_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "queue.visibility_timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_worker(worker: &WorkerConfig) -> Result<(), ConfigError> {
    if worker.sample_size == 0 {
        return Err(ConfigError::Validation(
            "worker.sample_size must be greater than zero".to_string(),
        ));
    }

    if worker.call_timeout_secs == 0 || worker.call_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "worker.call_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if worker.verification_poll_secs == 0
        || worker.verification_poll_secs > worker.verification_timeout_secs
    {
        return Err(ConfigError::Validation(
            "worker.verification_poll_secs must be nonzero and no larger than the verification timeout"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_delivery(delivery: &DeliveryConfig) -> Result<(), ConfigError> {
    let base_url = delivery.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "delivery.base_url must start with http:// or https://".to_string(),
        ));
    }

    if delivery.api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "delivery.api_token is required to send suggestion emails".to_string(),
        ));
    }

    if !delivery.sender.contains('@') {
        return Err(ConfigError::Validation(
            "delivery.sender must be an email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    queue: Option<QueuePatch>,
    worker: Option<WorkerPatch>,
    delivery: Option<DeliveryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QueuePatch {
    batch_size: Option<usize>,
    wait_secs: Option<u64>,
    visibility_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkerPatch {
    sample_size: Option<usize>,
    call_timeout_secs: Option<u64>,
    verification_timeout_secs: Option<u64>,
    verification_poll_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    sender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
