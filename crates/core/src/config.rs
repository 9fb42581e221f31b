use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::{ScoringWeights, DEFAULT_TOP_K, DEFAULT_WEIGHTS, MIN_RECOMMENDATION_SCORE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub scoring: ScoringConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    /// Bearer token for runtimes served behind an authenticating proxy.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Extra attempts after a `Timeout` or `EmptyResponse`. Other failures are never retried.
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub min_score: f64,
}

#[derive(Clone, Debug)]
pub struct OrchestrationConfig {
    pub top_k: usize,
    pub prompt_item_cap: usize,
    pub similar_limit: usize,
    pub complementary_limit: usize,
    pub similar_customer_limit: usize,
    pub concurrent_dispatch: bool,
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
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub top_k: Option<usize>,
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
                url: "sqlite://smartshop.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                api_key: None,
                model: "qwen2.5:0.5b".to_string(),
                temperature: 0.7,
                max_tokens: 1024,
                timeout_secs: 30,
                max_retries: 0,
            },
            scoring: ScoringConfig {
                weights: DEFAULT_WEIGHTS,
                min_score: MIN_RECOMMENDATION_SCORE,
            },
            orchestration: OrchestrationConfig {
                top_k: DEFAULT_TOP_K,
                prompt_item_cap: 20,
                similar_limit: 5,
                complementary_limit: 5,
                similar_customer_limit: 5,
                concurrent_dispatch: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("smartshop.toml"));
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

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(scoring) = patch.scoring {
            if let Some(category_weight) = scoring.category_weight {
                self.scoring.weights.category = category_weight;
            }
            if let Some(price_weight) = scoring.price_weight {
                self.scoring.weights.price_band = price_weight;
            }
            if let Some(rating_weight) = scoring.rating_weight {
                self.scoring.weights.rating = rating_weight;
            }
            if let Some(context_bonus) = scoring.context_bonus {
                self.scoring.weights.context_bonus = context_bonus;
            }
            if let Some(min_score) = scoring.min_score {
                self.scoring.min_score = min_score;
            }
        }

        if let Some(orchestration) = patch.orchestration {
            if let Some(top_k) = orchestration.top_k {
                self.orchestration.top_k = top_k;
            }
            if let Some(prompt_item_cap) = orchestration.prompt_item_cap {
                self.orchestration.prompt_item_cap = prompt_item_cap;
            }
            if let Some(similar_limit) = orchestration.similar_limit {
                self.orchestration.similar_limit = similar_limit;
            }
            if let Some(complementary_limit) = orchestration.complementary_limit {
                self.orchestration.complementary_limit = complementary_limit;
            }
            if let Some(similar_customer_limit) = orchestration.similar_customer_limit {
                self.orchestration.similar_customer_limit = similar_customer_limit;
            }
            if let Some(concurrent_dispatch) = orchestration.concurrent_dispatch {
                self.orchestration.concurrent_dispatch = concurrent_dispatch;
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
        if let Some(value) = read_env("SMARTSHOP_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SMARTSHOP_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SMARTSHOP_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SMARTSHOP_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SMARTSHOP_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("SMARTSHOP_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("SMARTSHOP_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SMARTSHOP_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SMARTSHOP_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SMARTSHOP_SCORING_MIN_SCORE") {
            self.scoring.min_score = parse_f64("SMARTSHOP_SCORING_MIN_SCORE", &value)?;
        }

        if let Some(value) = read_env("SMARTSHOP_ORCHESTRATION_TOP_K") {
            self.orchestration.top_k = parse_usize("SMARTSHOP_ORCHESTRATION_TOP_K", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_ORCHESTRATION_PROMPT_ITEM_CAP") {
            self.orchestration.prompt_item_cap =
                parse_usize("SMARTSHOP_ORCHESTRATION_PROMPT_ITEM_CAP", &value)?;
        }
        if let Some(value) = read_env("SMARTSHOP_ORCHESTRATION_CONCURRENT_DISPATCH") {
            self.orchestration.concurrent_dispatch =
                parse_bool("SMARTSHOP_ORCHESTRATION_CONCURRENT_DISPATCH", &value)?;
        }

        let log_level =
            read_env("SMARTSHOP_LOGGING_LEVEL").or_else(|| read_env("SMARTSHOP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SMARTSHOP_LOGGING_FORMAT").or_else(|| read_env("SMARTSHOP_LOG_FORMAT"));
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
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(top_k) = overrides.top_k {
            self.orchestration.top_k = top_k;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_scoring(&self.scoring)?;
        validate_orchestration(&self.orchestration)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("smartshop.toml"), PathBuf::from("config/smartshop.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(api_key) = &llm.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key must not be blank when set".to_string(),
            ));
        }
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
    }

    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    let weights = [
        ("scoring.category_weight", scoring.weights.category),
        ("scoring.price_weight", scoring.weights.price_band),
        ("scoring.rating_weight", scoring.weights.rating),
        ("scoring.context_bonus", scoring.weights.context_bonus),
        ("scoring.min_score", scoring.min_score),
    ];
    for (key, value) in weights {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=1.0")));
        }
    }

    Ok(())
}

fn validate_orchestration(orchestration: &OrchestrationConfig) -> Result<(), ConfigError> {
    if orchestration.top_k == 0 {
        return Err(ConfigError::Validation(
            "orchestration.top_k must be greater than zero".to_string(),
        ));
    }

    if orchestration.prompt_item_cap < orchestration.top_k {
        return Err(ConfigError::Validation(
            "orchestration.prompt_item_cap must be at least orchestration.top_k".to_string(),
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

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    scoring: Option<ScoringPatch>,
    orchestration: Option<OrchestrationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    category_weight: Option<f64>,
    price_weight: Option<f64>,
    rating_weight: Option<f64>,
    context_bonus: Option<f64>,
    min_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestrationPatch {
    top_k: Option<usize>,
    prompt_item_cap: Option<usize>,
    similar_limit: Option<usize>,
    complementary_limit: Option<usize>,
    similar_customer_limit: Option<usize>,
    concurrent_dispatch: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
