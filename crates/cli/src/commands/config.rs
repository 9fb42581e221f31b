use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use smartshop_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let overridden = overridden_keys(&options);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let llm_api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let weights = config.scoring.weights;
    let fields: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "SMARTSHOP_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "SMARTSHOP_DATABASE_MAX_CONNECTIONS",
        ),
        ("database.timeout_secs", config.database.timeout_secs.to_string(), "SMARTSHOP_DATABASE_TIMEOUT_SECS"),
        ("llm.base_url", config.llm.base_url.clone(), "SMARTSHOP_LLM_BASE_URL"),
        ("llm.api_key", llm_api_key, "SMARTSHOP_LLM_API_KEY"),
        ("llm.model", config.llm.model.clone(), "SMARTSHOP_LLM_MODEL"),
        ("llm.temperature", config.llm.temperature.to_string(), "SMARTSHOP_LLM_TEMPERATURE"),
        ("llm.max_tokens", config.llm.max_tokens.to_string(), "SMARTSHOP_LLM_MAX_TOKENS"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "SMARTSHOP_LLM_TIMEOUT_SECS"),
        ("llm.max_retries", config.llm.max_retries.to_string(), "SMARTSHOP_LLM_MAX_RETRIES"),
        ("scoring.category_weight", weights.category.to_string(), ""),
        ("scoring.price_weight", weights.price_band.to_string(), ""),
        ("scoring.rating_weight", weights.rating.to_string(), ""),
        ("scoring.context_bonus", weights.context_bonus.to_string(), ""),
        ("scoring.min_score", config.scoring.min_score.to_string(), "SMARTSHOP_SCORING_MIN_SCORE"),
        ("orchestration.top_k", config.orchestration.top_k.to_string(), "SMARTSHOP_ORCHESTRATION_TOP_K"),
        (
            "orchestration.prompt_item_cap",
            config.orchestration.prompt_item_cap.to_string(),
            "SMARTSHOP_ORCHESTRATION_PROMPT_ITEM_CAP",
        ),
        ("orchestration.similar_limit", config.orchestration.similar_limit.to_string(), ""),
        ("orchestration.complementary_limit", config.orchestration.complementary_limit.to_string(), ""),
        (
            "orchestration.similar_customer_limit",
            config.orchestration.similar_customer_limit.to_string(),
            "",
        ),
        (
            "orchestration.concurrent_dispatch",
            config.orchestration.concurrent_dispatch.to_string(),
            "SMARTSHOP_ORCHESTRATION_CONCURRENT_DISPATCH",
        ),
        ("logging.level", config.logging.level.clone(), "SMARTSHOP_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format).to_lowercase(), "SMARTSHOP_LOGGING_FORMAT"),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key, value, env_key) in fields {
        let source = if overridden.contains(&key) {
            "flag".to_string()
        } else {
            field_source(
                key,
                (!env_key.is_empty()).then_some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            )
        };
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn overridden_keys(options: &LoadOptions) -> Vec<&'static str> {
    let overrides = &options.overrides;
    [
        ("database.url", overrides.database_url.is_some()),
        ("logging.level", overrides.log_level.is_some()),
        ("llm.base_url", overrides.llm_base_url.is_some()),
        ("llm.model", overrides.llm_model.is_some()),
        ("orchestration.top_k", overrides.top_k.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, set)| set.then_some(key))
    .collect()
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    let root = PathBuf::from("smartshop.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/smartshop.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_are_redacted() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found() {
        let doc: toml::Value = "[llm]\nmodel = \"qwen\"".parse().expect("valid toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.base_url"));
    }
}
