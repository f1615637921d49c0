use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use crate::source::timestamp::DatePattern;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&raw).map_err(|e| match e {
        ConfigError::YamlParse(err) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), err),
        )),
        other => other,
    })?;

    expand_paths(&mut config);

    Ok(config)
}

/// Parse and validate config text. Environment references are expanded
/// before the YAML is read; paths are left as written.
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let expanded = expand_env_vars(raw);
    check_unexpanded_vars(&expanded)?;

    let config: Config = serde_yaml::from_str(&expanded)?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(text: &str) -> Result<(), ConfigError> {
    let mut unexpanded: Vec<String> = env_var_pattern()
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort();
    unexpanded.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         Either export them before running, or replace the $env{{...}} \
         references in the config file with literal values",
        unexpanded.join(", ")
    )))
}

fn expand_paths(config: &mut Config) {
    config.processed_directory = expand_tilde(&config.processed_directory);
    if let Some(dir) = config.log_directory.as_mut() {
        *dir = expand_tilde(dir);
    }
    if let Some(dir) = config.source_directory.as_mut() {
        *dir = expand_tilde(dir);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_timestamp_fields(config, &mut errors);
    validate_elasticsearch(config, &mut errors);

    if !config.index_format.contains("{date}") {
        errors.push(format!(
            "index_format '{}' must contain the {{date}} placeholder",
            config.index_format
        ));
    }

    if config.chunk_size == 0 {
        errors.push("chunk_size must be greater than zero".to_string());
    }

    if config.max_concurrent_files == Some(0) {
        errors.push("max_concurrent_files must be greater than zero".to_string());
    }

    if config.processed_directory.as_os_str().is_empty() {
        errors.push("processed_directory cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_timestamp_fields(config: &Config, errors: &mut Vec<String>) {
    if config.date_field.is_empty() {
        errors.push("date_field cannot be empty".to_string());
    }
    if config.time_field.is_empty() {
        errors.push("time_field cannot be empty".to_string());
    }
    if !config.date_field.is_empty() && config.date_field == config.time_field {
        errors.push(format!(
            "date_field and time_field must differ (both are '{}')",
            config.date_field
        ));
    }
    if config.date_format.trim().is_empty() {
        errors.push("date_format cannot be empty".to_string());
    } else if let Err(e) = DatePattern::new(&config.date_format) {
        errors.push(format!("date_format '{}': {}", config.date_format, e));
    }
}

fn validate_elasticsearch(config: &Config, errors: &mut Vec<String>) {
    match reqwest::Url::parse(&config.elasticsearch_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "elasticsearch_url must use http or https, got '{}'",
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "invalid elasticsearch_url '{}': {}",
            config.elasticsearch_url, e
        )),
    }

    if config.document_type.is_empty() {
        errors.push("document_type cannot be empty".to_string());
    }
}
