pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, ConfigError};
pub use types::Config;

/// File name looked up in the working directory before the per-user and
/// system-wide locations.
pub const LOCAL_CONFIG_FILE: &str = "lumberjack.yml";

pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // $env{VAR_NAME}, VAR_NAME starting with a letter or underscore
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
    })
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    env_var_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// Expands tilde (~) in paths to the user's home directory.
/// Returns the path unchanged if it doesn't start with tilde or home directory cannot be determined.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path. Returns the first candidate from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ./lumberjack.yml
/// 3. ~/.config/lumberjack/config.yml
/// 4. /etc/lumberjack/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    search_locations().into_iter().find(|path| path.exists())
}

/// Locations searched when no explicit config path is given, in order.
pub fn search_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(home_dir) = dirs::home_dir() {
        locations.push(home_dir.join(".config/lumberjack/config.yml"));
    }
    locations.push(PathBuf::from("/etc/lumberjack/config.yml"));
    locations
}
