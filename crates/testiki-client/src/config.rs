//! Client configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use testiki_core::traits::Session;
use testiki_core::RunnerConfig;

/// Top-level testiki configuration.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// HTTP request deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Bearer token for submitting results. `${VAR}` references are resolved.
    #[serde(default)]
    pub token: Option<String>,
    /// Move to the next question after answering.
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    /// Directory for locally saved attempt records.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("auto_advance", &self.auto_advance)
            .field("results_dir", &self.results_dir)
            .finish()
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("./testiki-results")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            token: None,
            auto_advance: true,
            results_dir: default_results_dir(),
        }
    }
}

impl ClientConfig {
    /// The credential to hand to the result submitter.
    pub fn session(&self) -> Session {
        match &self.token {
            Some(token) => Session::with_token(token.clone()),
            None => Session::anonymous(),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            auto_advance: self.auto_advance,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        // Substituted values are not scanned again.
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `testiki.toml` in the current directory
/// 2. `~/.config/testiki/config.toml`
///
/// Environment variable overrides: `TESTIKI_BASE_URL`, `TESTIKI_TOKEN`.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("testiki.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    // Apply env var overrides
    if let Ok(url) = std::env::var("TESTIKI_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(token) = std::env::var("TESTIKI_TOKEN") {
        config.token = Some(token);
    }

    config.base_url = resolve_env_vars(&config.base_url);
    config.token = config
        .token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.trim().is_empty());

    anyhow::ensure!(config.timeout_secs >= 1, "timeout_secs must be at least 1");
    Ok(config)
}

fn parse_config(content: &str) -> Result<ClientConfig> {
    Ok(toml::from_str::<ClientConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("testiki"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_TESTIKI_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_TESTIKI_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_TESTIKI_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${"), "unterminated ${");
        std::env::remove_var("_TESTIKI_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_values() {
        std::env::set_var("_TESTIKI_SELF_REF", "a${_TESTIKI_SELF_REF}b");
        assert_eq!(
            resolve_env_vars("${_TESTIKI_SELF_REF}-${_TESTIKI_UNSET_VAR}"),
            "a${_TESTIKI_SELF_REF}b-"
        );
        std::env::remove_var("_TESTIKI_SELF_REF");
    }

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 10);
        assert!(config.auto_advance);
        assert!(!config.session().is_authenticated());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
base_url = "https://testiki.example.com"
token = "abc"
auto_advance = false
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://testiki.example.com");
        assert_eq!(config.timeout_secs, 10);
        assert!(!config.runner_config().auto_advance);
        assert_eq!(config.session().token(), Some("abc"));
    }

    #[test]
    fn debug_masks_token() {
        let config = ClientConfig {
            token: Some("super-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testiki.toml");
        std::fs::write(&path, "timeout_secs = 3\nresults_dir = \"out\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.results_dir, PathBuf::from("out"));

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testiki.toml");
        std::fs::write(&path, "timeout_secs = 0\n").unwrap();
        assert!(load_config_from(Some(&path)).is_err());
    }
}
