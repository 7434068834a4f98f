//! Backend configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use learnearn_core::engine::QuizEngineConfig;
use learnearn_core::retry::RetryPolicy;
use learnearn_core::traits::{Grader, LocalGrader, QuestionSource};

use crate::catalog::CatalogSource;
use crate::http::HttpBackend;

/// Where quiz content comes from.
///
/// Note: Custom Debug impl masks the API key to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// The catalog compiled into the binary.
    Builtin {
        /// Simulated network delay per fetch.
        #[serde(default)]
        latency_ms: u64,
    },
    /// A catalog file or directory of catalog files.
    File { path: PathBuf },
    /// A remote quiz API. Grading happens server-side.
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::Builtin { latency_ms } => f
                .debug_struct("Builtin")
                .field("latency_ms", latency_ms)
                .finish(),
            SourceConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            SourceConfig::Http {
                base_url,
                api_key,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Builtin { latency_ms: 0 }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Top-level learnearn configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnEarnConfig {
    #[serde(default)]
    pub source: SourceConfig,
    /// Total question fetch attempts, including the first.
    #[serde(default = "default_attempts")]
    pub retry_attempts: u32,
    /// Delay between fetch attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// User id sent with submissions.
    #[serde(default)]
    pub user_id: u64,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    /// Wallet balance before any reward is credited.
    #[serde(default)]
    pub starting_balance: u64,
}

fn default_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1500
}
fn default_token_symbol() -> String {
    "LEARN".to_string()
}

impl Default for LearnEarnConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            retry_attempts: default_attempts(),
            retry_delay_ms: default_retry_delay(),
            user_id: 0,
            token_symbol: default_token_symbol(),
            starting_balance: 0,
        }
    }
}

impl LearnEarnConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> QuizEngineConfig {
        QuizEngineConfig {
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                backoff: Duration::from_millis(self.retry_delay_ms),
            },
            user_id: self.user_id,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + len];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_source_config(config: &SourceConfig) -> SourceConfig {
    match config {
        SourceConfig::Builtin { latency_ms } => SourceConfig::Builtin {
            latency_ms: *latency_ms,
        },
        SourceConfig::File { path } => SourceConfig::File {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        SourceConfig::Http {
            base_url,
            api_key,
            timeout_secs,
        } => SourceConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_key: api_key.as_deref().map(resolve_env_vars),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `learnearn.toml` in the current directory
/// 2. `~/.config/learnearn/config.toml`
///
/// Environment variable overrides: `LEARNEARN_API_URL` switches the source
/// to HTTP, `LEARNEARN_API_KEY` sets its key.
pub fn load_config() -> Result<LearnEarnConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LearnEarnConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("learnearn.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => LearnEarnConfig::default(),
    };

    Ok(finish_config(
        config,
        std::env::var("LEARNEARN_API_URL").ok(),
        std::env::var("LEARNEARN_API_KEY").ok(),
    ))
}

/// Expand `${VAR}` references in the file values, then apply the
/// environment overrides as literal values.
fn finish_config(
    mut config: LearnEarnConfig,
    url: Option<String>,
    key: Option<String>,
) -> LearnEarnConfig {
    config.source = resolve_source_config(&config.source);
    apply_env_overrides(&mut config, url, key);
    config
}

/// Parse a configuration file's contents.
pub fn parse_config(content: &str) -> Result<LearnEarnConfig> {
    Ok(toml::from_str(content)?)
}

fn apply_env_overrides(config: &mut LearnEarnConfig, url: Option<String>, key: Option<String>) {
    if let Some(url) = url {
        let (api_key, timeout_secs) = match &config.source {
            SourceConfig::Http {
                api_key,
                timeout_secs,
                ..
            } => (api_key.clone(), *timeout_secs),
            _ => (None, default_timeout()),
        };
        config.source = SourceConfig::Http {
            base_url: url,
            api_key,
            timeout_secs,
        };
    }

    if let Some(key) = key {
        if let SourceConfig::Http { api_key, .. } = &mut config.source {
            *api_key = Some(key);
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("learnearn"))
}

/// A question source paired with the grader that scores its quizzes.
#[derive(Clone)]
pub struct Backend {
    pub source: Arc<dyn QuestionSource>,
    pub grader: Arc<dyn Grader>,
}

/// Create the backend described by a source configuration.
///
/// Local sources grade in-process; the HTTP source grades server-side.
pub fn create_backend(config: &SourceConfig) -> Result<Backend> {
    match config {
        SourceConfig::Builtin { latency_ms } => {
            let source = CatalogSource::builtin()?.with_latency(Duration::from_millis(*latency_ms));
            Ok(Backend {
                source: Arc::new(source),
                grader: Arc::new(LocalGrader),
            })
        }
        SourceConfig::File { path } => {
            let source = CatalogSource::from_path(path)?;
            Ok(Backend {
                source: Arc::new(source),
                grader: Arc::new(LocalGrader),
            })
        }
        SourceConfig::Http {
            base_url,
            api_key,
            timeout_secs,
        } => {
            let backend = Arc::new(HttpBackend::with_timeout(
                base_url,
                api_key.clone(),
                *timeout_secs,
            )?);
            Ok(Backend {
                source: backend.clone(),
                grader: backend,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_LEARNEARN_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_LEARNEARN_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_LEARNEARN_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${"), "unterminated ${");
        std::env::remove_var("_LEARNEARN_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_rescan_values() {
        std::env::set_var("_LEARNEARN_SELF_REF", "a${_LEARNEARN_SELF_REF}b");
        assert_eq!(
            resolve_env_vars("${_LEARNEARN_SELF_REF}!"),
            "a${_LEARNEARN_SELF_REF}b!"
        );
        std::env::remove_var("_LEARNEARN_SELF_REF");
        assert_eq!(resolve_env_vars("${_LEARNEARN_UNSET_VAR}x"), "x");
    }

    #[test]
    fn env_key_is_taken_literally() {
        std::env::set_var("_LEARNEARN_FILE_URL", "https://quiz.example.com");
        let config = parse_config(
            r#"
[source]
type = "http"
base_url = "${_LEARNEARN_FILE_URL}"
"#,
        )
        .unwrap();
        let config = finish_config(config, None, Some("sk-${_LEARNEARN_FILE_URL}".into()));
        std::env::remove_var("_LEARNEARN_FILE_URL");
        match config.source {
            SourceConfig::Http {
                base_url, api_key, ..
            } => {
                assert_eq!(base_url, "https://quiz.example.com");
                assert_eq!(api_key.as_deref(), Some("sk-${_LEARNEARN_FILE_URL}"));
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn default_config() {
        let config = LearnEarnConfig::default();
        assert!(matches!(config.source, SourceConfig::Builtin { latency_ms: 0 }));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.token_symbol, "LEARN");

        let engine = config.engine_config();
        assert_eq!(engine.retry, RetryPolicy::default());
    }

    #[test]
    fn parse_http_source() {
        let config = parse_config(
            r#"
retry_attempts = 5
retry_delay_ms = 200
user_id = 12
starting_balance = 125

[source]
type = "http"
base_url = "https://quiz.example.com"
api_key = "sk-test"
"#,
        )
        .unwrap();
        assert_eq!(config.engine_config().retry.max_attempts, 5);
        assert_eq!(config.engine_config().user_id, 12);
        assert_eq!(config.starting_balance, 125);
        match &config.source {
            SourceConfig::Http {
                base_url,
                timeout_secs,
                ..
            } => {
                assert_eq!(base_url, "https://quiz.example.com");
                assert_eq!(*timeout_secs, 30);
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn debug_masks_api_key() {
        let source = SourceConfig::Http {
            base_url: "https://quiz.example.com".into(),
            api_key: Some("sk-very-secret".into()),
            timeout_secs: 30,
        };
        let printed = format!("{source:?}");
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn env_url_switches_to_http() {
        let mut config = LearnEarnConfig::default();
        apply_env_overrides(
            &mut config,
            Some("http://localhost:8080".into()),
            Some("key".into()),
        );
        match config.source {
            SourceConfig::Http {
                base_url, api_key, ..
            } => {
                assert_eq!(base_url, "http://localhost:8080");
                assert_eq!(api_key.as_deref(), Some("key"));
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn env_key_alone_keeps_local_source() {
        let mut config = LearnEarnConfig::default();
        apply_env_overrides(&mut config, None, Some("key".into()));
        assert!(matches!(config.source, SourceConfig::Builtin { .. }));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learnearn.toml");
        std::fs::write(&path, "[source]\ntype = \"file\"\npath = \"topics\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        if std::env::var("LEARNEARN_API_URL").is_err() {
            assert!(matches!(config.source, SourceConfig::File { .. }));
        }
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config_from(Some(Path::new("/no/such/learnearn.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[tokio::test]
    async fn builtin_backend_serves_catalog() {
        let backend = create_backend(&SourceConfig::default()).unwrap();
        assert_eq!(backend.source.name(), "builtin");
        assert_eq!(backend.grader.name(), "local");
        assert_eq!(backend.source.fetch_topics().await.unwrap().len(), 4);
    }
}
