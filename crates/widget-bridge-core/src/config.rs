//! Configuration loading and validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level widget bridge configuration.
///
/// Loaded once by the process entry point and passed down explicitly; nothing
/// in the workspace keeps a module-level copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    18790
}

/// Artifact cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Absolute cache directory. Overrides `base_dir` + `namespace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Parent directory holding the namespace folder (default: `<tmp>/widget-kit`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Records older than this are removed by the sweep (default: 30 minutes).
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Sweep period; 0 disables the recurring sweep (default: 5 minutes).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub id_format: IdFormat,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            base_dir: None,
            namespace: default_namespace(),
            max_age_secs: default_max_age_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            id_format: IdFormat::default(),
        }
    }
}

fn default_namespace() -> String {
    "widget-kit".into()
}

fn default_max_age_secs() -> u64 {
    30 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    5 * 60
}

/// Shape of the ids minted by the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    #[default]
    Base36,
    Uuid,
}

impl CacheConfig {
    /// Resolve the directory records are written to.
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return expand_path(dir);
        }
        let base = self
            .base_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| std::env::temp_dir().join("widget-kit"));
        base.join(&self.namespace)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Default allow-list of CDN origins widgets may load scripts/styles from.
pub const DEFAULT_TRUSTED_ORIGINS: &[&str] = &[
    "https://persistent.oaistatic.com",
    "https://*.oaistatic.com",
];

/// Render responder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub default_height: WidgetHeight,

    #[serde(default = "default_base_href")]
    pub base_href: String,

    /// Full CSP override. An empty string disables the header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csp: Option<String>,

    #[serde(default = "default_trusted_origins")]
    pub trusted_origins: Vec<String>,

    /// Extra response headers added to every rendered document.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Telemetry sink path the bridge script beacons to.
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Withhold `toolOutput` when `openai/widgetAccessible` is explicitly `false`.
    #[serde(default)]
    pub respect_widget_accessible: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_height: WidgetHeight::default(),
            base_href: default_base_href(),
            csp: None,
            trusted_origins: default_trusted_origins(),
            headers: BTreeMap::new(),
            log_path: default_log_path(),
            respect_widget_accessible: false,
        }
    }
}

fn default_base_href() -> String {
    "/".into()
}

fn default_trusted_origins() -> Vec<String> {
    DEFAULT_TRUSTED_ORIGINS.iter().map(|o| o.to_string()).collect()
}

fn default_log_path() -> String {
    "/api/widget/log".into()
}

/// Host-side embed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Prefix the widget id is appended to when building the frame address.
    #[serde(default = "default_render_prefix")]
    pub render_prefix: String,

    #[serde(default)]
    pub inline_height: WidgetHeight,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            render_prefix: default_render_prefix(),
            inline_height: WidgetHeight::default(),
        }
    }
}

fn default_store_path() -> String {
    "/api/widget/store".into()
}

fn default_render_prefix() -> String {
    "/api/widget/".into()
}

/// A widget height given either as pixels or as a CSS length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetHeight {
    Pixels(u32),
    Css(String),
}

impl Default for WidgetHeight {
    fn default() -> Self {
        Self::Pixels(400)
    }
}

impl WidgetHeight {
    /// CSS form, e.g. `400px`.
    pub fn css(&self) -> String {
        match self {
            Self::Pixels(px) => format!("{px}px"),
            Self::Css(value) if value.trim().is_empty() => "400px".into(),
            Self::Css(value) => value.clone(),
        }
    }

    /// Numeric form used for the frame's `maxHeight`; the leading integer of a
    /// CSS value, 0 when it has none.
    pub fn numeric(&self) -> u32 {
        match self {
            Self::Pixels(px) => *px,
            Self::Css(value) if value.trim().is_empty() => 400,
            Self::Css(value) => {
                let digits: String = value
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().unwrap_or(0)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "widget_bridge_cache=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::WidgetBridgeError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::WidgetBridgeError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Resolve the default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or_else(default_port)
    }

    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    pub fn render(&self) -> RenderConfig {
        self.render.clone().unwrap_or_default()
    }

    pub fn embed(&self) -> EmbedConfig {
        self.embed.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "server.port", "cache.namespace").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("Server port cannot be 0".to_string());
            }
        }

        if let Some(cache) = &self.cache {
            if cache.max_age_secs == 0 {
                warnings.push("cache.max_age_secs is 0: every sweep removes all widgets".to_string());
            }
            if cache.namespace.contains(['/', '\\']) {
                errors.push(format!(
                    "cache.namespace must be a single path segment, got '{}'",
                    cache.namespace
                ));
            }
        }

        if let Some(render) = &self.render {
            if render.csp.as_deref() == Some("") {
                warnings.push(
                    "render.csp is empty: rendered widgets are served without a Content-Security-Policy"
                        .to_string(),
                );
            }
            if !render.log_path.starts_with('/') {
                errors.push(format!(
                    "render.log_path must be an absolute path, got '{}'",
                    render.log_path
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for widget bridge data: `~/.widget_bridge/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".widget_bridge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_WB_CACHE_DIR", "/var/widgets") };
        let input = r#"{"cache": {"dir": "${TEST_WB_CACHE_DIR}"}}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("/var/widgets"));
        unsafe { std::env::remove_var("TEST_WB_CACHE_DIR") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_WB_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port(), 18790);
        assert_eq!(config.bind(), "127.0.0.1");

        let cache = config.cache();
        assert_eq!(cache.max_age(), Duration::from_secs(1800));
        assert_eq!(cache.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(cache.resolve_dir(), std::env::temp_dir().join("widget-kit").join("widget-kit"));

        let render = config.render();
        assert_eq!(render.base_href, "/");
        assert_eq!(render.log_path, "/api/widget/log");
        assert_eq!(render.trusted_origins.len(), 2);

        let embed = config.embed();
        assert_eq!(embed.store_path, "/api/widget/store");
        assert_eq!(embed.render_prefix, "/api/widget/");
    }

    #[test]
    fn test_cache_dir_override() {
        let json = r#"{ cache: { dir: "/srv/widgets", namespace: "ignored" } }"#;
        let config: Config = json5::from_str(json).unwrap();
        assert_eq!(config.cache().resolve_dir(), PathBuf::from("/srv/widgets"));

        let json = r#"{ cache: { base_dir: "/srv", namespace: "apps" } }"#;
        let config: Config = json5::from_str(json).unwrap();
        assert_eq!(config.cache().resolve_dir(), PathBuf::from("/srv/apps"));
    }

    #[test]
    fn test_widget_height_forms() {
        assert_eq!(WidgetHeight::Pixels(320).css(), "320px");
        assert_eq!(WidgetHeight::Pixels(320).numeric(), 320);
        assert_eq!(WidgetHeight::Css("600px".into()).numeric(), 600);
        assert_eq!(WidgetHeight::Css("60vh".into()).css(), "60vh");
        assert_eq!(WidgetHeight::Css("auto".into()).numeric(), 0);
        assert_eq!(WidgetHeight::Css("  ".into()).numeric(), 400);

        let config: Config =
            json5::from_str(r#"{ render: { default_height: "520px" } }"#).unwrap();
        assert_eq!(config.render().default_height.numeric(), 520);
        let config: Config = json5::from_str(r#"{ render: { default_height: 250 } }"#).unwrap();
        assert_eq!(config.render().default_height, WidgetHeight::Pixels(250));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_get_path() {
        let config: Config = json5::from_str(r#"{ server: { port: 9000 } }"#).unwrap();
        assert_eq!(config.get_path("server.port"), Some(serde_json::json!(9000)));
        assert!(config.get_path("server.missing").is_none());
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let config: Config = json5::from_str(
            r#"{ server: { port: 0 }, cache: { namespace: "a/b", max_age_secs: 0 }, render: { csp: "", log_path: "log" } }"#,
        )
        .unwrap();
        let (warnings, errors) = config.validate();
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(errors.iter().any(|e| e.contains("port")));
        assert!(errors.iter().any(|e| e.contains("namespace")));
        assert!(errors.iter().any(|e| e.contains("log_path")));
    }
}
