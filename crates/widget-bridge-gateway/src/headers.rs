//! Render responder options and response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

use widget_bridge_core::config::RenderConfig;
use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_frame::ComposeOptions;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Build the default policy: self plus the trusted origins for every
/// resource class a widget needs.
pub fn build_csp<S: AsRef<str>>(trusted_origins: &[S]) -> String {
    let origins = trusted_origins
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    let with = |prefix: &str| {
        if origins.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix} {origins}")
        }
    };

    [
        with("default-src 'self'"),
        with("script-src 'self' 'unsafe-inline' 'unsafe-eval'"),
        with("style-src 'self' 'unsafe-inline'"),
        with("img-src 'self' data:"),
        with("font-src 'self'"),
        with("connect-src 'self'"),
    ]
    .iter()
    .map(|directive| format!("{directive};"))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Everything the render responder needs beyond the record itself.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub compose: ComposeOptions,
    /// `None` omits the header.
    pub csp: Option<HeaderValue>,
    pub extra_headers: Vec<(HeaderName, HeaderValue)>,
    pub respect_widget_accessible: bool,
}

impl RenderOptions {
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let csp = match config.csp.as_deref() {
            Some("") => None,
            Some(custom) => Some(custom.to_string()),
            None => Some(build_csp(config.trusted_origins.as_slice())),
        };
        let csp = csp
            .map(|value| {
                HeaderValue::from_str(&value)
                    .map_err(|e| WidgetBridgeError::Config(format!("render.csp: {e}")))
            })
            .transpose()?;

        let extra_headers = config
            .headers
            .iter()
            .map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| WidgetBridgeError::Config(format!("render.headers key '{name}': {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| WidgetBridgeError::Config(format!("render.headers value for '{name}': {e}")))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            compose: ComposeOptions::from(config),
            csp,
            extra_headers,
            respect_widget_accessible: config.respect_widget_accessible,
        })
    }

    /// Headers for a rendered document. Extra headers may override the
    /// frame-options default; the CSP is applied last.
    pub fn document_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(csp) = &self.csp {
            headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
        }
        headers
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            compose: ComposeOptions::default(),
            csp: HeaderValue::from_str(&build_csp(widget_bridge_core::config::DEFAULT_TRUSTED_ORIGINS)).ok(),
            extra_headers: Vec::new(),
            respect_widget_accessible: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use widget_bridge_core::config::DEFAULT_TRUSTED_ORIGINS;

    use super::*;

    #[test]
    fn test_default_csp() {
        assert_eq!(
            build_csp(DEFAULT_TRUSTED_ORIGINS),
            "default-src 'self' https://persistent.oaistatic.com https://*.oaistatic.com; \
             script-src 'self' 'unsafe-inline' 'unsafe-eval' https://persistent.oaistatic.com https://*.oaistatic.com; \
             style-src 'self' 'unsafe-inline' https://persistent.oaistatic.com https://*.oaistatic.com; \
             img-src 'self' data: https://persistent.oaistatic.com https://*.oaistatic.com; \
             font-src 'self' https://persistent.oaistatic.com https://*.oaistatic.com; \
             connect-src 'self' https://persistent.oaistatic.com https://*.oaistatic.com;"
        );
    }

    #[test]
    fn test_csp_without_origins() {
        let empty: [&str; 0] = [];
        assert!(build_csp(&empty).starts_with("default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval';"));
    }

    #[test]
    fn test_empty_csp_disables_header() {
        let config = RenderConfig {
            csp: Some(String::new()),
            ..RenderConfig::default()
        };
        let options = RenderOptions::from_config(&config).unwrap();
        let headers = options.document_headers();
        assert!(headers.get(header::CONTENT_SECURITY_POLICY).is_none());
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers[header::CONTENT_TYPE], HTML_CONTENT_TYPE);
    }

    #[test]
    fn test_extra_headers() {
        let mut extra = BTreeMap::new();
        extra.insert("Cache-Control".to_string(), "no-store".to_string());
        extra.insert("X-Frame-Options".to_string(), "DENY".to_string());
        let config = RenderConfig {
            headers: extra,
            csp: Some("default-src 'none'".into()),
            ..RenderConfig::default()
        };
        let headers = RenderOptions::from_config(&config).unwrap().document_headers();
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "default-src 'none'");
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let mut extra = BTreeMap::new();
        extra.insert("bad header".to_string(), "x".to_string());
        let config = RenderConfig {
            headers: extra,
            ..RenderConfig::default()
        };
        assert!(matches!(
            RenderOptions::from_config(&config),
            Err(WidgetBridgeError::Config(_))
        ));
    }
}
