//! Rendering layer for converting resolved documents to HTML.

pub mod html;
pub mod math;

pub use html::render_html;
pub use math::{MathBackend, MathRenderer};

use crate::error::RenderError;
use crate::resolve::ResolvedDocument;
use serde::{Deserialize, Serialize};

/// Configuration for HTML rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Math rendering backend.
    pub math_backend: MathBackend,
    /// Whether to generate a complete HTML document or just the body content.
    pub standalone: bool,
    /// Document title (for standalone mode); overrides the front matter.
    pub title: Option<String>,
    /// Additional CSS to include.
    pub custom_css: Option<String>,
    /// Whether to include a table of contents.
    pub include_toc: bool,
    /// CSS class prefix for styling.
    pub class_prefix: String,
    /// Refuse to render a document with unresolved references, citations or
    /// footnotes.
    pub strict_mode: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            math_backend: MathBackend::KaTeX,
            standalone: false,
            title: None,
            custom_css: None,
            include_toc: true,
            class_prefix: "mda".to_string(),
            strict_mode: false,
        }
    }
}

impl RenderConfig {
    /// Load a configuration from TOML; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Prefixed CSS class name, e.g. `mda-theorem`.
    pub fn class(&self, name: &str) -> String {
        if self.class_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}-{}", self.class_prefix, name)
        }
    }
}

impl ResolvedDocument {
    /// Render this document to HTML. Rendering never mutates the document.
    pub fn render(&self, config: &RenderConfig) -> Result<String, RenderError> {
        render_html(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.math_backend, MathBackend::KaTeX);
        assert!(!config.standalone);
        assert!(config.include_toc);
        assert_eq!(config.class("theorem"), "mda-theorem");
    }

    #[test]
    fn test_from_toml_uses_camel_case_keys() {
        let config = RenderConfig::from_toml_str(
            r#"
mathBackend = "mathml"
standalone = true
classPrefix = "paper"
strictMode = true
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            RenderConfig {
                math_backend: MathBackend::MathML,
                standalone: true,
                class_prefix: "paper".into(),
                strict_mode: true,
                ..RenderConfig::default()
            }
        );
        assert_eq!(config.class("toc"), "paper-toc");
    }

    #[test]
    fn test_from_toml_rejects_unknown_backend() {
        assert!(RenderConfig::from_toml_str("mathBackend = \"ascii\"").is_err());
    }

    #[test]
    fn test_empty_prefix() {
        let config = RenderConfig {
            class_prefix: String::new(),
            ..RenderConfig::default()
        };
        assert_eq!(config.class("ref"), "ref");
    }
}
