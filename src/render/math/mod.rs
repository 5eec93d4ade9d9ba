//! Math rendering backends.

mod katex;
mod mathml;

pub use self::katex::{KaTeXRenderer, MathJaxRenderer};
pub use self::mathml::{latex_to_mathml, MathMLRenderer};

use crate::error::RenderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Math rendering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathBackend {
    /// Output raw LaTeX for KaTeX to render client-side.
    #[default]
    KaTeX,
    /// Output raw LaTeX for MathJax to render client-side.
    MathJax,
    /// Translate to MathML for native browser rendering.
    MathML,
}

impl MathBackend {
    pub fn name(&self) -> &'static str {
        match self {
            MathBackend::KaTeX => "katex",
            MathBackend::MathJax => "mathjax",
            MathBackend::MathML => "mathml",
        }
    }
}

impl fmt::Display for MathBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown math backend `{0}` (expected katex, mathjax or mathml)")]
pub struct UnknownMathBackend(pub String);

impl FromStr for MathBackend {
    type Err = UnknownMathBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "katex" => Ok(MathBackend::KaTeX),
            "mathjax" => Ok(MathBackend::MathJax),
            "mathml" => Ok(MathBackend::MathML),
            _ => Err(UnknownMathBackend(s.to_string())),
        }
    }
}

/// Turns one math span into markup.
pub trait MathRenderer {
    /// Render inline math.
    fn render_inline(&self, latex: &str) -> Result<String, RenderError>;

    /// Render display math.
    fn render_display(&self, latex: &str) -> Result<String, RenderError>;

    /// Get any required HTML head content (scripts, styles).
    fn head_content(&self) -> Option<String>;
}

/// Create a math renderer for the given backend.
pub fn create_renderer(backend: MathBackend) -> Box<dyn MathRenderer> {
    match backend {
        MathBackend::KaTeX => Box::new(KaTeXRenderer),
        MathBackend::MathJax => Box::new(MathJaxRenderer),
        MathBackend::MathML => Box::new(MathMLRenderer),
    }
}

pub(crate) fn escape_math(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("katex".parse(), Ok(MathBackend::KaTeX));
        assert_eq!("MathJax".parse(), Ok(MathBackend::MathJax));
        assert_eq!(" mathml ".parse(), Ok(MathBackend::MathML));
        assert_eq!(
            "ascii".parse::<MathBackend>(),
            Err(UnknownMathBackend("ascii".into()))
        );
    }

    #[test]
    fn test_backend_serde_names() {
        assert_eq!(serde_json::to_string(&MathBackend::MathML).unwrap(), "\"mathml\"");
        let backend: MathBackend = serde_json::from_str("\"mathjax\"").unwrap();
        assert_eq!(backend, MathBackend::MathJax);
    }
}
