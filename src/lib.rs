//! # markdown-academic
//!
//! A Markdown dialect for academic writing (`.mda` files): math, citations,
//! cross-references, numbered environments and footnotes, rendered to HTML.
//!
//! The pipeline has three stages:
//!
//! 1. [`parse`] turns source text into a [`Document`].
//! 2. [`resolve`] numbers labels, links references, citations and footnotes
//!    and expands macros, producing a [`ResolvedDocument`]. The parsed
//!    document is not modified.
//! 3. [`render_html`] (or [`ResolvedDocument::render`]) emits HTML through
//!    the selected math backend.
//!
//! ## Quick Start
//!
//! ```rust
//! use markdown_academic::{parse, render_html, resolve, Bibliography, RenderConfig, ResolveConfig};
//!
//! let input = r#"
//! # Introduction {#sec:intro}
//!
//! The equation $E = mc^2$ is famous. See @sec:intro for more.
//!
//! ::: theorem {#thm:main}
//! Every natural number is interesting.
//! :::
//! "#;
//!
//! let doc = parse(input).unwrap();
//! let resolved = resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap();
//! let html = render_html(&resolved, &RenderConfig::default()).unwrap();
//! assert!(html.contains("Section 1"));
//! ```
//!
//! ## Syntax Reference
//!
//! ### Front Matter (TOML)
//!
//! ```text
//! +++
//! title = "My Document"
//! authors = ["Jane Doe"]
//! bibliography = "refs.bib"
//!
//! [macros]
//! R = "\\mathbb{R}"
//! vec = "\\mathbf{#1}"
//! +++
//! ```
//!
//! ### Math
//!
//! - Inline: `$E = mc^2$`
//! - Display: `$$ ... $$ {#eq:label}`
//!
//! ### Citations
//!
//! - Single: `[@knuth1984]`
//! - Multiple: `[@knuth1984; @lamport1994]`
//! - With locator: `[@knuth1984, p. 42]`
//!
//! ### Cross-References
//!
//! - Define label: `# Section {#sec:intro}`
//! - Reference: `@sec:intro`, rendered as "Section 1" and linked to id
//!   `sec-intro`
//!
//! ### Environments
//!
//! ```text
//! ::: theorem {#thm:main}
//! Statement of the theorem.
//! :::
//! ```
//!
//! ### Footnotes
//!
//! - Inline: `Some text^[This is a footnote].`
//! - Reference: `Some text[^1].` with `[^1]: Footnote content.` defined later.
//!
//! Place `[[toc]]` where the table of contents should appear.
//!
//! ## Logging
//!
//! Each stage emits `tracing` events; warnings for unresolved references and
//! similar problems are logged at `WARN`. The library never installs a
//! subscriber.

pub mod ast;
pub mod bibtex;
pub mod error;
pub mod info;
pub mod parser;
pub mod render;
pub mod resolve;

pub use ast::{Block, Document, Inline, Metadata};
pub use bibtex::{parse_bibtex, BibEntry, Bibliography};
pub use error::{Error, ParseError, Position, RenderError, ResolveError, ResolveErrors, Result};
pub use info::DocumentInfo;
pub use parser::{parse, parse_inlines};
pub use render::{render_html, MathBackend, RenderConfig};
pub use resolve::{resolve, Diagnostic, DiagnosticKind, ResolveConfig, ResolvedDocument};

use serde::Serialize;

/// Parse, resolve, and render a document to HTML in one step.
///
/// `config.strict_mode` also makes resolution strict, so unknown references
/// and citation keys fail with [`Error::Resolution`].
///
/// # Example
///
/// ```rust
/// use markdown_academic::{render, RenderConfig};
///
/// let html = render("# Hello *world*", None, &RenderConfig::default()).unwrap();
/// assert!(html.contains("<h1"));
/// ```
pub fn render(
    input: &str,
    bibliography: Option<&Bibliography>,
    config: &RenderConfig,
) -> Result<String> {
    let doc = parse(input)?;
    let empty = Bibliography::new();
    let resolve_config = ResolveConfig {
        strict: config.strict_mode,
        ..ResolveConfig::default()
    };
    let resolved = resolve(&doc, bibliography.unwrap_or(&empty), &resolve_config)?;
    Ok(resolved.render(config)?)
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// No parse or resolution errors.
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<Diagnostic>,
}

/// Parse and resolve a document without rendering it, collecting every
/// error and warning.
pub fn validate(source: &str, bibliography: Option<&Bibliography>, strict: bool) -> ValidationResult {
    let doc = match parse(source) {
        Ok(doc) => doc,
        Err(err) => {
            return ValidationResult {
                valid: false,
                errors: vec![err.to_string()],
                warnings: Vec::new(),
            }
        }
    };

    let empty = Bibliography::new();
    let config = ResolveConfig {
        strict,
        ..ResolveConfig::default()
    };
    match resolve(&doc, bibliography.unwrap_or(&empty), &config) {
        Ok(resolved) => ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: resolved.warnings,
        },
        Err(errors) => ValidationResult {
            valid: false,
            errors: errors.iter().map(|e| e.to_string()).collect(),
            warnings: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_pipeline() {
        let input = r#"+++
title = "Test Document"

[macros]
R = "\\mathbb{R}"
+++

# Introduction {#sec:intro}

Let $x \in \R$ be a real number. See @sec:intro.

::: theorem {#thm:main}
All numbers are interesting.
:::

As shown in @thm:main, this is true.
"#;

        let html = render(input, None, &RenderConfig::default()).unwrap();

        assert!(html.contains(r#"<h1 id="sec-intro">"#));
        assert!(html.contains(r"\(x \in \mathbb{R}\)"));
        assert!(html.contains("Theorem 1"));
        assert!(html.contains(r##"<a href="#thm-main" class="mda-ref">Theorem 1</a>"##));
    }

    #[test]
    fn test_simple_markdown() {
        let html = render("# Hello\n\n**Bold** and *italic* text.", None, &RenderConfig::default())
            .unwrap();
        assert!(html.contains("<strong>Bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn test_code_block_and_list() {
        let html = render(
            "```rust\nfn main() {}\n```\n\n- Item 1\n- [x] Done",
            None,
            &RenderConfig::default(),
        )
        .unwrap();
        assert!(html.contains(r#"<pre><code class="language-rust">fn main() {}"#));
        assert!(html.contains("<li>Item 1</li>"));
        assert!(html.contains(r#"<input type="checkbox" checked disabled> Done"#));
    }

    #[test]
    fn test_strict_render_fails_on_unknown_reference() {
        let config = RenderConfig {
            strict_mode: true,
            ..RenderConfig::default()
        };
        let err = render("See @sec:none.", None, &config).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = render("$$\nx", None, &RenderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_validate() {
        let ok = validate("See @sec:none.", None, false);
        assert!(ok.valid);
        assert_eq!(ok.warnings.len(), 1);
        assert_eq!(ok.warnings[0].kind, DiagnosticKind::UnknownReference);

        let strict = validate("See @sec:none.", None, true);
        assert!(!strict.valid);
        assert_eq!(strict.errors.len(), 1);
        assert!(strict.errors[0].contains("sec:none"));

        let broken = validate("Unclosed $math", None, false);
        assert!(!broken.valid);
        assert!(broken.errors[0].contains("line 1"));
    }
}
