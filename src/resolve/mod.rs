//! Resolution layer: numbering, cross-references, citations, footnotes and
//! macro expansion.
//!
//! Resolution runs in two passes over a private copy of the parsed
//! document. The collection pass registers every label and assigns its
//! number; the linking pass then annotates references, citations and
//! footnotes, so forward references work the same as backward ones.

pub mod citations;
mod macros;
pub mod numbering;
pub mod references;
pub mod stats;

pub use citations::{format_authors_short, format_short_citation};
pub use numbering::{LabelCategory, LabelEntry, TocEntry};
pub use references::FootnoteEntry;
pub use stats::Statistics;

use crate::ast::{Document, Inline};
use crate::bibtex::{BibEntry, Bibliography};
use crate::error::{Position, ResolveError, ResolveErrors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How labeled headings are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberingStyle {
    /// One counter per category across the whole document.
    #[default]
    Flat,
    /// Labeled headings are numbered `1`, `1.1`, `1.2`, `2`; other
    /// categories stay flat.
    Hierarchical,
}

/// Configuration for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Promote unknown references and citation keys to errors.
    pub strict: bool,
    pub numbering: NumberingStyle,
}

impl ResolveConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Category of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownReference,
    UnknownCitation,
    UndefinedFootnote,
    UnusedFootnote,
    StrayLabel,
    MacroArity,
}

impl DiagnosticKind {
    /// Warnings about something the document points at but never defines.
    pub fn is_unresolved(self) -> bool {
        matches!(
            self,
            DiagnosticKind::UnknownReference
                | DiagnosticKind::UnknownCitation
                | DiagnosticKind::UndefinedFootnote
        )
    }
}

/// A warning produced during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// The offending label, key, footnote id or macro name.
    pub identifier: String,
    pub position: Option<Position>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            identifier: identifier.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "line {}: {}", position, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Accumulates errors and warnings across all resolution steps so that
/// every problem in a document is reported at once.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    errors: Vec<ResolveError>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn error(&mut self, error: ResolveError) {
        tracing::debug!(%error, "resolution error");
        self.errors.push(error);
    }

    pub(crate) fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = ?diagnostic.kind,
            identifier = %diagnostic.identifier,
            "{}",
            diagnostic.message
        );
        self.warnings.push(diagnostic);
    }
}

/// A document after resolution, ready for rendering.
///
/// Rendering only reads from it, so one value can be rendered any number of
/// times, from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    /// Annotated copy of the parsed document.
    pub document: Document,
    /// Every label, keyed by id.
    pub labels: BTreeMap<String, LabelEntry>,
    /// Headings in document order.
    pub toc: Vec<TocEntry>,
    /// Cited bibliography entries in order of first citation.
    pub bibliography: Vec<BibEntry>,
    /// Footnotes in number order.
    pub footnotes: Vec<FootnoteEntry>,
    pub statistics: Statistics,
    pub warnings: Vec<Diagnostic>,
}

/// Resolve all references, citations, footnotes and macros in a document.
///
/// The input document is left untouched. On failure every fatal error found
/// in the document is returned, not just the first.
pub fn resolve(
    document: &Document,
    bibliography: &Bibliography,
    config: &ResolveConfig,
) -> Result<ResolvedDocument, ResolveErrors> {
    let mut doc = document.clone();
    let mut diagnostics = Diagnostics::default();

    // Collection pass
    let labels = numbering::collect_labels(&doc.blocks, config.numbering, &mut diagnostics);
    tracing::debug!(labels = labels.len(), "collected labels");

    // Linking pass
    macros::expand_document(&mut doc.blocks, &doc.metadata.macros, &mut diagnostics);
    references::link_references(&mut doc.blocks, &labels, config.strict, &mut diagnostics);
    let cited = citations::link_citations(&mut doc.blocks, bibliography, config.strict, &mut diagnostics);
    let footnotes = references::number_footnotes(&mut doc.blocks, &mut diagnostics);
    references::report_stray_labels(&doc.blocks, &mut diagnostics);

    if !diagnostics.errors.is_empty() {
        return Err(ResolveErrors(diagnostics.errors));
    }

    let toc = numbering::build_toc(&doc.blocks, &labels);
    let statistics = Statistics::compute(&doc, labels.len());
    tracing::debug!(
        headings = toc.len(),
        citations = cited.len(),
        footnotes = footnotes.len(),
        warnings = diagnostics.warnings.len(),
        "resolved document"
    );

    Ok(ResolvedDocument {
        document: doc,
        labels,
        toc,
        bibliography: cited,
        footnotes,
        statistics,
        warnings: diagnostics.warnings,
    })
}

impl ResolvedDocument {
    /// Look up a label's entry.
    pub fn label(&self, id: &str) -> Option<&LabelEntry> {
        self.labels.get(id)
    }

    /// Inline content of the footnote with the given number.
    pub fn footnote(&self, number: usize) -> Option<&[Inline]> {
        self.footnotes
            .iter()
            .find(|f| f.number == number)
            .map(|f| f.content.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, ReferenceTarget};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn resolve_str(input: &str) -> ResolvedDocument {
        let doc = parse(input).unwrap();
        resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap()
    }

    fn first_reference(resolved: &ResolvedDocument) -> Option<ReferenceTarget> {
        let mut found = None;
        crate::ast::walk_inlines(&resolved.document.blocks, &mut |inline| {
            if let Inline::Reference(r) = inline {
                if found.is_none() {
                    found = r.resolved.clone();
                }
            }
        });
        found
    }

    #[test]
    fn test_resolve_simple_document() {
        let resolved = resolve_str("# Introduction {#sec:intro}\n\nSome text with a reference to @sec:intro.");

        assert!(resolved.labels.contains_key("sec:intro"));
        assert_eq!(
            first_reference(&resolved),
            Some(ReferenceTarget::Found {
                text: "Section 1".into(),
                html_id: "sec-intro".into()
            })
        );
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_forward_reference() {
        let resolved = resolve_str("See @eq:later.\n\n$$\nx = 1\n$$ {#eq:later}");
        assert_eq!(
            first_reference(&resolved),
            Some(ReferenceTarget::Found {
                text: "Equation (1)".into(),
                html_id: "eq-later".into()
            })
        );
    }

    #[test]
    fn test_input_document_is_not_mutated() {
        let doc = parse("# A {#sec:a}\n\n@sec:a").unwrap();
        let before = doc.clone();
        let resolved = resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap();
        assert_eq!(doc, before);
        assert_ne!(resolved.document, before);
    }

    #[test]
    fn test_unknown_reference_is_warning_unless_strict() {
        let doc = parse("See @sec:missing.").unwrap();

        let lenient = resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap();
        assert_eq!(lenient.warnings.len(), 1);
        assert_eq!(lenient.warnings[0].kind, DiagnosticKind::UnknownReference);
        assert_eq!(lenient.warnings[0].identifier, "sec:missing");
        assert_eq!(first_reference(&lenient), Some(ReferenceTarget::Missing));

        let err = resolve(&doc, &Bibliography::new(), &ResolveConfig::strict()).unwrap_err();
        assert_eq!(
            err.0,
            vec![ResolveError::UnknownReference {
                label: "sec:missing".into(),
                position: Position::new(1, 5),
            }]
        );
    }

    #[test]
    fn test_all_errors_are_collected() {
        let input = "# A {#x}\n\n# B {#x}\n\n$$\na\n$$ {#y}\n\n$$\nb\n$$ {#y}";
        let doc = parse(input).unwrap();
        let err = resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap_err();
        assert_eq!(err.len(), 2);
        assert!(err
            .iter()
            .all(|e| matches!(e, ResolveError::DuplicateLabel { .. })));
    }

    #[test]
    fn test_resolving_twice_is_identical() {
        let doc = parse("# A {#sec:a}\n\nText $x$ and @sec:a.^[Note.]").unwrap();
        let config = ResolveConfig::default();
        let first = resolve(&doc, &Bibliography::new(), &config).unwrap();
        let second = resolve(&doc, &Bibliography::new(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_toc_follows_headings() {
        let resolved = resolve_str("# One {#sec:one}\n\n## Two\n\n::: note\n# Inner\n:::");
        let texts: Vec<_> = resolved.toc.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["One", "Two", "Inner"]);
        assert_eq!(resolved.toc[0].number.as_deref(), Some("1"));
        assert_eq!(resolved.toc[1].number, None);
        assert!(matches!(resolved.document.blocks[0], Block::Heading { .. }));
    }
}
