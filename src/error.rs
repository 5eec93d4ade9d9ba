//! Error types for the markdown-academic library.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolveErrors),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// A 1-based line/column location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The first column of the given line.
    pub fn line_start(line: usize) -> Self {
        Self { line, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A fatal error raised while parsing source or bibliography text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {position}: {kind}")]
pub struct ParseError {
    pub position: Position,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(position: Position, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }
}

/// What went wrong during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("invalid front matter: {0}")]
    FrontMatter(String),

    #[error("unclosed front matter (missing closing +++)")]
    UnterminatedFrontMatter,

    #[error("front matter must be the first construct in the document")]
    MisplacedFrontMatter,

    #[error("unterminated display math (missing closing $$)")]
    UnterminatedDisplayMath,

    #[error("unterminated environment `{kind}` (missing closing :::)")]
    UnterminatedEnvironment { kind: String },

    #[error("unterminated inline math (missing closing $)")]
    UnterminatedMath,

    #[error("unterminated citation (missing closing ])")]
    UnterminatedCitation,

    #[error("citation has no keys")]
    EmptyCitation,

    #[error("malformed table: {0}")]
    MalformedTable(String),

    #[error("label `{0}` does not follow a block that can carry a label")]
    DetachedLabel(String),

    #[error("block already carries label `{existing}`, cannot attach `{extra}`")]
    DuplicateBlockLabel { existing: String, extra: String },

    #[error("invalid BibTeX: {0}")]
    BibTeX(String),
}

/// Errors that occur during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("duplicate label `{label}` (first defined at {first}, again at {second})")]
    DuplicateLabel {
        label: String,
        first: Position,
        second: Position,
    },

    #[error("circular macro definition: {chain}")]
    MacroCycle { chain: String },

    #[error("unknown reference label `{label}` at {position}")]
    UnknownReference { label: String, position: Position },

    #[error("unknown citation key `{key}` at {position}")]
    UnknownCitation { key: String, position: Position },
}

/// All fatal resolution errors found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveErrors(pub Vec<ResolveError>);

impl ResolveErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, ResolveError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResolveErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveErrors {}

impl From<ResolveError> for ResolveErrors {
    fn from(err: ResolveError) -> Self {
        Self(vec![err])
    }
}

impl<'a> IntoIterator for &'a ResolveErrors {
    type Item = &'a ResolveError;
    type IntoIter = std::slice::Iter<'a, ResolveError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors that occur during rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unsupported math construct `{construct}` in `{latex}`")]
    UnsupportedMath { construct: String, latex: String },

    #[error("malformed math ({message}) in `{latex}`")]
    MalformedMath { message: String, latex: String },

    #[error("strict mode: {} unresolved diagnostic(s): {}", diagnostics.len(), diagnostics.join("; "))]
    StrictMode { diagnostics: Vec<String> },
}
