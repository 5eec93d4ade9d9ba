//! Parser for extended Markdown with LaTeX-style features.

mod block;
mod inline;
mod lexer;

pub use block::parse_blocks;
pub use inline::parse_inlines;

use crate::ast::{Document, Macro, Metadata};
use crate::error::{ParseError, ParseErrorKind, Position};
use block::{lines_of, parse_lines, Line};
use lexer::front_matter_fence;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Result of the parsing stage; parse errors are always fatal.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a complete document from source text.
pub fn parse(input: &str) -> ParseResult<Document> {
    let lines = lines_of(input, 1);
    let (metadata, body_start) = parse_front_matter(&lines)?;
    let blocks = parse_lines(&lines[body_start..])?;

    tracing::debug!(
        blocks = blocks.len(),
        macros = metadata.macros.len(),
        "parsed document"
    );
    Ok(Document { metadata, blocks })
}

/// Parse TOML front matter delimited by `+++`. Returns the metadata and the
/// index of the first body line.
fn parse_front_matter(lines: &[Line]) -> ParseResult<(Metadata, usize)> {
    let Some(open) = lines.iter().position(|l| !l.text.trim().is_empty()) else {
        return Ok((Metadata::default(), 0));
    };
    if front_matter_fence(lines[open].text.trim_start()).is_err() {
        return Ok((Metadata::default(), 0));
    }

    let close = lines[open + 1..]
        .iter()
        .position(|l| front_matter_fence(l.text.trim_start()).is_ok())
        .map(|i| open + 1 + i)
        .ok_or_else(|| {
            ParseError::new(
                lines[open].position(),
                ParseErrorKind::UnterminatedFrontMatter,
            )
        })?;

    let source = lines[open + 1..close]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n");
    let raw: RawFrontMatter = toml::from_str(&source).map_err(|e| {
        ParseError::new(
            toml_error_position(&source, &e, lines[open].number + 1),
            ParseErrorKind::FrontMatter(e.message().to_string()),
        )
    })?;

    Ok((raw.into_metadata(), close + 1))
}

fn toml_error_position(source: &str, error: &toml::de::Error, first_line: usize) -> Position {
    let Some(span) = error.span() else {
        return Position::line_start(first_line);
    };
    let before = source.get(..span.start).unwrap_or(source);
    let line = before.matches('\n').count();
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    Position::new(first_line + line, column)
}

/// Raw front matter structure for deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawFrontMatter {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    author: Option<String>,
    /// A quoted string or a bare TOML date
    date: Option<toml::Value>,
    keywords: Vec<String>,
    institution: Option<String>,
    macros: BTreeMap<String, String>,
    bibliography: Option<BibliographyConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BibliographyConfig {
    Path(String),
    Config { path: String },
}

impl RawFrontMatter {
    fn into_metadata(self) -> Metadata {
        let mut authors = self.authors;
        if let Some(author) = self.author {
            if authors.is_empty() {
                authors.push(author);
            }
        }

        let date = self.date.map(|value| match value {
            toml::Value::String(s) => s,
            toml::Value::Datetime(d) => d.to_string(),
            other => other.to_string(),
        });

        let bibliography_path = self.bibliography.map(|b| match b {
            BibliographyConfig::Path(path) | BibliographyConfig::Config { path } => path,
        });

        Metadata {
            title: self.title,
            subtitle: self.subtitle,
            authors,
            date,
            keywords: self.keywords,
            institution: self.institution,
            macros: self
                .macros
                .into_iter()
                .map(|(name, template)| (name, Macro::new(template)))
                .collect(),
            bibliography_path,
        }
    }
}
