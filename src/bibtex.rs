//! BibTeX parser for bibliography support.
//!
//! Produces a [`Bibliography`]: citation key to entry record, where each
//! entry is its type, its parsed author list, and the remaining fields by
//! lowercase name.

use crate::error::{ParseError, ParseErrorKind, Position};
use crate::parser::ParseResult;
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    sequence::preceded,
    IResult, Offset,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single bibliography entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BibEntry {
    pub key: String,
    /// Lowercase entry type (`article`, `book`, ...)
    pub entry_type: String,
    /// Authors in declaration order, as written
    pub authors: Vec<String>,
    /// All fields other than `author`, by lowercase name
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into(),
            ..Default::default()
        }
    }

    /// Set a field, parsing `author` into the author list.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_field(name, value.into());
        self
    }

    fn set_field(&mut self, name: &str, value: String) {
        let name = name.to_lowercase();
        if name == "author" {
            self.authors = parse_authors(&value);
        } else {
            self.fields.insert(name, value);
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title")
    }

    pub fn year(&self) -> Option<&str> {
        self.field("year")
    }

    /// Journal or proceedings title, whichever the entry carries.
    pub fn venue(&self) -> Option<&str> {
        self.field("journal").or_else(|| self.field("booktitle"))
    }
}

/// Citation key to entry mapping, consumed read-only by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    entries: BTreeMap<String, BibEntry>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert an entry, returning the one it replaced.
    pub fn insert(&mut self, entry: BibEntry) -> Option<BibEntry> {
        self.entries.insert(entry.key.clone(), entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &BibEntry> {
        self.entries.values()
    }
}

impl FromIterator<BibEntry> for Bibliography {
    fn from_iter<I: IntoIterator<Item = BibEntry>>(iter: I) -> Self {
        let mut bibliography = Bibliography::new();
        for entry in iter {
            bibliography.insert(entry);
        }
        bibliography
    }
}

enum Item {
    Entry(BibEntry),
    Abbreviation(String, String),
    Skipped,
}

/// Parse a BibTeX file and return a map of citation keys to entries.
pub fn parse_bibtex(input: &str) -> ParseResult<Bibliography> {
    let mut bibliography = Bibliography::new();
    let mut strings = month_abbreviations();
    let mut remaining = skip_outside_entries(input);

    while !remaining.is_empty() {
        let position = position_of(input, remaining);
        let (rest, item) = parse_item(remaining, &strings)
            .map_err(|message| ParseError::new(position, ParseErrorKind::BibTeX(message)))?;

        match item {
            Item::Entry(entry) => {
                if let Some(previous) = bibliography.insert(entry) {
                    tracing::warn!(key = %previous.key, line = position.line, "duplicate BibTeX key, keeping the later entry");
                }
            }
            Item::Abbreviation(name, value) => {
                strings.insert(name, value);
            }
            Item::Skipped => {}
        }
        remaining = skip_outside_entries(rest);
    }

    tracing::debug!(entries = bibliography.len(), "parsed bibliography");
    Ok(bibliography)
}

fn position_of(input: &str, rest: &str) -> Position {
    let before = &input[..input.offset(rest)];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    Position::new(line, column)
}

/// Skip `%` comment lines and any text between entries.
fn skip_outside_entries(input: &str) -> &str {
    let mut s = input;
    loop {
        s = s.trim_start();
        if s.is_empty() || s.starts_with('@') {
            return s;
        }
        match s.find('\n') {
            Some(end) => s = &s[end + 1..],
            None => return "",
        }
    }
}

fn expect<'a, O>(result: IResult<&'a str, O>, what: &str) -> Result<(&'a str, O), String> {
    result.map_err(|_| format!("expected {what}"))
}

fn parse_item<'a>(
    input: &'a str,
    strings: &BTreeMap<String, String>,
) -> Result<(&'a str, Item), String> {
    let (input, kind) = expect(
        preceded(char('@'), take_while1(|c: char| c.is_ascii_alphabetic()))(input),
        "an entry type after `@`",
    )?;
    let kind = kind.to_ascii_lowercase();
    let input = input.trim_start();

    let close = match input.chars().next() {
        Some('{') => '}',
        Some('(') => ')',
        _ => return Err(format!("expected `{{` after `@{kind}`")),
    };
    let end = matching_close(input, close).ok_or_else(|| format!("unterminated @{kind} entry"))?;
    let body = &input[1..end];
    let rest = &input[end + 1..];

    let item = match kind.as_str() {
        "comment" | "preamble" => Item::Skipped,
        "string" => {
            let (_, (name, value)) = parse_field(body.trim(), strings)?;
            Item::Abbreviation(name, value)
        }
        _ => Item::Entry(parse_entry_body(body, &kind, strings)?),
    };
    Ok((rest, item))
}

/// Index of the delimiter closing the entry opened at the start of `input`.
fn matching_close(input: &str, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if close == '}' && depth == 0 {
                    return Some(i);
                }
            }
            ')' if close == ')' && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_entry_body(
    body: &str,
    entry_type: &str,
    strings: &BTreeMap<String, String>,
) -> Result<BibEntry, String> {
    let (key, mut input) = match body.find(',') {
        Some(comma) => (body[..comma].trim(), &body[comma + 1..]),
        None => (body.trim(), ""),
    };
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("missing citation key in @{entry_type} entry"));
    }

    let mut entry = BibEntry::new(key, entry_type);
    loop {
        input = input.trim_start();
        if input.is_empty() {
            break;
        }
        let (rest, (name, value)) = parse_field(input, strings)?;
        entry.set_field(&name, value);

        input = rest.trim_start();
        match input.strip_prefix(',') {
            Some(after) => input = after,
            None if input.is_empty() => break,
            None => return Err(format!("expected `,` after field `{name}` in `{key}`")),
        }
    }
    Ok(entry)
}

/// `name = part # part # ...`
fn parse_field<'a>(
    input: &'a str,
    strings: &BTreeMap<String, String>,
) -> Result<(&'a str, (String, String)), String> {
    let (input, name) = expect(
        take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))(input),
        "a field name",
    )?;
    let (input, _) = expect(char('=')(input.trim_start()), &format!("`=` after `{name}`"))?;

    let mut value = String::new();
    let mut input = input.trim_start();
    loop {
        let (rest, part) = parse_value_part(input, strings)?;
        value.push_str(&part);
        match rest.trim_start().strip_prefix('#') {
            Some(next) => input = next.trim_start(),
            None => {
                input = rest;
                break;
            }
        }
    }

    Ok((input, (name.to_lowercase(), clean_bibtex_value(&value))))
}

fn parse_value_part<'a>(
    input: &'a str,
    strings: &BTreeMap<String, String>,
) -> Result<(&'a str, String), String> {
    match input.chars().next() {
        Some('{') => {
            let end = matching_close(input, '}').ok_or("unterminated `{` in field value")?;
            Ok((&input[end + 1..], input[1..end].to_string()))
        }
        Some('"') => {
            let body = &input[1..];
            let mut depth = 0usize;
            for (i, c) in body.char_indices() {
                match c {
                    '{' => depth += 1,
                    '}' => depth = depth.saturating_sub(1),
                    '"' if depth == 0 => return Ok((&body[i + 1..], body[..i].to_string())),
                    _ => {}
                }
            }
            Err("unterminated `\"` in field value".to_string())
        }
        Some(c) if c.is_ascii_digit() => {
            let (rest, digits) = expect(digit1(input), "a number")?;
            Ok((rest, digits.to_string()))
        }
        Some(c) if c.is_alphabetic() => {
            let (rest, name) = expect(
                take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-'))(input),
                "an abbreviation",
            )?;
            let value = strings
                .get(&name.to_lowercase())
                .cloned()
                .unwrap_or_else(|| name.to_string());
            Ok((rest, value))
        }
        _ => Err("expected a field value".to_string()),
    }
}

fn month_abbreviations() -> BTreeMap<String, String> {
    [
        ("jan", "January"),
        ("feb", "February"),
        ("mar", "March"),
        ("apr", "April"),
        ("may", "May"),
        ("jun", "June"),
        ("jul", "July"),
        ("aug", "August"),
        ("sep", "September"),
        ("oct", "October"),
        ("nov", "November"),
        ("dec", "December"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Strip case-protecting braces (but keep `{\cmd ...}` groups) and collapse
/// whitespace.
fn clean_bibtex_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut kept = Vec::new();
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let command = chars.peek() == Some(&'\\');
                kept.push(command);
                if command {
                    result.push(c);
                }
            }
            '}' => {
                if kept.pop() == Some(true) {
                    result.push(c);
                }
            }
            _ => result.push(c),
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Authors are separated by ` and `.
fn parse_authors(input: &str) -> Vec<String> {
    input
        .split(" and ")
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_entry() {
        let input = r#"
@article{knuth1984,
    author = {Donald E. Knuth},
    title = {Literate Programming},
    journal = {The Computer Journal},
    year = 1984,
    pages = {97--111}
}
"#;

        let bib = parse_bibtex(input).unwrap();
        assert_eq!(bib.len(), 1);

        let entry = bib.get("knuth1984").unwrap();
        assert_eq!(entry.entry_type, "article");
        assert_eq!(entry.title(), Some("Literate Programming"));
        assert_eq!(entry.authors, vec!["Donald E. Knuth"]);
        assert_eq!(entry.year(), Some("1984"));
        assert_eq!(entry.venue(), Some("The Computer Journal"));
        assert_eq!(entry.field("pages"), Some("97--111"));
    }

    #[test]
    fn test_parse_multiple_authors() {
        let input = "@book{dragon2006, author = {Alfred V. Aho and Monica S. Lam and Ravi Sethi and Jeffrey D. Ullman}, year = {2006}}";
        let bib = parse_bibtex(input).unwrap();
        assert_eq!(bib.get("dragon2006").unwrap().authors.len(), 4);
    }

    #[test]
    fn test_strings_concatenation_and_comments() {
        let input = r#"
% A leading comment with an @ sign
@string{ acm = "ACM Press" }
@comment{ ignored {nested} }
@preamble{ "\newcommand{\noop}[1]{}" }

@InProceedings(lamport1994,
  Author = "Leslie Lamport",
  Title = "{LaTeX}: A Document " # "Preparation System",
  Publisher = acm,
  Month = jun,
)
"#;

        let bib = parse_bibtex(input).unwrap();
        assert_eq!(bib.len(), 1);
        let entry = bib.get("lamport1994").unwrap();
        assert_eq!(entry.entry_type, "inproceedings");
        assert_eq!(entry.title(), Some("LaTeX: A Document Preparation System"));
        assert_eq!(entry.field("publisher"), Some("ACM Press"));
        assert_eq!(entry.field("month"), Some("June"));
    }

    #[test]
    fn test_unterminated_entry_reports_line() {
        let input = "@article{ok, title = {Fine}}\n\n@book{broken,\n  title = {Never closed}\n";
        let err = parse_bibtex(input).unwrap_err();
        assert_eq!(err.position.line, 3);
        assert!(matches!(err.kind, ParseErrorKind::BibTeX(ref m) if m.contains("unterminated")));
    }

    #[test]
    fn test_missing_equals_is_an_error() {
        let err = parse_bibtex("@misc{x, title {oops}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BibTeX(_)));
    }

    #[test]
    fn test_clean_bibtex_value() {
        assert_eq!(clean_bibtex_value("{DNA} Sequencing"), "DNA Sequencing");
        assert_eq!(clean_bibtex_value("The  {Art} of\n  Programming"), "The Art of Programming");
        assert_eq!(clean_bibtex_value("M{\\\"o}bius"), "M{\\\"o}bius");
    }
}
