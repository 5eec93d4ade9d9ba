//! Inline-level parsing for Markdown.
//!
//! A single left-to-right scan over a text span. At each position the
//! constructs are tried in priority order: label, math, citation,
//! cross-reference, footnote, strong/emphasis, then the plain Markdown
//! spans. Anything else accumulates into a text run.

use crate::ast::{Citation, CiteItem, CrossReference, Footnote, FootnoteKind, Inline};
use crate::error::{ParseError, ParseErrorKind, Position};
use crate::parser::lexer::{cross_reference, footnote_reference, inline_code, label_token};
use crate::parser::ParseResult;
use nom::Offset;

/// Maps byte offsets of a (possibly multi-line) text back to source positions.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceMap {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    offset: usize,
    start: Position,
}

impl SourceMap {
    /// A map for text that starts at `start` and continues on one line.
    pub fn at(start: Position) -> Self {
        Self {
            segments: vec![Segment { offset: 0, start }],
        }
    }

    /// Record that the text from byte `offset` onwards began at `start`.
    pub fn push(&mut self, offset: usize, start: Position) {
        self.segments.push(Segment { offset, start });
    }

    pub fn position(&self, text: &str, offset: usize) -> Position {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.offset <= offset)
            .copied()
            .unwrap_or(Segment {
                offset: 0,
                start: Position::new(1, 1),
            });
        let columns = text
            .get(segment.offset..offset)
            .map_or(0, |t| t.chars().count());
        Position::new(segment.start.line, segment.start.column + columns)
    }
}

/// Parse inline content from a string. Positions are reported relative to
/// line 1, column 1 of `input`.
pub fn parse_inlines(input: &str) -> ParseResult<Vec<Inline>> {
    let mut map = SourceMap::default();
    let mut offset = 0;
    for (i, line) in input.split('\n').enumerate() {
        map.push(offset, Position::line_start(i + 1));
        offset += line.len() + 1;
    }
    parse_mapped(input, &map)
}

/// Parse inline content whose source positions are described by `map`.
pub(crate) fn parse_mapped(text: &str, map: &SourceMap) -> ParseResult<Vec<Inline>> {
    InlineParser { text, map }.parse_span(0, text.len())
}

struct InlineParser<'a> {
    text: &'a str,
    map: &'a SourceMap,
}

impl<'a> InlineParser<'a> {
    fn position(&self, offset: usize) -> Position {
        self.map.position(self.text, offset)
    }

    fn error(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.position(offset), kind)
    }

    fn parse_span(&self, start: usize, end: usize) -> ParseResult<Vec<Inline>> {
        let mut inlines = Vec::new();
        let mut text = String::new();
        let mut pos = start;

        while pos < end {
            let rest = &self.text[pos..end];
            let Some(c) = rest.chars().next() else {
                break;
            };

            if c == '\\' {
                match rest[1..].chars().next() {
                    Some('\n') => {
                        flush_text(&mut text, &mut inlines);
                        inlines.push(Inline::HardBreak);
                        pos += 2;
                        continue;
                    }
                    Some(next) if next.is_ascii_punctuation() => {
                        text.push(next);
                        pos += 1 + next.len_utf8();
                        continue;
                    }
                    _ => {}
                }
            }

            if c == '\n' {
                let hard = text.ends_with("  ");
                let kept = text.trim_end_matches(&[' ', '\t'][..]).len();
                text.truncate(kept);
                flush_text(&mut text, &mut inlines);
                inlines.push(if hard {
                    Inline::HardBreak
                } else {
                    Inline::SoftBreak
                });
                pos += 1;
                continue;
            }

            let prev = self.text[..pos].chars().next_back();
            if let Some((inline, consumed)) = self.try_construct(rest, pos, prev)? {
                flush_text(&mut text, &mut inlines);
                inlines.push(inline);
                pos += consumed;
            } else {
                text.push(c);
                pos += c.len_utf8();
            }
        }

        flush_text(&mut text, &mut inlines);
        Ok(inlines)
    }

    fn try_construct(
        &self,
        rest: &str,
        pos: usize,
        prev: Option<char>,
    ) -> ParseResult<Option<(Inline, usize)>> {
        match rest.as_bytes()[0] {
            b'{' => Ok(label_token(rest)
                .ok()
                .map(|(after, id)| (Inline::Label(id.to_string()), rest.offset(after)))),
            b'$' => self.math(rest, pos).map(Some),
            b'[' if rest.starts_with("[@") => self.citation(rest, pos).map(Some),
            b'[' if rest.starts_with("[^") => Ok(footnote_reference(rest).ok().map(|(after, id)| {
                let footnote =
                    Footnote::new(FootnoteKind::Reference(id.to_string()), self.position(pos));
                (Inline::Footnote(footnote), rest.offset(after))
            })),
            b'[' => self.link(rest, pos),
            b'@' if !prev.map_or(false, |p| p.is_alphanumeric()) => {
                Ok(cross_reference(rest).ok().map(|(after, label)| {
                    let reference = CrossReference::new(label, self.position(pos));
                    (Inline::Reference(reference), rest.offset(after))
                }))
            }
            b'^' if rest.starts_with("^[") => self.inline_footnote(rest, pos),
            b'*' | b'_' => self.emphasis(rest, pos, prev),
            b'~' if rest.starts_with("~~") => {
                match find_closing(rest, "~~", 2) {
                    Some(close) => {
                        let inner = self.parse_span(pos + 2, pos + close)?;
                        Ok(Some((Inline::Strikethrough(inner), close + 2)))
                    }
                    None => Ok(None),
                }
            }
            b'`' => Ok(inline_code(rest)
                .ok()
                .map(|(after, code)| (Inline::Code(code.to_string()), rest.offset(after)))),
            b'!' if rest.starts_with("![") => Ok(self.image(rest)),
            _ => Ok(None),
        }
    }

    fn math(&self, rest: &str, pos: usize) -> ParseResult<(Inline, usize)> {
        let delim = if rest.starts_with("$$") { "$$" } else { "$" };
        let body = &rest[delim.len()..];
        match find_unescaped(body, delim) {
            Some(close) => {
                let content = &body[..close];
                let content = if delim.len() == 2 { content.trim() } else { content };
                let math = Inline::InlineMath {
                    latex: content.to_string(),
                    position: self.position(pos),
                };
                Ok((math, delim.len() * 2 + close))
            }
            None => Err(self.error(pos, ParseErrorKind::UnterminatedMath)),
        }
    }

    fn citation(&self, rest: &str, pos: usize) -> ParseResult<(Inline, usize)> {
        let close = rest
            .find(']')
            .ok_or_else(|| self.error(pos, ParseErrorKind::UnterminatedCitation))?;
        let items = parse_cite_items(&rest[1..close]);
        if items.is_empty() {
            return Err(self.error(pos, ParseErrorKind::EmptyCitation));
        }
        let citation = Citation {
            items,
            position: self.position(pos),
        };
        Ok((Inline::Citation(citation), close + 1))
    }

    fn inline_footnote(&self, rest: &str, pos: usize) -> ParseResult<Option<(Inline, usize)>> {
        let Some(close) = matching_bracket(rest, 1, '[', ']') else {
            return Ok(None);
        };
        let content = self.parse_span(pos + 2, pos + close)?;
        let footnote = Footnote::new(FootnoteKind::Inline(content), self.position(pos));
        Ok(Some((Inline::Footnote(footnote), close + 1)))
    }

    fn emphasis(
        &self,
        rest: &str,
        pos: usize,
        prev: Option<char>,
    ) -> ParseResult<Option<(Inline, usize)>> {
        let marker = if rest.starts_with('*') { "*" } else { "_" };
        // `snake_case_words` are not emphasis
        if marker == "_" && prev.map_or(false, |p| p.is_alphanumeric()) {
            return Ok(None);
        }

        let double = format!("{marker}{marker}");
        let delim = if rest.starts_with(&double) {
            double.as_str()
        } else {
            marker
        };
        let opens = rest[delim.len()..]
            .chars()
            .next()
            .map_or(false, |c| !c.is_whitespace());
        if !opens {
            return Ok(None);
        }

        let Some(close) = find_closing(rest, delim, delim.len()) else {
            return Ok(None);
        };
        if marker == "_" {
            let after = rest[close + delim.len()..].chars().next();
            if after.map_or(false, |c| c.is_alphanumeric()) {
                return Ok(None);
            }
        }

        let inner = self.parse_span(pos + delim.len(), pos + close)?;
        let inline = if delim.len() == 2 {
            Inline::Strong(inner)
        } else {
            Inline::Emphasis(inner)
        };
        Ok(Some((inline, close + delim.len())))
    }

    fn link(&self, rest: &str, pos: usize) -> ParseResult<Option<(Inline, usize)>> {
        let Some(text_end) = matching_bracket(rest, 0, '[', ']') else {
            return Ok(None);
        };
        let after_text = &rest[text_end + 1..];
        if !after_text.starts_with('(') {
            return Ok(None);
        }
        let Some(url_end) = matching_bracket(after_text, 0, '(', ')') else {
            return Ok(None);
        };

        let (url, title) = parse_url_and_title(&after_text[1..url_end]);
        let content = self.parse_span(pos + 1, pos + text_end)?;
        Ok(Some((
            Inline::Link {
                url: url.to_string(),
                title: title.map(String::from),
                content,
            },
            text_end + 1 + url_end + 1,
        )))
    }

    fn image(&self, rest: &str) -> Option<(Inline, usize)> {
        let alt_end = matching_bracket(rest, 1, '[', ']')?;
        let after_alt = &rest[alt_end + 1..];
        if !after_alt.starts_with('(') {
            return None;
        }
        let url_end = matching_bracket(after_alt, 0, '(', ')')?;
        let (url, title) = parse_url_and_title(&after_alt[1..url_end]);
        Some((
            Inline::Image {
                url: url.to_string(),
                alt: rest[2..alt_end].to_string(),
                title: title.map(String::from),
            },
            alt_end + 1 + url_end + 1,
        ))
    }
}

fn flush_text(text: &mut String, inlines: &mut Vec<Inline>) {
    if !text.is_empty() {
        inlines.push(Inline::Text(std::mem::take(text)));
    }
}

/// `@key1, locator; @key2` into cite items. Keys without `@` are accepted
/// after the first.
fn parse_cite_items(body: &str) -> Vec<CiteItem> {
    body.split(';')
        .filter_map(|part| {
            let part = part.trim();
            let part = part.strip_prefix('@').unwrap_or(part);
            let key_end = part
                .find(|c: char| c == ',' || c.is_whitespace())
                .unwrap_or(part.len());
            let key = &part[..key_end];
            if key.is_empty() {
                return None;
            }
            let locator = part[key_end..]
                .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
                .trim_end();
            let locator = (!locator.is_empty()).then(|| locator.to_string());
            Some(CiteItem::new(key, locator))
        })
        .collect()
}

/// Byte index of the first `needle` in `hay` not preceded by a backslash.
fn find_unescaped(hay: &str, needle: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in hay.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if hay[i..].starts_with(needle) {
            return Some(i);
        }
    }
    None
}

/// Find the closing delimiter for an emphasis-like span opened at the start
/// of `rest`. A single `*` does not close on half of a `**`.
fn find_closing(rest: &str, delim: &str, from: usize) -> Option<usize> {
    let marker = delim.chars().next()?;
    let mut i = from;
    while let Some(found) = rest.get(i..).and_then(|s| find_unescaped(s, delim)) {
        let mut at = i + found;
        // `***` closes the inner span first, then the double delimiter
        while delim.len() == 2 && rest[at + 2..].starts_with(marker) {
            at += marker.len_utf8();
        }
        let before = rest[..at].chars().next_back();
        let after = rest[at + delim.len()..].chars().next();
        let doubled = delim.len() == 1 && (before == Some(marker) || after == Some(marker));
        let closes = at > from && before.map_or(false, |c| !c.is_whitespace());
        if closes && !doubled {
            return Some(at);
        }
        i = at + delim.len();
    }
    None
}

/// Index of the bracket closing the one at byte `open` in `s`.
fn matching_bracket(s: &str, open: usize, left: char, right: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in s.get(open..)?.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == left => depth += 1,
            c if c == right => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_url_and_title(input: &str) -> (&str, Option<&str>) {
    let input = input.trim();
    for quote in ['"', '\''] {
        if let Some(start) = input.find(quote) {
            if let Some(len) = input[start + 1..].find(quote) {
                return (
                    input[..start].trim(),
                    Some(&input[start + 1..start + 1 + len]),
                );
            }
        }
    }
    (input, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_inlines("Hello, world!").unwrap(), vec![text("Hello, world!")]);
    }

    #[test]
    fn test_emphasis_and_strong() {
        let inlines = parse_inlines("a *b* and **c *d***").unwrap();
        assert_eq!(
            inlines,
            vec![
                text("a "),
                Inline::Emphasis(vec![text("b")]),
                text(" and "),
                Inline::Strong(vec![text("c "), Inline::Emphasis(vec![text("d")])]),
            ]
        );
    }

    #[test]
    fn test_arithmetic_is_not_emphasis() {
        assert_eq!(parse_inlines("2 * 3 * 4").unwrap(), vec![text("2 * 3 * 4")]);
        assert_eq!(
            parse_inlines("snake_case_name").unwrap(),
            vec![text("snake_case_name")]
        );
    }

    #[test]
    fn test_inline_math() {
        let inlines = parse_inlines("The equation $E = mc^2$ is famous.").unwrap();
        assert_eq!(
            inlines[1],
            Inline::InlineMath {
                latex: "E = mc^2".into(),
                position: Position::new(1, 14),
            }
        );
    }

    #[test]
    fn test_escaped_dollar_inside_math() {
        let inlines = parse_inlines("$a \\$ b$").unwrap();
        assert_eq!(
            inlines,
            vec![Inline::InlineMath {
                latex: "a \\$ b".into(),
                position: Position::new(1, 1),
            }]
        );
    }

    #[test]
    fn test_escaped_dollar_is_text() {
        assert_eq!(parse_inlines("costs \\$5").unwrap(), vec![text("costs $5")]);
    }

    #[test]
    fn test_unterminated_math_points_at_opening() {
        let err = parse_inlines("first line\nthen $x + y").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedMath);
        assert_eq!(err.position, Position::new(2, 6));
    }

    #[test]
    fn test_citation_items() {
        let inlines = parse_inlines("As shown [@knuth1984, p. 42; @lamport1994].").unwrap();
        let Inline::Citation(cite) = &inlines[1] else {
            panic!("expected citation, got {:?}", inlines[1]);
        };
        assert_eq!(
            cite.items,
            vec![
                CiteItem::new("knuth1984", Some("p. 42".into())),
                CiteItem::new("lamport1994", None),
            ]
        );
        assert_eq!(cite.position, Position::new(1, 10));
    }

    #[test]
    fn test_citation_errors() {
        let err = parse_inlines("see [@open").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedCitation);
        assert_eq!(err.position, Position::new(1, 5));

        let err = parse_inlines("see [@ ]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyCitation);
    }

    #[test]
    fn test_reference() {
        let inlines = parse_inlines("See @eq:euler.").unwrap();
        assert_eq!(
            inlines,
            vec![
                text("See "),
                Inline::Reference(CrossReference::new("eq:euler", Position::new(1, 5))),
                text("."),
            ]
        );
    }

    #[test]
    fn test_email_is_not_reference() {
        assert_eq!(
            parse_inlines("mail me@example.com").unwrap(),
            vec![text("mail me@example.com")]
        );
    }

    #[test]
    fn test_footnotes() {
        let inlines = parse_inlines("Text^[A *note*] and[^ref].").unwrap();
        assert_eq!(
            inlines,
            vec![
                text("Text"),
                Inline::Footnote(Footnote::new(
                    FootnoteKind::Inline(vec![text("A "), Inline::Emphasis(vec![text("note")])]),
                    Position::new(1, 5),
                )),
                text(" and"),
                Inline::Footnote(Footnote::new(
                    FootnoteKind::Reference("ref".into()),
                    Position::new(1, 20),
                )),
                text("."),
            ]
        );
    }

    #[test]
    fn test_label_attachment() {
        let inlines = parse_inlines("Caption {#fig:a}").unwrap();
        assert_eq!(inlines, vec![text("Caption "), Inline::Label("fig:a".into())]);
    }

    #[test]
    fn test_link_and_image() {
        let inlines = parse_inlines("[here](https://example.com \"Title\") ![cat](cat.png)").unwrap();
        assert_eq!(
            inlines,
            vec![
                Inline::Link {
                    url: "https://example.com".into(),
                    title: Some("Title".into()),
                    content: vec![text("here")],
                },
                text(" "),
                Inline::Image {
                    url: "cat.png".into(),
                    alt: "cat".into(),
                    title: None,
                },
            ]
        );
    }

    #[test]
    fn test_code_and_strikethrough() {
        let inlines = parse_inlines("`$x$` ~~old~~").unwrap();
        assert_eq!(
            inlines,
            vec![
                Inline::Code("$x$".into()),
                text(" "),
                Inline::Strikethrough(vec![text("old")]),
            ]
        );
    }

    #[test]
    fn test_line_breaks() {
        let inlines = parse_inlines("one\ntwo  \nthree").unwrap();
        assert_eq!(
            inlines,
            vec![
                text("one"),
                Inline::SoftBreak,
                text("two"),
                Inline::HardBreak,
                text("three"),
            ]
        );
    }
}
