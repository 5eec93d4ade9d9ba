//! Block-level parsing for Markdown.
//!
//! Works line by line. Each `try_parse_*` function inspects the lines at the
//! cursor and either claims some of them for one block or declines, in which
//! case the next construct is tried. Paragraphs are the fallback.

use crate::ast::{Alignment, Block, EnvironmentKind, Inline, Label, ListItem};
use crate::error::{ParseError, ParseErrorKind, Position};
use crate::parser::inline::{parse_mapped, SourceMap};
use crate::parser::lexer::{
    block_quote, code_fence, environment_close, environment_open, extract_label,
    footnote_definition, front_matter_fence, heading, html_block_start, indentation, label_token,
    list_marker, table_caption, thematic_break, toc_marker, ListMarker,
};
use crate::parser::ParseResult;
use nom::Offset;

/// One source line together with where it starts in the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    pub text: &'a str,
    pub number: usize,
    /// 1-based column of the first character of `text`.
    pub column: usize,
}

impl<'a> Line<'a> {
    pub fn new(text: &'a str, number: usize) -> Self {
        Self {
            text,
            number,
            column: 1,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.number, self.column)
    }

    /// Drop the first `bytes` bytes of the line.
    fn advance(&self, bytes: usize) -> Line<'a> {
        let bytes = bytes.min(self.text.len());
        Line {
            text: &self.text[bytes..],
            number: self.number,
            column: self.column + self.text[..bytes].chars().count(),
        }
    }

    fn trim_start(&self) -> Line<'a> {
        self.advance(self.text.len() - self.text.trim_start().len())
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Split source text into numbered lines, the first numbered `first_number`.
pub(crate) fn lines_of(input: &str, first_number: usize) -> Vec<Line<'_>> {
    input
        .lines()
        .enumerate()
        .map(|(i, text)| Line::new(text, first_number + i))
        .collect()
}

/// Parse all blocks from content.
pub fn parse_blocks(input: &str) -> ParseResult<Vec<Block>> {
    parse_lines(&lines_of(input, 1))
}

pub(crate) fn parse_lines(lines: &[Line]) -> ParseResult<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim_start();

        if line.is_blank() {
            i += 1;
            continue;
        }

        if front_matter_fence(line.text).is_ok() {
            return Err(ParseError::new(
                line.position(),
                ParseErrorKind::MisplacedFrontMatter,
            ));
        }

        if let Some(label) = standalone_label(line, lines.get(i + 1)) {
            attach_label(&mut blocks, label)?;
            i += 1;
            continue;
        }

        if let Some((block, consumed)) = try_parse_heading(line)? {
            blocks.push(block);
            i += consumed;
        } else if thematic_break(line.text).is_ok() {
            blocks.push(Block::ThematicBreak);
            i += 1;
        } else if toc_marker(line.text).is_ok() {
            blocks.push(Block::TableOfContents);
            i += 1;
        } else if let Some((block, consumed)) = try_parse_fenced_code(&lines[i..]) {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_display_math(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_environment(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_footnote_definition(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_block_quote(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_list(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_table(&lines[i..])? {
            blocks.push(block);
            i += consumed;
        } else if let Some((block, consumed)) = try_parse_html(&lines[i..]) {
            blocks.push(block);
            i += consumed;
        } else {
            let (block, consumed) = parse_paragraph(&lines[i..])?;
            blocks.push(block);
            i += consumed;
        }
    }

    Ok(blocks)
}

/// Whether a line opens a block construct that interrupts a paragraph.
fn starts_block(text: &str) -> bool {
    heading(text).is_ok()
        || thematic_break(text).is_ok()
        || toc_marker(text).is_ok()
        || code_fence(text).is_ok()
        || text.starts_with("$$")
        || text.starts_with(":::")
        || text.starts_with('>')
        || footnote_definition(text).is_ok()
        || front_matter_fence(text).is_ok()
}

/// Only bullets and lists starting at 1 may interrupt a paragraph.
fn interrupts_paragraph(text: &str) -> bool {
    matches!(
        list_marker(text),
        Ok((_, ListMarker::Bullet | ListMarker::Task(_) | ListMarker::Ordered(1)))
    )
}

/// A `{#label}` line standing alone as its own paragraph.
fn standalone_label(line: Line, next: Option<&Line>) -> Option<Label> {
    let (rest, id) = label_token(line.text).ok()?;
    let alone = rest.trim().is_empty() && next.map_or(true, |n| n.is_blank());
    alone.then(|| Label::new(id, line.position()))
}

fn attach_label(blocks: &mut [Block], label: Label) -> ParseResult<()> {
    let position = label.position;
    let Some(slot) = blocks.last_mut().and_then(Block::label_slot) else {
        return Err(ParseError::new(
            position,
            ParseErrorKind::DetachedLabel(label.id),
        ));
    };
    if let Some(existing) = slot {
        return Err(ParseError::new(
            position,
            ParseErrorKind::DuplicateBlockLabel {
                existing: existing.id.clone(),
                extra: label.id,
            },
        ));
    }
    *slot = Some(label);
    Ok(())
}

/// Where `{#id}` was written on `line`, falling back to the line start.
fn label_position(line: &Line, id: &str) -> Position {
    match line.text.find(&format!("{{#{id}}}")) {
        Some(at) => line.advance(at).position(),
        None => line.position(),
    }
}

/// Remove label attachments from a block's own inline content and return
/// the single label they name.
fn take_label(inlines: &mut Vec<Inline>, line: &Line) -> ParseResult<Option<Label>> {
    let mut ids = Vec::new();
    inlines.retain(|inline| match inline {
        Inline::Label(id) => {
            ids.push(id.clone());
            false
        }
        _ => true,
    });

    let mut ids = ids.into_iter();
    let Some(id) = ids.next() else {
        return Ok(None);
    };
    if let Some(extra) = ids.next() {
        return Err(ParseError::new(
            label_position(line, &extra),
            ParseErrorKind::DuplicateBlockLabel {
                existing: id,
                extra,
            },
        ));
    }

    if let Some(Inline::Text(t)) = inlines.last_mut() {
        let len = t.trim_end().len();
        t.truncate(len);
    }
    if matches!(inlines.last(), Some(Inline::Text(t)) if t.is_empty()) {
        inlines.pop();
    }
    if let Some(Inline::Text(t)) = inlines.first_mut() {
        *t = t.trim_start().to_string();
    }
    if matches!(inlines.first(), Some(Inline::Text(t)) if t.is_empty()) {
        inlines.remove(0);
    }

    let position = label_position(line, &id);
    Ok(Some(Label::new(id, position)))
}

/// Join lines with `\n`, remembering where each one came from.
fn join_lines(lines: &[Line]) -> (String, SourceMap) {
    let mut text = String::new();
    let mut map = SourceMap::default();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        map.push(text.len(), line.position());
        text.push_str(line.text);
    }
    (text, map)
}

fn parse_text(line: Line) -> ParseResult<Vec<Inline>> {
    parse_mapped(line.text, &SourceMap::at(line.position()))
}

fn try_parse_heading(line: Line) -> ParseResult<Option<(Block, usize)>> {
    let Ok((_, (level, content))) = heading(line.text) else {
        return Ok(None);
    };
    let content_line = line.advance(line.text.offset(content));
    let content_line = Line {
        text: content,
        ..content_line
    };
    let mut inlines = parse_text(content_line)?;
    let label = take_label(&mut inlines, &line)?;

    Ok(Some((
        Block::Heading {
            level,
            content: inlines,
            label,
        },
        1,
    )))
}

fn try_parse_fenced_code(lines: &[Line]) -> Option<(Block, usize)> {
    let first = lines[0].trim_start();
    let (_, (fence, lang)) = code_fence(first.text).ok()?;
    let indent = first.column - lines[0].column;
    let language = lang.map(String::from);

    let mut body = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(1) {
        let trimmed = line.text.trim_start();
        if trimmed.starts_with(fence) && trimmed[fence.len()..].trim_start_matches(&fence[..1]).trim().is_empty() {
            return Some((
                Block::CodeBlock {
                    language,
                    content: body.join("\n"),
                },
                i + 1,
            ));
        }
        body.push(strip_indent(line.text, indent));
    }

    // Unclosed fence: the rest of the input is code
    Some((
        Block::CodeBlock {
            language,
            content: body.join("\n"),
        },
        lines.len(),
    ))
}

fn strip_indent(text: &str, width: usize) -> &str {
    let strip = text.bytes().take(width).take_while(|b| *b == b' ').count();
    &text[strip..]
}

fn try_parse_display_math(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    let first = lines[0].trim_start();
    let Some(after_open) = first.text.strip_prefix("$$") else {
        return Ok(None);
    };

    // Single-line display math: `$$ x $$ {#eq:x}`
    if let Some(end) = after_open.find("$$") {
        let (rest, label) = extract_label(&after_open[end + 2..]);
        if !rest.trim().is_empty() {
            // Inline `$$...$$` followed by text belongs to a paragraph
            return Ok(None);
        }
        let label = label.map(|id| Label::new(id, label_position(&first, id)));
        return Ok(Some((
            Block::DisplayMath {
                content: after_open[..end].trim().to_string(),
                label,
                position: first.position(),
            },
            1,
        )));
    }

    let mut content = vec![after_open];
    for (i, line) in lines.iter().enumerate().skip(1) {
        if let Some(end) = line.text.find("$$") {
            content.push(&line.text[..end]);
            let (_, label) = extract_label(&line.text[end + 2..]);
            let label = label.map(|id| Label::new(id, label_position(line, id)));
            return Ok(Some((
                Block::DisplayMath {
                    content: content.join("\n").trim().to_string(),
                    label,
                    position: first.position(),
                },
                i + 1,
            )));
        }
        content.push(line.text);
    }

    Err(ParseError::new(
        first.position(),
        ParseErrorKind::UnterminatedDisplayMath,
    ))
}

fn try_parse_environment(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    let first = lines[0].trim_start();
    let Ok((_, (kind, label))) = environment_open(first.text) else {
        return Ok(None);
    };

    let mut depth = 1;
    let mut close = None;
    for (i, line) in lines.iter().enumerate().skip(1) {
        let trimmed = line.text.trim_start();
        if environment_close(trimmed).is_ok() {
            depth -= 1;
            if depth == 0 {
                close = Some(i);
                break;
            }
        } else if environment_open(trimmed).is_ok() {
            depth += 1;
        }
    }

    let Some(close) = close else {
        return Err(ParseError::new(
            first.position(),
            ParseErrorKind::UnterminatedEnvironment {
                kind: kind.to_string(),
            },
        ));
    };

    let label = label.map(|id| Label::new(id, label_position(&first, id)));
    let mut content = parse_lines(&lines[1..close])?;

    let block = if matches!(kind.to_lowercase().as_str(), "figure" | "fig") {
        // The trailing paragraph of a multi-block figure is its caption
        let caption = if content.len() > 1 && matches!(content.last(), Some(Block::Paragraph(_))) {
            match content.pop() {
                Some(Block::Paragraph(inlines)) => Some(inlines),
                _ => None,
            }
        } else {
            None
        };
        Block::Figure {
            content,
            caption,
            label,
        }
    } else {
        Block::Environment {
            kind: EnvironmentKind::from(kind),
            label,
            content,
        }
    };

    Ok(Some((block, close + 1)))
}

fn try_parse_footnote_definition(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    let first = lines[0].trim_start();
    let Ok((_, (id, body))) = footnote_definition(first.text) else {
        return Ok(None);
    };

    let mut parts = vec![first.advance(first.text.offset(body))];
    let mut i = 1;
    while i < lines.len() {
        let line = lines[i].trim_start();
        if line.is_blank() || starts_block(line.text) || interrupts_paragraph(line.text) {
            break;
        }
        parts.push(line);
        i += 1;
    }

    let (text, map) = join_lines(&parts);
    let content = parse_mapped(&text, &map)?;
    Ok(Some((
        Block::FootnoteDefinition {
            id: id.to_string(),
            content,
            position: first.position(),
        },
        i,
    )))
}

fn try_parse_block_quote(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    if !lines[0].text.trim_start().starts_with('>') {
        return Ok(None);
    }

    let mut quoted = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_start();
        if let Ok((inner, _)) = block_quote(line.text) {
            quoted.push(line.advance(line.text.offset(inner)));
            i += 1;
        } else if line.is_blank()
            && lines
                .get(i + 1)
                .map_or(false, |next| next.text.trim_start().starts_with('>'))
        {
            quoted.push(line);
            i += 1;
        } else {
            break;
        }
    }

    let content = parse_lines(&quoted)?;
    Ok(Some((Block::BlockQuote(content), i)))
}

fn try_parse_list(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    let indent = indentation(lines[0].text);
    let Ok((_, marker)) = list_marker(lines[0].text.trim_start()) else {
        return Ok(None);
    };

    let start = match marker {
        ListMarker::Ordered(n) => Some(n),
        _ => None,
    };
    let same_item = |line: &Line| {
        indentation(line.text) == indent
            && list_marker(line.text.trim_start()).map_or(false, |(_, m)| marker.same_list(&m))
    };

    let mut items = Vec::new();
    let mut i = 0;
    while i < lines.len() && same_item(&lines[i]) {
        let line = lines[i];
        let trimmed = line.trim_start();
        let Ok((item_text, item_marker)) = list_marker(trimmed.text) else {
            break;
        };
        let content_offset = line.text.offset(item_text);
        let width = indentation(&line.text[..content_offset]).max(content_offset);
        let mut item_lines = vec![line.advance(content_offset)];
        i += 1;

        while i < lines.len() {
            let next = lines[i];
            if next.is_blank() {
                let mut j = i;
                while j < lines.len() && lines[j].is_blank() {
                    j += 1;
                }
                let continues = lines
                    .get(j)
                    .map_or(false, |l| indentation(l.text) > indent);
                if !continues {
                    break;
                }
                item_lines.extend_from_slice(&lines[i..j]);
                i = j;
                continue;
            }

            let next_text = next.text.trim_start();
            if indentation(next.text) <= indent
                && (list_marker(next_text).is_ok() || starts_block(next_text))
            {
                break;
            }
            let strip = next.text.len() - strip_indent(next.text, width).len();
            item_lines.push(next.advance(strip));
            i += 1;
        }

        let checked = match item_marker {
            ListMarker::Task(checked) => Some(checked),
            _ => None,
        };
        items.push(ListItem {
            content: parse_lines(&item_lines)?,
            checked,
        });

        // Blank lines between items keep the list going only if another
        // item of the same list follows.
        let mut j = i;
        while j < lines.len() && lines[j].is_blank() {
            j += 1;
        }
        if j > i {
            if lines.get(j).map_or(false, |l| same_item(l)) {
                i = j;
            } else {
                break;
            }
        }
    }

    Ok(Some((
        Block::List {
            ordered: marker.is_ordered(),
            start,
            items,
        },
        i,
    )))
}

fn try_parse_table(lines: &[Line]) -> ParseResult<Option<(Block, usize)>> {
    if lines.len() < 2 {
        return Ok(None);
    }
    let header = lines[0].trim_start();
    let delimiter = lines[1].trim_start();
    if !header.text.contains('|') || !is_table_delimiter(delimiter.text) {
        return Ok(None);
    }

    let header_cells = split_cells(header);
    let alignments = parse_alignments(delimiter.text);
    let width = header_cells.len();
    if alignments.len() != width {
        return Err(ParseError::new(
            delimiter.position(),
            ParseErrorKind::MalformedTable(format!(
                "delimiter row has {} columns but the header has {}",
                alignments.len(),
                width
            )),
        ));
    }

    let headers = header_cells
        .into_iter()
        .map(parse_text)
        .collect::<ParseResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    let mut i = 2;
    while i < lines.len() {
        let line = lines[i].trim_start();
        if line.is_blank() || !line.text.contains('|') {
            break;
        }
        let cells = split_cells(line);
        if cells.len() > width {
            return Err(ParseError::new(
                line.position(),
                ParseErrorKind::MalformedTable(format!(
                    "row has {} cells but the header has {}",
                    cells.len(),
                    width
                )),
            ));
        }
        let mut row = cells
            .into_iter()
            .map(parse_text)
            .collect::<ParseResult<Vec<_>>>()?;
        row.resize_with(width, Vec::new);
        rows.push(row);
        i += 1;
    }

    let mut caption = None;
    let mut label = None;
    if let Some(line) = lines.get(i).map(Line::trim_start) {
        if let Ok((_, text)) = table_caption(line.text) {
            let (text, id) = extract_label(text);
            caption = Some(parse_text(Line {
                text,
                ..line.advance(line.text.offset(text))
            })?);
            label = id.map(|id| Label::new(id, label_position(&line, id)));
            i += 1;
        }
    }

    Ok(Some((
        Block::Table {
            headers,
            alignments,
            rows,
            caption,
            label,
        },
        i,
    )))
}

fn is_table_delimiter(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.contains('|') {
        return false;
    }

    let inner = trimmed.trim_matches('|');
    !inner.is_empty()
        && inner.split('|').all(|cell| {
            let cell = cell.trim();
            !cell.is_empty() && cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
        })
}

fn parse_alignments(line: &str) -> Vec<Alignment> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| {
            let cell = cell.trim();
            match (cell.starts_with(':'), cell.ends_with(':')) {
                (true, true) => Alignment::Center,
                (false, true) => Alignment::Right,
                _ => Alignment::Left,
            }
        })
        .collect()
}

/// Split a table row on `|`, ignoring pipes that are escaped or sit inside
/// inline math or code.
fn split_cells(row: Line) -> Vec<Line> {
    let row = row.trim_start();
    let mut text = row.text.trim_end();
    let start = usize::from(text.starts_with('|'));
    if text.len() > start && text.ends_with('|') && !text.ends_with("\\|") {
        text = &text[..text.len() - 1];
    }

    let cell = |from: usize, to: usize| {
        let raw = &row.text[from..to];
        let lead = raw.len() - raw.trim_start().len();
        Line {
            text: raw.trim(),
            ..row.advance(from + lead)
        }
    };

    let mut cells = Vec::new();
    let mut cell_start = start;
    let (mut in_math, mut in_code, mut escaped) = (false, false, false);
    for (i, c) in text.char_indices().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '$' if !in_code => in_math = !in_math,
            '`' if !in_math => in_code = !in_code,
            '|' if !in_math && !in_code => {
                cells.push(cell(cell_start, i));
                cell_start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(cell(cell_start, text.len()));
    cells
}

fn try_parse_html(lines: &[Line]) -> Option<(Block, usize)> {
    html_block_start(lines[0].text.trim_start()).ok()?;
    let end = lines
        .iter()
        .position(Line::is_blank)
        .unwrap_or(lines.len());
    let html = lines[..end]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n");
    Some((Block::RawHtml(html), end))
}

fn parse_paragraph(lines: &[Line]) -> ParseResult<(Block, usize)> {
    let mut para = vec![lines[0].trim_start()];
    let mut i = 1;

    while i < lines.len() {
        let line = lines[i].trim_start();
        if line.is_blank() || starts_block(line.text) || interrupts_paragraph(line.text) {
            break;
        }
        para.push(line);
        i += 1;
    }

    let (text, map) = join_lines(&para);
    let inlines = parse_mapped(&text, &map)?;
    Ok((Block::Paragraph(inlines), i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_parse_heading() {
        let blocks = parse_blocks("# Hello World").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 1,
                content: vec![text("Hello World")],
                label: None,
            }]
        );
    }

    #[test]
    fn test_parse_heading_with_label() {
        let blocks = parse_blocks("\n## Introduction {#sec:intro}").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 2,
                content: vec![text("Introduction")],
                label: Some(Label::new("sec:intro", Position::new(2, 17))),
            }]
        );
    }

    #[test]
    fn test_heading_with_two_labels() {
        let err = parse_blocks("# A {#a} {#b}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::DuplicateBlockLabel {
                existing: "a".into(),
                extra: "b".into()
            }
        );
    }

    #[test]
    fn test_parse_code_block() {
        let blocks = parse_blocks("```rust\nfn main() {\n    $x$\n}\n```").unwrap();
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: Some("rust".into()),
                content: "fn main() {\n    $x$\n}".into(),
            }]
        );
    }

    #[test]
    fn test_parse_display_math() {
        let blocks = parse_blocks("$$\n\\int_0^1 x\\,dx\n$$ {#eq:int}").unwrap();
        assert_eq!(
            blocks,
            vec![Block::DisplayMath {
                content: "\\int_0^1 x\\,dx".into(),
                label: Some(Label::new("eq:int", Position::new(3, 4))),
                position: Position::new(1, 1),
            }]
        );
    }

    #[test]
    fn test_single_line_display_math() {
        let blocks = parse_blocks("$$ E = mc^2 $$ {#eq:e}").unwrap();
        assert!(matches!(
            &blocks[0],
            Block::DisplayMath { content, label: Some(l), .. } if content == "E = mc^2" && l.id == "eq:e"
        ));
    }

    #[test]
    fn test_unterminated_display_math() {
        let err = parse_blocks("text\n\n$$\nx + y\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedDisplayMath);
        assert_eq!(err.position.line, 3);
    }

    #[test]
    fn test_parse_environment() {
        let input = "::: theorem {#thm:main}\nStatement here.\n\n::: proof\nObvious.\n:::\n:::";
        let blocks = parse_blocks(input).unwrap();
        assert_eq!(blocks.len(), 1);
        let Block::Environment {
            kind,
            label,
            content,
        } = &blocks[0]
        else {
            panic!("expected environment, got {:?}", blocks[0]);
        };
        assert_eq!(*kind, EnvironmentKind::Theorem);
        assert_eq!(label.as_ref().map(|l| l.id.as_str()), Some("thm:main"));
        assert_eq!(content.len(), 2);
        assert!(matches!(
            &content[1],
            Block::Environment { kind: EnvironmentKind::Proof, .. }
        ));
    }

    #[test]
    fn test_unterminated_environment_names_opening_line() {
        let err = parse_blocks("intro\n\n::: lemma\nbody\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::new(
                Position::new(3, 1),
                ParseErrorKind::UnterminatedEnvironment {
                    kind: "lemma".into()
                }
            )
        );
    }

    #[test]
    fn test_figure_caption() {
        let input = "::: figure {#fig:cat}\n![A cat](cat.png)\n\nA *very* nice cat.\n:::";
        let blocks = parse_blocks(input).unwrap();
        let Block::Figure {
            content,
            caption,
            label,
        } = &blocks[0]
        else {
            panic!("expected figure");
        };
        assert_eq!(content.len(), 1);
        assert_eq!(
            caption.as_deref(),
            Some(&[text("A "), Inline::Emphasis(vec![text("very")]), text(" nice cat.")][..])
        );
        assert_eq!(label.as_ref().map(|l| l.id.as_str()), Some("fig:cat"));
    }

    #[test]
    fn test_table_with_caption() {
        let input = "| A | B |\n|:--|--:|\n| 1 | $|x|$ |\n| 2 |\nTable: Results {#tab:res}";
        let blocks = parse_blocks(input).unwrap();
        assert_eq!(
            blocks,
            vec![Block::Table {
                headers: vec![vec![text("A")], vec![text("B")]],
                alignments: vec![Alignment::Left, Alignment::Right],
                rows: vec![
                    vec![vec![text("1")], vec![Inline::InlineMath {
                        latex: "|x|".into(),
                        position: Position::new(3, 7),
                    }]],
                    vec![vec![text("2")], vec![]],
                ],
                caption: Some(vec![text("Results")]),
                label: Some(Label::new("tab:res", Position::new(5, 16))),
            }]
        );
    }

    #[test]
    fn test_malformed_table() {
        let err = parse_blocks("| A | B |\n|---|---|\n| 1 | 2 | 3 |").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedTable(_)));
        assert_eq!(err.position.line, 3);

        let err = parse_blocks("| A | B |\n|---|").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedTable(_)));
    }

    #[test]
    fn test_table_delimiter() {
        assert!(is_table_delimiter("| --- | :---: | ---: |"));
        assert!(is_table_delimiter("|---|:---:|---:|"));
        assert!(!is_table_delimiter("| not | a | delimiter |"));
    }

    #[test]
    fn test_nested_and_task_lists() {
        let input = "- [x] done\n- [ ] open\n  - nested\n\n1. one\n2. two";
        let blocks = parse_blocks(input).unwrap();
        assert_eq!(blocks.len(), 2);
        let Block::List { ordered, items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert!(!ordered);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].checked, Some(true));
        assert_eq!(items[1].checked, Some(false));
        assert!(matches!(items[1].content[1], Block::List { .. }));
        assert!(matches!(
            blocks[1],
            Block::List { ordered: true, start: Some(1), .. }
        ));
    }

    #[test]
    fn test_block_quote_and_footnote() {
        let blocks = parse_blocks("> quoted\n> text\n\n[^n]: The note\n  continues.").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::BlockQuote(vec![Block::Paragraph(vec![
                    text("quoted"),
                    Inline::SoftBreak,
                    text("text"),
                ])]),
                Block::FootnoteDefinition {
                    id: "n".into(),
                    content: vec![text("The note"), Inline::SoftBreak, text("continues.")],
                    position: Position::new(4, 1),
                },
            ]
        );
    }

    #[test]
    fn test_standalone_label_attaches_to_previous_block() {
        let blocks = parse_blocks("$$\nx\n$$\n{#eq:x}\n\nNext.").unwrap();
        assert!(matches!(
            &blocks[0],
            Block::DisplayMath { label: Some(l), .. } if l.id == "eq:x" && l.position == Position::new(4, 1)
        ));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_detached_label() {
        let err = parse_blocks("Just text.\n\n{#oops}").unwrap_err();
        assert_eq!(
            err,
            ParseError::new(
                Position::new(3, 1),
                ParseErrorKind::DetachedLabel("oops".into())
            )
        );
    }

    #[test]
    fn test_misplaced_front_matter() {
        let err = parse_blocks("# Title\n\n+++\ntitle = \"x\"\n+++").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MisplacedFrontMatter);
        assert_eq!(err.position.line, 3);
    }

    #[test]
    fn test_paragraph_positions_span_lines() {
        let err = parse_blocks("Para one\nstill [@open").unwrap_err();
        assert_eq!(err.position, Position::new(2, 7));
    }

    #[test]
    fn test_toc_rule_and_html() {
        let blocks = parse_blocks("[[toc]]\n\n---\n\n<div class=\"x\">\nhi\n</div>").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::TableOfContents,
                Block::ThematicBreak,
                Block::RawHtml("<div class=\"x\">\nhi\n</div>".into()),
            ]
        );
    }
}
