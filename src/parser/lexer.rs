//! Line- and token-level recognizers built on nom.
//!
//! Each recognizer looks at the start of its input and either matches a
//! construct or fails; the block and inline parsers decide what to do with
//! the result.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, one_of, space0, space1},
    combinator::{eof, map, map_res, not, opt, peek, recognize, value},
    multi::many0_count,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

/// A list item marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Bullet,
    Ordered(u32),
    /// `- [ ]` or `- [x]`
    Task(bool),
}

impl ListMarker {
    pub fn is_ordered(&self) -> bool {
        matches!(self, ListMarker::Ordered(_))
    }

    /// Bullets and task items can share a list; ordered items cannot.
    pub fn same_list(&self, other: &ListMarker) -> bool {
        self.is_ordered() == other.is_ordered()
    }
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ':' | '-' | '_' | '.')
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_')
}

/// ATX heading: `## Title`. Returns the level and the raw content.
pub fn heading(input: &str) -> IResult<&str, (u8, &str)> {
    let (input, hashes) = take_while1(|c| c == '#')(input)?;
    if hashes.len() > 6 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (input, _) = alt((space1, eof))(input)?;
    let content = input.trim_end();
    // Optional closing sequence, only when separated by a space
    let stripped = content.trim_end_matches('#');
    let content = if stripped.len() < content.len() && (stripped.is_empty() || stripped.ends_with(' ')) {
        stripped.trim_end()
    } else {
        content
    };
    Ok(("", (hashes.len() as u8, content)))
}

/// `---`, `***` or `___`, alone on the line.
pub fn thematic_break(input: &str) -> IResult<&str, ()> {
    let rule = |c: char| {
        recognize(tuple((
            char(c),
            char(c),
            char(c),
            many0_count(char(c)),
        )))
    };
    value(
        (),
        terminated(alt((rule('-'), rule('*'), rule('_'))), pair(space0, eof)),
    )(input)
}

/// Opening code fence. Returns the fence string and the optional language;
/// anything after the language is left in the remainder.
pub fn code_fence(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, fence) = alt((tag("```"), tag("~~~")))(input)?;
    let (input, _) = space0(input)?;
    let (input, lang) = opt(take_while1(|c: char| {
        c.is_alphanumeric() || matches!(c, '-' | '_' | '+' | '#')
    }))(input)?;
    Ok((input, (fence, lang)))
}

/// Opening environment fence: `::: kind {#label}`.
pub fn environment_open(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, _) = tag(":::")(input)?;
    let (input, _) = space0(input)?;
    let (input, kind) = take_while1(is_identifier_char)(input)?;
    let (input, _) = space0(input)?;
    let (input, label) = opt(label_token)(input)?;
    let (input, _) = pair(space0, eof)(input)?;
    Ok((input, (kind, label)))
}

/// Closing environment fence: a bare `:::`.
pub fn environment_close(input: &str) -> IResult<&str, ()> {
    value((), tuple((tag(":::"), space0, eof)))(input)
}

/// Front matter fence: `+++` alone on the line.
pub fn front_matter_fence(input: &str) -> IResult<&str, ()> {
    value((), tuple((tag("+++"), space0, eof)))(input)
}

/// `[[toc]]` alone on the line.
pub fn toc_marker(input: &str) -> IResult<&str, ()> {
    value((), tuple((tag("[[toc]]"), space0, eof)))(input)
}

/// `[^id]: content`. Returns the id and the rest of the line.
pub fn footnote_definition(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, id) = delimited(tag("[^"), take_while1(is_identifier_char), tag("]:"))(input)?;
    let (input, _) = space0(input)?;
    Ok(("", (id, input)))
}

/// List item marker. Returns the marker and the item text after it.
pub fn list_marker(input: &str) -> IResult<&str, ListMarker> {
    alt((
        map(
            tuple((
                one_of("-*+"),
                space1,
                delimited(
                    char('['),
                    alt((value(true, one_of("xX")), value(false, char(' ')))),
                    char(']'),
                ),
                alt((space1, eof)),
            )),
            |(_, _, checked, _)| ListMarker::Task(checked),
        ),
        map(terminated(one_of("-*+"), space1), |_| ListMarker::Bullet),
        map(
            terminated(
                map_res(digit1, |n: &str| n.parse::<u32>()),
                pair(one_of(".)"), space1),
            ),
            ListMarker::Ordered,
        ),
    ))(input)
}

/// `> quoted`. Returns the text after the marker.
pub fn block_quote(input: &str) -> IResult<&str, &str> {
    let (input, _) = pair(char('>'), opt(char(' ')))(input)?;
    Ok(("", input))
}

/// `Table: caption text`. Returns the caption text.
pub fn table_caption(input: &str) -> IResult<&str, &str> {
    let (input, _) = alt((tag("Table:"), tag(": ")))(input)?;
    let (input, _) = space0(input)?;
    Ok(("", input.trim_end()))
}

/// Start of a raw HTML block: an opening tag, closing tag or comment.
pub fn html_block_start(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<!--"),
        recognize(pair(
            pair(char('<'), opt(char('/'))),
            take_while1(|c: char| c.is_ascii_alphabetic()),
        )),
    ))(input)
}

/// `{#label}`. Returns the label id.
pub fn label_token(input: &str) -> IResult<&str, &str> {
    delimited(tag("{#"), take_while1(is_label_char), char('}'))(input)
}

/// `[^id]`, but not the definition form `[^id]:`.
pub fn footnote_reference(input: &str) -> IResult<&str, &str> {
    terminated(
        delimited(tag("[^"), take_while1(is_identifier_char), char(']')),
        not(peek(char(':'))),
    )(input)
}

/// `@label`. Trailing punctuation that cannot end a label is left behind.
pub fn cross_reference(input: &str) -> IResult<&str, &str> {
    let (_, raw) = preceded(
        char('@'),
        recognize(pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            take_while(is_label_char),
        )),
    )(input)?;
    let label = raw.trim_end_matches(&['.', ':', '-'][..]);
    Ok((&input[1 + label.len()..], label))
}

/// Inline code delimited by a run of backticks of equal length.
pub fn inline_code(input: &str) -> IResult<&str, &str> {
    let (rest, ticks) = take_while1(|c| c == '`')(input)?;
    let (rest, content) = take_until(ticks)(rest)?;
    let (rest, _) = tag(ticks)(rest)?;
    let content = if content.len() > 1 && content.starts_with(' ') && content.ends_with(' ') {
        &content[1..content.len() - 1]
    } else {
        content
    };
    Ok((rest, content))
}

/// Leading spaces, with a tab counted as four.
pub fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Extract a trailing `{#label}` from a string.
pub fn extract_label(s: &str) -> (&str, Option<&str>) {
    let trimmed = s.trim_end();
    if let Some(start) = trimmed.rfind("{#") {
        if let Ok((rest, label)) = label_token(&trimmed[start..]) {
            if rest.trim().is_empty() {
                return (trimmed[..start].trim_end(), Some(label));
            }
        }
    }
    (s, None)
}
