//! Abstract Syntax Tree definitions for the extended Markdown language.

use crate::error::Position;
use serde::Serialize;
use std::collections::BTreeMap;

/// A complete parsed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Front matter metadata
    pub metadata: Metadata,
    /// Document content as a sequence of blocks
    pub blocks: Vec<Block>,
}

/// Document metadata from TOML front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,
    /// Document subtitle
    pub subtitle: Option<String>,
    /// Document author(s), in declaration order
    pub authors: Vec<String>,
    /// Document date
    pub date: Option<String>,
    /// Keywords for the document
    pub keywords: Vec<String>,
    /// Institution (for academic documents)
    pub institution: Option<String>,
    /// User-defined LaTeX macros
    pub macros: BTreeMap<String, Macro>,
    /// Path to bibliography file, as written in the front matter
    pub bibliography_path: Option<String>,
}

/// A user-defined macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Macro {
    /// Number of arguments (0 for simple substitution)
    pub arg_count: usize,
    /// Replacement template (use #1, #2, etc. for args)
    pub template: String,
}

impl Macro {
    /// Build a macro from its template, inferring the argument count from the
    /// highest `#N` placeholder.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let arg_count = count_macro_args(&template);
        Self { arg_count, template }
    }
}

fn count_macro_args(template: &str) -> usize {
    let mut max_arg = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '#' {
            if let Some(n) = chars.peek().and_then(|d| d.to_digit(10)) {
                max_arg = max_arg.max(n as usize);
            }
        }
    }

    max_arg
}

/// A document-unique identifier attached to a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    /// Where the `{#...}` token appeared.
    pub position: Position,
}

impl Label {
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

/// Block-level elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A heading with level (1-6), content, and optional label
    Heading {
        level: u8,
        content: Vec<Inline>,
        label: Option<Label>,
    },

    /// A paragraph of inline content
    Paragraph(Vec<Inline>),

    /// Display math block
    DisplayMath {
        content: String,
        label: Option<Label>,
        /// Line of the opening `$$`.
        position: Position,
    },

    /// A fenced environment (theorem, proof, definition, ...)
    Environment {
        kind: EnvironmentKind,
        label: Option<Label>,
        content: Vec<Block>,
    },

    /// A pipe table
    Table {
        headers: Vec<Vec<Inline>>,
        alignments: Vec<Alignment>,
        rows: Vec<Vec<Vec<Inline>>>,
        caption: Option<Vec<Inline>>,
        label: Option<Label>,
    },

    /// A figure environment
    Figure {
        content: Vec<Block>,
        caption: Option<Vec<Inline>>,
        label: Option<Label>,
    },

    /// An ordered or unordered list
    List {
        ordered: bool,
        start: Option<u32>,
        items: Vec<ListItem>,
    },

    /// `[^id]: content`
    FootnoteDefinition {
        id: String,
        content: Vec<Inline>,
        position: Position,
    },

    /// A fenced code block
    CodeBlock {
        language: Option<String>,
        content: String,
    },

    /// A block quote
    BlockQuote(Vec<Block>),

    /// A thematic break (horizontal rule)
    ThematicBreak,

    /// Table of contents placeholder
    TableOfContents,

    /// Raw HTML passthrough
    RawHtml(String),
}

impl Block {
    /// The label attached to this block, if it is a label-bearing variant.
    pub fn label(&self) -> Option<&Label> {
        match self {
            Block::Heading { label, .. }
            | Block::DisplayMath { label, .. }
            | Block::Environment { label, .. }
            | Block::Table { label, .. }
            | Block::Figure { label, .. } => label.as_ref(),
            _ => None,
        }
    }

    /// Mutable access to the label slot of label-bearing variants.
    pub fn label_slot(&mut self) -> Option<&mut Option<Label>> {
        match self {
            Block::Heading { label, .. }
            | Block::DisplayMath { label, .. }
            | Block::Environment { label, .. }
            | Block::Table { label, .. }
            | Block::Figure { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Short lowercase name of the block kind, used in summaries and statistics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Paragraph(_) => "paragraph",
            Block::DisplayMath { .. } => "equation",
            Block::Environment { .. } => "environment",
            Block::Table { .. } => "table",
            Block::Figure { .. } => "figure",
            Block::List { .. } => "list",
            Block::FootnoteDefinition { .. } => "footnote",
            Block::CodeBlock { .. } => "codeblock",
            Block::BlockQuote(_) => "blockquote",
            Block::ThematicBreak => "hr",
            Block::TableOfContents => "toc",
            Block::RawHtml(_) => "html",
        }
    }

    /// Nested blocks, for container variants.
    pub fn children(&self) -> Vec<&Block> {
        match self {
            Block::Environment { content, .. }
            | Block::Figure { content, .. }
            | Block::BlockQuote(content) => content.iter().collect(),
            Block::List { items, .. } => items.iter().flat_map(|i| i.content.iter()).collect(),
            _ => Vec::new(),
        }
    }
}

/// List item containing blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<Block>,
    pub checked: Option<bool>,
}

/// Environment types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvironmentKind {
    Theorem,
    Lemma,
    Proposition,
    Corollary,
    Conjecture,
    Definition,
    Axiom,
    Example,
    Exercise,
    Solution,
    Remark,
    Note,
    Proof,
    Table,
    Algorithm,
    /// Custom environment with user-defined name
    Custom(String),
}

impl From<&str> for EnvironmentKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "theorem" | "thm" => Self::Theorem,
            "lemma" | "lem" => Self::Lemma,
            "proposition" | "prop" => Self::Proposition,
            "corollary" | "cor" => Self::Corollary,
            "conjecture" => Self::Conjecture,
            "definition" | "def" => Self::Definition,
            "axiom" => Self::Axiom,
            "example" | "ex" => Self::Example,
            "exercise" => Self::Exercise,
            "solution" => Self::Solution,
            "remark" | "rem" => Self::Remark,
            "note" => Self::Note,
            "proof" | "pf" => Self::Proof,
            "table" | "tab" => Self::Table,
            "algorithm" | "algo" => Self::Algorithm,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl EnvironmentKind {
    /// Get the display name for this environment.
    pub fn display_name(&self) -> String {
        match self {
            Self::Theorem => "Theorem".into(),
            Self::Lemma => "Lemma".into(),
            Self::Proposition => "Proposition".into(),
            Self::Corollary => "Corollary".into(),
            Self::Conjecture => "Conjecture".into(),
            Self::Definition => "Definition".into(),
            Self::Axiom => "Axiom".into(),
            Self::Example => "Example".into(),
            Self::Exercise => "Exercise".into(),
            Self::Solution => "Solution".into(),
            Self::Remark => "Remark".into(),
            Self::Note => "Note".into(),
            Self::Proof => "Proof".into(),
            Self::Table => "Table".into(),
            Self::Algorithm => "Algorithm".into(),
            Self::Custom(name) => capitalize(name),
        }
    }

    /// Lowercase identifier, used for CSS classes and label categories.
    pub fn name(&self) -> String {
        match self {
            Self::Custom(name) => name.to_lowercase(),
            other => other.display_name().to_lowercase(),
        }
    }

    /// Theorem-like environments share the boxed presentation.
    pub fn is_theorem_like(&self) -> bool {
        !matches!(self, Self::Proof | Self::Table | Self::Custom(_))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Table column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Inline-level elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    /// Plain text
    Text(String),

    /// Emphasized text (italic)
    Emphasis(Vec<Inline>),

    /// Strong text (bold)
    Strong(Vec<Inline>),

    /// Strikethrough text
    Strikethrough(Vec<Inline>),

    /// Inline code
    Code(String),

    /// A link
    Link {
        url: String,
        title: Option<String>,
        content: Vec<Inline>,
    },

    /// An image
    Image {
        url: String,
        alt: String,
        title: Option<String>,
    },

    /// Inline math (raw LaTeX)
    InlineMath { latex: String, position: Position },

    /// A citation group
    Citation(Citation),

    /// A cross-reference to a label
    Reference(CrossReference),

    /// A footnote marker
    Footnote(Footnote),

    /// `{#label}` found in running text; binds to the enclosing block
    Label(String),

    /// A soft line break
    SoftBreak,

    /// A hard line break
    HardBreak,
}

/// `[@key1; @key2, locator]`
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub items: Vec<CiteItem>,
    pub position: Position,
}

/// A single key inside a citation group.
#[derive(Debug, Clone, PartialEq)]
pub struct CiteItem {
    pub key: String,
    /// Optional locator (e.g., "p. 42")
    pub locator: Option<String>,
    /// Formatted short citation, filled in during resolution.
    pub resolved: Option<String>,
}

impl CiteItem {
    pub fn new(key: impl Into<String>, locator: Option<String>) -> Self {
        Self {
            key: key.into(),
            locator,
            resolved: None,
        }
    }
}

/// `@label`
#[derive(Debug, Clone, PartialEq)]
pub struct CrossReference {
    pub label: String,
    pub position: Position,
    /// Filled in during resolution.
    pub resolved: Option<ReferenceTarget>,
}

impl CrossReference {
    pub fn new(label: impl Into<String>, position: Position) -> Self {
        Self {
            label: label.into(),
            position,
            resolved: None,
        }
    }
}

/// What a cross-reference points at once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// The label exists; `text` is e.g. "Section 2" or "Equation (3)".
    Found { text: String, html_id: String },
    /// The label does not exist in the document.
    Missing,
}

/// A footnote marker with its resolved number.
#[derive(Debug, Clone, PartialEq)]
pub struct Footnote {
    pub kind: FootnoteKind,
    /// Where `^[` or `[^` appeared.
    pub position: Position,
    /// Assigned during resolution; `None` for undefined references.
    pub number: Option<usize>,
}

impl Footnote {
    pub fn new(kind: FootnoteKind, position: Position) -> Self {
        Self {
            kind,
            position,
            number: None,
        }
    }
}

/// Footnote variants.
#[derive(Debug, Clone, PartialEq)]
pub enum FootnoteKind {
    /// Inline footnote with direct content
    Inline(Vec<Inline>),
    /// Reference to a footnote defined elsewhere
    Reference(String),
}

/// Convert a label to a valid HTML id: every `:` becomes `-`.
pub fn label_to_id(label: &str) -> String {
    label.replace(':', "-")
}

/// Render inline content to plain text.
///
/// Resolved cross-references contribute their display text; math and
/// unresolved markers contribute their source.
pub fn inlines_to_text(inlines: &[Inline]) -> String {
    let mut result = String::new();
    push_plain_text(inlines, &mut result);
    result
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) | Inline::InlineMath { latex: t, .. } => {
                out.push_str(t)
            }
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Strikethrough(inner) => {
                push_plain_text(inner, out)
            }
            Inline::Link { content, .. } => push_plain_text(content, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::Reference(r) => match &r.resolved {
                Some(ReferenceTarget::Found { text, .. }) => out.push_str(text),
                _ => {
                    out.push('@');
                    out.push_str(&r.label);
                }
            },
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Citation(_) | Inline::Footnote(_) | Inline::Label(_) => {}
        }
    }
}

/// Visit every block in document order, parents before their children.
pub fn walk_blocks<'a>(blocks: &'a [Block], f: &mut impl FnMut(&'a Block)) {
    for block in blocks {
        f(block);
        match block {
            Block::Environment { content, .. }
            | Block::Figure { content, .. }
            | Block::BlockQuote(content) => walk_blocks(content, f),
            Block::List { items, .. } => {
                for item in items {
                    walk_blocks(&item.content, f);
                }
            }
            _ => {}
        }
    }
}

/// Mutable counterpart of [`walk_blocks`].
pub fn walk_blocks_mut(blocks: &mut [Block], f: &mut impl FnMut(&mut Block)) {
    for block in blocks {
        f(block);
        match block {
            Block::Environment { content, .. }
            | Block::Figure { content, .. }
            | Block::BlockQuote(content) => walk_blocks_mut(content, f),
            Block::List { items, .. } => {
                for item in items {
                    walk_blocks_mut(&mut item.content, f);
                }
            }
            _ => {}
        }
    }
}

/// Visit every inline in document order, depth first, including inline
/// footnote bodies.
pub fn walk_inlines<'a>(blocks: &'a [Block], f: &mut impl FnMut(&'a Inline)) {
    for block in blocks {
        walk_block_inlines(block, f);
    }
}

fn walk_block_inlines<'a>(block: &'a Block, f: &mut impl FnMut(&'a Inline)) {
    match block {
        Block::Heading { content, .. }
        | Block::Paragraph(content)
        | Block::FootnoteDefinition { content, .. } => walk_inline_list(content, f),
        Block::Environment { content, .. } | Block::BlockQuote(content) => {
            walk_inlines(content, f)
        }
        Block::Figure {
            content, caption, ..
        } => {
            walk_inlines(content, f);
            if let Some(caption) = caption {
                walk_inline_list(caption, f);
            }
        }
        Block::Table {
            headers,
            rows,
            caption,
            ..
        } => {
            for cell in headers {
                walk_inline_list(cell, f);
            }
            for cell in rows.iter().flatten() {
                walk_inline_list(cell, f);
            }
            if let Some(caption) = caption {
                walk_inline_list(caption, f);
            }
        }
        Block::List { items, .. } => {
            for item in items {
                walk_inlines(&item.content, f);
            }
        }
        Block::DisplayMath { .. }
        | Block::CodeBlock { .. }
        | Block::ThematicBreak
        | Block::TableOfContents
        | Block::RawHtml(_) => {}
    }
}

fn walk_inline_list<'a>(inlines: &'a [Inline], f: &mut impl FnMut(&'a Inline)) {
    for inline in inlines {
        f(inline);
        match inline {
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Strikethrough(inner) => {
                walk_inline_list(inner, f)
            }
            Inline::Link { content, .. } => walk_inline_list(content, f),
            Inline::Footnote(Footnote {
                kind: FootnoteKind::Inline(content),
                ..
            }) => walk_inline_list(content, f),
            _ => {}
        }
    }
}

/// Mutable counterpart of [`walk_inlines`]; visits in the same order.
pub fn walk_inlines_mut(blocks: &mut [Block], f: &mut impl FnMut(&mut Inline)) {
    for block in blocks {
        walk_block_inlines_mut(block, f);
    }
}

fn walk_block_inlines_mut(block: &mut Block, f: &mut impl FnMut(&mut Inline)) {
    match block {
        Block::Heading { content, .. }
        | Block::Paragraph(content)
        | Block::FootnoteDefinition { content, .. } => walk_inline_list_mut(content, f),
        Block::Environment { content, .. } | Block::BlockQuote(content) => {
            walk_inlines_mut(content, f)
        }
        Block::Figure {
            content, caption, ..
        } => {
            walk_inlines_mut(content, f);
            if let Some(caption) = caption {
                walk_inline_list_mut(caption, f);
            }
        }
        Block::Table {
            headers,
            rows,
            caption,
            ..
        } => {
            for cell in headers.iter_mut() {
                walk_inline_list_mut(cell, f);
            }
            for cell in rows.iter_mut().flatten() {
                walk_inline_list_mut(cell, f);
            }
            if let Some(caption) = caption {
                walk_inline_list_mut(caption, f);
            }
        }
        Block::List { items, .. } => {
            for item in items {
                walk_inlines_mut(&mut item.content, f);
            }
        }
        Block::DisplayMath { .. }
        | Block::CodeBlock { .. }
        | Block::ThematicBreak
        | Block::TableOfContents
        | Block::RawHtml(_) => {}
    }
}

fn walk_inline_list_mut(inlines: &mut [Inline], f: &mut impl FnMut(&mut Inline)) {
    for inline in inlines {
        f(inline);
        match inline {
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Strikethrough(inner) => {
                walk_inline_list_mut(inner, f)
            }
            Inline::Link { content, .. } => walk_inline_list_mut(content, f),
            Inline::Footnote(Footnote {
                kind: FootnoteKind::Inline(content),
                ..
            }) => walk_inline_list_mut(content, f),
            _ => {}
        }
    }
}
