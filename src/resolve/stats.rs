//! Per-document statistics.

use crate::ast::{walk_blocks, walk_inlines, Block, Document, FootnoteKind, Inline, ReferenceTarget};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate counts over a resolved document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Every block, nested ones included
    pub block_count: usize,
    pub blocks_by_kind: BTreeMap<String, usize>,
    pub heading_count: usize,
    pub inline_equation_count: usize,
    pub display_equation_count: usize,
    /// Inline plus display equations, labeled or not
    pub equation_count: usize,
    /// Cited keys, counting repeats
    pub citation_count: usize,
    pub environment_count: usize,
    pub figure_count: usize,
    pub table_count: usize,
    /// Numbered footnotes
    pub footnote_count: usize,
    pub label_count: usize,
    pub word_count: usize,
}

impl Statistics {
    pub(crate) fn compute(document: &Document, label_count: usize) -> Self {
        let mut stats = Statistics {
            label_count,
            ..Default::default()
        };

        walk_blocks(&document.blocks, &mut |block| {
            stats.block_count += 1;
            *stats
                .blocks_by_kind
                .entry(block.kind_name().to_string())
                .or_insert(0) += 1;
            match block {
                Block::Heading { .. } => stats.heading_count += 1,
                Block::DisplayMath { .. } => stats.display_equation_count += 1,
                Block::Environment { .. } => stats.environment_count += 1,
                Block::Figure { .. } => stats.figure_count += 1,
                Block::Table { .. } => stats.table_count += 1,
                _ => {}
            }
        });

        let mut footnotes = Vec::new();
        walk_inlines(&document.blocks, &mut |inline| match inline {
            Inline::InlineMath { .. } => stats.inline_equation_count += 1,
            Inline::Citation(citation) => stats.citation_count += citation.items.len(),
            Inline::Footnote(footnote) => footnotes.extend(footnote.number),
            _ => {}
        });
        footnotes.sort_unstable();
        footnotes.dedup();

        stats.footnote_count = footnotes.len();
        stats.equation_count = stats.inline_equation_count + stats.display_equation_count;
        stats.word_count = word_count(&document.blocks);
        stats
    }
}

/// Count whitespace-separated words of the document's visible prose.
fn word_count(blocks: &[Block]) -> usize {
    let mut count = 0;
    walk_blocks(blocks, &mut |block| {
        let mut text = String::new();
        match block {
            Block::Heading { content, .. }
            | Block::Paragraph(content)
            | Block::FootnoteDefinition { content, .. } => push_prose(content, &mut text),
            Block::Table {
                headers,
                rows,
                caption,
                ..
            } => {
                for cell in headers.iter().chain(rows.iter().flatten()) {
                    push_prose(cell, &mut text);
                    text.push(' ');
                }
                if let Some(caption) = caption {
                    push_prose(caption, &mut text);
                }
            }
            Block::Figure {
                caption: Some(caption),
                ..
            } => push_prose(caption, &mut text),
            _ => {}
        }
        count += text.split_whitespace().count();
    });
    count
}

/// Plain text without math; inline footnote bodies are included.
fn push_prose(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) => out.push_str(t),
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Strikethrough(inner) => {
                push_prose(inner, out)
            }
            Inline::Link { content, .. } => push_prose(content, out),
            Inline::Reference(reference) => {
                if let Some(ReferenceTarget::Found { text, .. }) = &reference.resolved {
                    out.push(' ');
                    out.push_str(text);
                    out.push(' ');
                }
            }
            Inline::Footnote(footnote) => {
                if let FootnoteKind::Inline(content) = &footnote.kind {
                    out.push(' ');
                    push_prose(content, out);
                    out.push(' ');
                }
            }
            Inline::Citation(citation) => {
                for item in &citation.items {
                    if let Some(short) = &item.resolved {
                        out.push(' ');
                        out.push_str(short);
                        out.push(' ');
                    }
                    if let Some(locator) = &item.locator {
                        out.push_str(locator);
                        out.push(' ');
                    }
                }
            }
            Inline::InlineMath { .. } | Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Image { .. } | Inline::Label(_) => {}
        }
    }
}
