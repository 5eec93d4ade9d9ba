//! Document introspection: a serializable summary of a resolved document.

use crate::ast::{inlines_to_text, Block, Metadata};
use crate::resolve::{Diagnostic, LabelCategory, ResolvedDocument, Statistics, TocEntry};
use serde::Serialize;

const PREVIEW_CHARS: usize = 100;

/// Structure, labels and statistics of a resolved document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub metadata: Metadata,
    pub blocks: Vec<BlockSummary>,
    /// Labels in document order.
    pub labels: Vec<LabelSummary>,
    pub toc: Vec<TocEntry>,
    pub statistics: Statistics,
    pub warnings: Vec<Diagnostic>,
}

/// One block, with a short text preview and its nested blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSummary {
    pub id: String,
    pub category: LabelCategory,
    pub number: String,
    pub display: String,
}

impl DocumentInfo {
    pub fn from_resolved(resolved: &ResolvedDocument) -> Self {
        let mut labels: Vec<_> = resolved.labels.iter().collect();
        labels.sort_by_key(|(_, entry)| entry.position);

        Self {
            metadata: resolved.document.metadata.clone(),
            blocks: resolved.document.blocks.iter().map(BlockSummary::of).collect(),
            labels: labels
                .into_iter()
                .map(|(id, entry)| LabelSummary {
                    id: id.clone(),
                    category: entry.category.clone(),
                    number: entry.number.clone(),
                    display: entry.display.clone(),
                })
                .collect(),
            toc: resolved.toc.clone(),
            statistics: resolved.statistics.clone(),
            warnings: resolved.warnings.clone(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl BlockSummary {
    fn of(block: &Block) -> Self {
        Self {
            kind: block.kind_name(),
            label: block.label().map(|l| l.id.clone()),
            preview: block_text(block).map(|text| preview(&text)),
            children: block.children().into_iter().map(Self::of).collect(),
        }
    }
}

fn block_text(block: &Block) -> Option<String> {
    match block {
        Block::Heading { content, .. }
        | Block::Paragraph(content)
        | Block::FootnoteDefinition { content, .. } => Some(inlines_to_text(content)),
        Block::DisplayMath { content, .. } | Block::CodeBlock { content, .. } => {
            Some(content.clone())
        }
        Block::RawHtml(html) => Some(html.clone()),
        Block::Figure {
            caption: Some(caption),
            ..
        } => Some(inlines_to_text(caption)),
        Block::Table {
            caption, headers, ..
        } => Some(match caption {
            Some(caption) => inlines_to_text(caption),
            None => headers
                .iter()
                .map(|h| inlines_to_text(h))
                .collect::<Vec<_>>()
                .join(" | "),
        }),
        _ => None,
    }
}

/// Whitespace-folded text cut to at most 100 characters.
fn preview(text: &str) -> String {
    let folded = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match folded.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => folded[..cut].to_string(),
        None => folded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibtex::Bibliography;
    use crate::parser::parse;
    use crate::resolve::{resolve, ResolveConfig};
    use pretty_assertions::assert_eq;

    fn info(input: &str) -> DocumentInfo {
        let doc = parse(input).unwrap();
        let resolved = resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap();
        DocumentInfo::from_resolved(&resolved)
    }

    #[test]
    fn test_block_summaries_recurse() {
        let info = info("# Intro {#sec:intro}\n\n::: theorem {#thm:a}\nStatement.\n:::");
        assert_eq!(
            info.blocks,
            vec![
                BlockSummary {
                    kind: "heading",
                    label: Some("sec:intro".into()),
                    preview: Some("Intro".into()),
                    children: vec![],
                },
                BlockSummary {
                    kind: "environment",
                    label: Some("thm:a".into()),
                    preview: None,
                    children: vec![BlockSummary {
                        kind: "paragraph",
                        label: None,
                        preview: Some("Statement.".into()),
                        children: vec![],
                    }],
                },
            ]
        );
        let ids: Vec<_> = info.labels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["sec:intro", "thm:a"]);
        assert_eq!(info.labels[1].display, "Theorem 1");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), 100);
        assert_eq!(preview("short  text\nhere"), "short text here");
    }

    #[test]
    fn test_json_output() {
        let info = info("+++\ntitle = \"T\"\n+++\n\n::: lemma {#lem:x}\nL.\n:::\n\nSee @lem:x and $y$.");
        let json = info.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["title"], "T");
        assert_eq!(value["labels"][0]["category"], "lemma");
        assert_eq!(value["labels"][0]["number"], "1");
        assert_eq!(value["statistics"]["inline_equation_count"], 1);
        assert_eq!(value["blocks"][0]["kind"], "environment");
        assert!(value["blocks"][0].get("preview").is_none());
    }
}
