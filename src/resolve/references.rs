//! Cross-reference linking and footnote numbering.

use super::numbering::LabelEntry;
use super::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::ast::{
    walk_blocks, walk_inlines, walk_inlines_mut, Block, Footnote, FootnoteKind, Inline,
    ReferenceTarget,
};
use crate::error::{Position, ResolveError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A numbered footnote and its (resolved) content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootnoteEntry {
    pub number: usize,
    /// Definition id for `[^id]` footnotes; `None` for inline ones.
    pub id: Option<String>,
    #[serde(serialize_with = "serialize_inlines_as_text")]
    pub content: Vec<Inline>,
}

impl FootnoteEntry {
    fn new(number: usize, id: Option<String>) -> Self {
        Self {
            number,
            id,
            content: Vec::new(),
        }
    }
}

fn serialize_inlines_as_text<S: serde::Serializer>(
    inlines: &[Inline],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::ast::inlines_to_text(inlines))
}

/// Point every cross-reference at its label, or mark it missing.
pub(crate) fn link_references(
    blocks: &mut [Block],
    labels: &BTreeMap<String, LabelEntry>,
    strict: bool,
    diagnostics: &mut Diagnostics,
) {
    walk_inlines_mut(blocks, &mut |inline| {
        let Inline::Reference(reference) = inline else {
            return;
        };
        reference.resolved = Some(match labels.get(&reference.label) {
            Some(entry) => ReferenceTarget::Found {
                text: entry.display.clone(),
                html_id: entry.html_id.clone(),
            },
            None if strict => {
                diagnostics.error(ResolveError::UnknownReference {
                    label: reference.label.clone(),
                    position: reference.position,
                });
                ReferenceTarget::Missing
            }
            None => {
                diagnostics.warn(
                    Diagnostic::new(
                        DiagnosticKind::UnknownReference,
                        reference.label.as_str(),
                        format!("unknown reference label `{}`", reference.label),
                    )
                    .at(reference.position),
                );
                ReferenceTarget::Missing
            }
        });
    });
}

/// Number footnotes in order of first reference.
///
/// Inline footnotes always take the next number; repeated references to the
/// same definition share its number. Entry contents are taken after
/// numbering, so footnotes nested inside a footnote body keep their numbers.
pub(crate) fn number_footnotes(
    blocks: &mut [Block],
    diagnostics: &mut Diagnostics,
) -> Vec<FootnoteEntry> {
    let mut definitions: BTreeMap<String, Position> = BTreeMap::new();
    walk_blocks(blocks, &mut |block| {
        if let Block::FootnoteDefinition { id, position, .. } = block {
            definitions.entry(id.clone()).or_insert(*position);
        }
    });

    let mut assigned: BTreeMap<String, usize> = BTreeMap::new();
    let mut entries = Vec::new();
    walk_inlines_mut(blocks, &mut |inline| {
        let Inline::Footnote(footnote) = inline else {
            return;
        };
        let next = entries.len() + 1;
        footnote.number = match &footnote.kind {
            FootnoteKind::Inline(_) => {
                entries.push(FootnoteEntry::new(next, None));
                Some(next)
            }
            FootnoteKind::Reference(id) => {
                if let Some(number) = assigned.get(id) {
                    Some(*number)
                } else if definitions.contains_key(id) {
                    assigned.insert(id.clone(), next);
                    entries.push(FootnoteEntry::new(next, Some(id.clone())));
                    Some(next)
                } else {
                    diagnostics.warn(
                        Diagnostic::new(
                            DiagnosticKind::UndefinedFootnote,
                            id.as_str(),
                            format!("footnote `[^{}]` has no definition", id),
                        )
                        .at(footnote.position),
                    );
                    None
                }
            }
        };
    });

    fill_footnote_contents(blocks, &assigned, &mut entries);

    for (id, position) in definitions.iter().filter(|(id, _)| !assigned.contains_key(*id)) {
        diagnostics.warn(
            Diagnostic::new(
                DiagnosticKind::UnusedFootnote,
                id.as_str(),
                format!("footnote `[^{}]` is defined but never referenced", id),
            )
            .at(*position),
        );
    }

    entries
}

fn fill_footnote_contents(
    blocks: &[Block],
    assigned: &BTreeMap<String, usize>,
    entries: &mut [FootnoteEntry],
) {
    let mut filled = BTreeSet::new();
    walk_inlines(blocks, &mut |inline| {
        if let Inline::Footnote(Footnote {
            kind: FootnoteKind::Inline(content),
            number: Some(number),
            ..
        }) = inline
        {
            if let Some(entry) = entries.get_mut(number - 1) {
                entry.content = content.clone();
            }
        }
    });
    walk_blocks(blocks, &mut |block| {
        if let Block::FootnoteDefinition { id, content, .. } = block {
            let Some(number) = assigned.get(id) else {
                return;
            };
            // Later definitions of the same id are ignored
            if filled.insert(*number) {
                if let Some(entry) = entries.get_mut(number - 1) {
                    entry.content = content.clone();
                }
            }
        }
    });
}

/// Labels left in running text attach to nothing; warn about each one.
pub(crate) fn report_stray_labels(blocks: &[Block], diagnostics: &mut Diagnostics) {
    walk_inlines(blocks, &mut |inline| {
        if let Inline::Label(id) = inline {
            diagnostics.warn(Diagnostic::new(
                DiagnosticKind::StrayLabel,
                id.as_str(),
                format!("label `{}` in running text is not attached to a block", id),
            ));
        }
    });
}
