//! Label collection and automatic numbering for sections, environments,
//! equations, figures and tables.

use super::{Diagnostics, NumberingStyle};
use crate::ast::{inlines_to_text, label_to_id, walk_blocks, Block, EnvironmentKind, Label};
use crate::error::{Position, ResolveError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The numbering category of a label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum LabelCategory {
    Section,
    Equation,
    Figure,
    Table,
    Environment(EnvironmentKind),
}

impl LabelCategory {
    /// The category a labeled block belongs to, if it carries labels at all.
    pub fn of(block: &Block) -> Option<Self> {
        match block {
            Block::Heading { .. } => Some(Self::Section),
            Block::DisplayMath { .. } => Some(Self::Equation),
            Block::Figure { .. } => Some(Self::Figure),
            Block::Table { .. } => Some(Self::Table),
            // Table environments share the table counter
            Block::Environment {
                kind: EnvironmentKind::Table,
                ..
            } => Some(Self::Table),
            Block::Environment { kind, .. } => Some(Self::Environment(kind.clone())),
            _ => None,
        }
    }

    /// Lowercase name, used in introspection output.
    pub fn name(&self) -> String {
        match self {
            Self::Section => "section".into(),
            Self::Equation => "equation".into(),
            Self::Figure => "figure".into(),
            Self::Table => "table".into(),
            Self::Environment(kind) => kind.name(),
        }
    }

    /// Human-readable text for a reference to the given number.
    pub fn format_reference(&self, number: &str) -> String {
        match self {
            Self::Section => format!("Section {}", number),
            Self::Equation => format!("Equation ({})", number),
            Self::Figure => format!("Figure {}", number),
            Self::Table => format!("Table {}", number),
            Self::Environment(kind) => format!("{} {}", kind.display_name(), number),
        }
    }
}

impl fmt::Display for LabelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<LabelCategory> for String {
    fn from(category: LabelCategory) -> Self {
        category.name()
    }
}

/// A registered label with its assigned number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub category: LabelCategory,
    /// `"3"`, or `"2.1"` for hierarchical section numbers.
    pub number: String,
    /// Text substituted for references, e.g. "Theorem 2".
    pub display: String,
    pub html_id: String,
    pub position: Position,
}

/// One heading in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    /// Assigned number, for labeled headings.
    pub number: Option<String>,
    pub label: Option<String>,
    /// Element id of the rendered heading.
    pub html_id: String,
    pub text: String,
}

/// Id given to an unlabeled heading; `index` counts every heading in
/// document order, starting at 1.
pub fn heading_id(index: usize) -> String {
    format!("heading-{}", index)
}

/// Register every label in document order and number it.
///
/// Duplicates are reported and left unnumbered; collection carries on so all
/// of them are found.
pub(crate) fn collect_labels(
    blocks: &[Block],
    style: NumberingStyle,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, LabelEntry> {
    let mut numbering = Numbering::new(style);
    walk_blocks(blocks, &mut |block| {
        if let (Some(label), Some(category)) = (block.label(), LabelCategory::of(block)) {
            let level = match block {
                Block::Heading { level, .. } => *level,
                _ => 0,
            };
            numbering.register(label, category, level, diagnostics);
        }
    });
    numbering.labels
}

struct Numbering {
    style: NumberingStyle,
    counters: BTreeMap<LabelCategory, usize>,
    sections: [usize; 6],
    labels: BTreeMap<String, LabelEntry>,
}

impl Numbering {
    fn new(style: NumberingStyle) -> Self {
        Self {
            style,
            counters: BTreeMap::new(),
            sections: [0; 6],
            labels: BTreeMap::new(),
        }
    }

    fn register(
        &mut self,
        label: &Label,
        category: LabelCategory,
        level: u8,
        diagnostics: &mut Diagnostics,
    ) {
        if let Some(existing) = self.labels.get(&label.id) {
            diagnostics.error(ResolveError::DuplicateLabel {
                label: label.id.clone(),
                first: existing.position,
                second: label.position,
            });
            return;
        }

        let number = match (&category, self.style) {
            (LabelCategory::Section, NumberingStyle::Hierarchical) => self.next_section(level),
            _ => {
                let counter = self.counters.entry(category.clone()).or_insert(0);
                *counter += 1;
                counter.to_string()
            }
        };

        self.labels.insert(
            label.id.clone(),
            LabelEntry {
                display: category.format_reference(&number),
                category,
                number,
                html_id: label_to_id(&label.id),
                position: label.position,
            },
        );
    }

    fn next_section(&mut self, level: u8) -> String {
        let idx = usize::from(level).clamp(1, 6) - 1;
        self.sections[idx] += 1;
        for deeper in &mut self.sections[idx + 1..] {
            *deeper = 0;
        }

        // Levels above the first used one are skipped rather than shown as 0
        let first = self.sections[..=idx]
            .iter()
            .position(|n| *n > 0)
            .unwrap_or(idx);
        self.sections[first..=idx]
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Build the table of contents from the (already linked) headings.
pub(crate) fn build_toc(blocks: &[Block], labels: &BTreeMap<String, LabelEntry>) -> Vec<TocEntry> {
    let mut toc = Vec::new();
    walk_blocks(blocks, &mut |block| {
        if let Block::Heading {
            level,
            content,
            label,
        } = block
        {
            let entry = label.as_ref().and_then(|l| labels.get(&l.id));
            toc.push(TocEntry {
                level: *level,
                number: entry.map(|e| e.number.clone()),
                label: label.as_ref().map(|l| l.id.clone()),
                html_id: match entry {
                    Some(e) => e.html_id.clone(),
                    None => heading_id(toc.len() + 1),
                },
                text: inlines_to_text(content).trim().to_string(),
            });
        }
    });
    toc
}
