//! Citation linking and short-form citation text.

use super::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::ast::{walk_inlines_mut, Block, Inline};
use crate::bibtex::{BibEntry, Bibliography};
use crate::error::ResolveError;
use std::collections::BTreeSet;

/// Fill in the short form of every cited key and return the cited entries
/// in order of first citation.
pub(crate) fn link_citations(
    blocks: &mut [Block],
    bibliography: &Bibliography,
    strict: bool,
    diagnostics: &mut Diagnostics,
) -> Vec<BibEntry> {
    let mut cited = Vec::new();
    let mut seen = BTreeSet::new();

    walk_inlines_mut(blocks, &mut |inline| {
        let Inline::Citation(citation) = inline else {
            return;
        };
        let position = citation.position;
        for item in &mut citation.items {
            match bibliography.get(&item.key) {
                Some(entry) => {
                    item.resolved = Some(format_short_citation(entry));
                    if seen.insert(item.key.clone()) {
                        cited.push(entry.clone());
                    }
                }
                None if strict => diagnostics.error(ResolveError::UnknownCitation {
                    key: item.key.clone(),
                    position,
                }),
                None => diagnostics.warn(
                    Diagnostic::new(
                        DiagnosticKind::UnknownCitation,
                        item.key.as_str(),
                        format!("unknown citation key `{}`", item.key),
                    )
                    .at(position),
                ),
            }
        }
    });

    cited
}

/// "Knuth, 1984", "Doe & Roe, 2020" or "Doe et al., 2021".
pub fn format_short_citation(entry: &BibEntry) -> String {
    format!(
        "{}, {}",
        format_authors_short(entry),
        entry.year().unwrap_or("n.d.")
    )
}

/// Author part of a short citation. Entries without authors fall back to
/// their title, then their key.
pub fn format_authors_short(entry: &BibEntry) -> String {
    match entry.authors.as_slice() {
        [] => entry.title().unwrap_or(&entry.key).to_string(),
        [only] => last_name(only).to_string(),
        [first, second] => format!("{} & {}", last_name(first), last_name(second)),
        [first, ..] => format!("{} et al.", last_name(first)),
    }
}

/// Family name of a BibTeX author, written either "Last, First" or
/// "First Last".
fn last_name(author: &str) -> &str {
    let author = author.trim();
    if let Some((last, _)) = author.split_once(',') {
        last.trim()
    } else {
        author.rsplit(' ').next().unwrap_or(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CiteItem;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn bibliography() -> Bibliography {
        [
            BibEntry::new("knuth1984", "article")
                .with_field("author", "Donald E. Knuth")
                .with_field("title", "Literate Programming")
                .with_field("year", "1984"),
            BibEntry::new("pair", "book")
                .with_field("author", "Doe, Jane and Richard Roe")
                .with_field("year", "2020"),
            BibEntry::new("many", "misc")
                .with_field("author", "A. One and B. Two and C. Three")
                .with_field("year", "2021"),
            BibEntry::new("anon", "misc").with_field("title", "Anonymous Work"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_short_citation_forms() {
        let bib = bibliography();
        let short = |key: &str| format_short_citation(bib.get(key).unwrap());
        assert_eq!(short("knuth1984"), "Knuth, 1984");
        assert_eq!(short("pair"), "Doe & Roe, 2020");
        assert_eq!(short("many"), "One et al., 2021");
        assert_eq!(short("anon"), "Anonymous Work, n.d.");
    }

    #[test]
    fn test_citations_resolved_in_first_citation_order() {
        let mut doc = parse("See [@pair; @knuth1984, p. 4] and [@pair].").unwrap();
        let mut diagnostics = Diagnostics::default();
        let cited = link_citations(&mut doc.blocks, &bibliography(), false, &mut diagnostics);

        let keys: Vec<_> = cited.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["pair", "knuth1984"]);
        assert!(diagnostics.warnings.is_empty());

        let Block::Paragraph(inlines) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        let Inline::Citation(citation) = &inlines[1] else {
            panic!("expected citation, got {:?}", inlines[1]);
        };
        assert_eq!(
            citation.items[1],
            CiteItem {
                key: "knuth1984".into(),
                locator: Some("p. 4".into()),
                resolved: Some("Knuth, 1984".into()),
            }
        );
    }

    #[test]
    fn test_unknown_key_policy() {
        let doc = parse("Cite [@ghost].").unwrap();

        let mut lenient = doc.clone();
        let mut diagnostics = Diagnostics::default();
        link_citations(&mut lenient.blocks, &bibliography(), false, &mut diagnostics);
        assert_eq!(diagnostics.warnings[0].kind, DiagnosticKind::UnknownCitation);
        assert_eq!(diagnostics.warnings[0].identifier, "ghost");
        assert!(diagnostics.errors.is_empty());

        let mut strict = doc;
        let mut diagnostics = Diagnostics::default();
        link_citations(&mut strict.blocks, &bibliography(), true, &mut diagnostics);
        assert!(matches!(
            &diagnostics.errors[..],
            [ResolveError::UnknownCitation { key, .. }] if key == "ghost"
        ));
    }
}
