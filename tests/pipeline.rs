use markdown_academic::ast::label_to_id;
use markdown_academic::{
    parse, parse_bibtex, render, render_html, resolve, validate, Bibliography, DocumentInfo, Error,
    MathBackend, RenderConfig, RenderError, ResolveConfig, ResolveError, ResolvedDocument,
};
use pretty_assertions::assert_eq;

fn render_default(input: &str) -> String {
    render(input, None, &RenderConfig::default()).unwrap()
}

fn resolve_default(input: &str) -> ResolvedDocument {
    let doc = parse(input).unwrap();
    resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).unwrap()
}

#[test]
fn heading_renders_as_h1() {
    let html = render_default("# Hello World");
    assert!(html.contains("<h1"));
    assert!(html.contains("Hello World"));
}

#[test]
fn labeled_section_is_referenced_by_number() {
    let html = render_default("# Introduction {#sec:intro}\n\nSee @sec:intro for details.");
    assert!(html.contains(r#"id="sec-intro""#));
    assert!(html.contains("Section 1"));
}

#[test]
fn theorem_is_numbered() {
    let html =
        render_default("::: theorem {#thm:main}\nEvery natural number is interesting.\n:::");
    assert!(html.contains("theorem"));
    assert!(html.contains("Theorem 1"));
}

#[test]
fn standalone_output_is_a_full_document() {
    let config = RenderConfig {
        standalone: true,
        ..RenderConfig::default()
    };
    let html = render("# Title\n\nBody.", None, &config).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<html"));
}

#[test]
fn front_matter_metadata_is_exposed() {
    let doc = parse("+++\ntitle = \"Test Document\"\nauthors = [\"John Doe\"]\n+++\n\nBody.").unwrap();
    assert_eq!(doc.metadata.title.as_deref(), Some("Test Document"));
    assert!(doc.metadata.authors.contains(&"John Doe".to_string()));
}

#[test]
fn equation_statistics_count_inline_and_display() {
    let resolved = resolve_default("Inline $a$ here.\n\n$$\nb\n$$");
    let stats = &resolved.statistics;
    assert_eq!(stats.inline_equation_count, 1);
    assert_eq!(stats.display_equation_count, 1);
    assert_eq!(stats.equation_count, 2);
}

#[test]
fn documents_without_labels_have_no_duplicate_errors() {
    for input in [
        "Plain text.",
        "# A\n\n# A\n\n$$\nx\n$$",
        "::: theorem\nOne.\n:::\n\n::: theorem\nTwo.\n:::",
    ] {
        let doc = parse(input).unwrap();
        assert!(resolve(&doc, &Bibliography::new(), &ResolveConfig::default()).is_ok());
    }
}

#[test]
fn every_label_resolves_to_its_number_and_strict_removal_fails() {
    let input = "\
See @eq:b, @thm:x and @fig:f.

$$
a
$$ {#eq:a}

$$
b
$$ {#eq:b}

::: theorem {#thm:x}
X.
:::

::: figure {#fig:f}
![f](f.png)

Caption.
:::";
    let resolved = resolve_default(input);
    assert_eq!(resolved.label("eq:a").unwrap().display, "Equation (1)");
    assert_eq!(resolved.label("eq:b").unwrap().display, "Equation (2)");
    assert_eq!(resolved.label("thm:x").unwrap().display, "Theorem 1");
    assert_eq!(resolved.label("fig:f").unwrap().display, "Figure 1");

    let html = render_html(&resolved, &RenderConfig::default()).unwrap();
    assert!(html.contains(">Equation (2)</a>"));
    assert!(html.contains(">Theorem 1</a>"));
    assert!(html.contains(">Figure 1</a>"));

    let without_label = input.replace(" {#thm:x}", "");
    let doc = parse(&without_label).unwrap();
    let err = resolve(&doc, &Bibliography::new(), &ResolveConfig::strict()).unwrap_err();
    assert!(matches!(
        &err.0[..],
        [ResolveError::UnknownReference { label, .. }] if label == "thm:x"
    ));
}

#[test]
fn numbering_is_dense_per_category() {
    let input = "\
::: lemma {#lem:1}
a
:::

# Section {#sec:1}

::: lemma {#lem:2}
b
:::

::: theorem {#thm:1}
c
:::

::: lemma {#lem:3}
d
:::";
    let resolved = resolve_default(input);
    let numbers: Vec<_> = ["lem:1", "lem:2", "lem:3", "thm:1", "sec:1"]
        .iter()
        .map(|id| resolved.label(id).unwrap().number.clone())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3", "1", "1"]);
}

#[test]
fn html_ids_replace_colons_only() {
    assert_eq!(label_to_id("sec:intro"), "sec-intro");
    assert_eq!(label_to_id("a:b:c"), "a-b-c");
    assert_eq!(label_to_id("plain_id-1.2"), "plain_id-1.2");
}

#[test]
fn rendering_is_deterministic() {
    let input = "\
+++
title = \"Det\"

[macros]
R = \"\\\\mathbb{R}\"
+++

[[toc]]

# One {#sec:one}

Text $x \\in \\R$ with @sec:one, a note^[Inline.] and [@knuth].

$$
y
$$ {#eq:y}
";
    let bibliography =
        parse_bibtex("@book{knuth, author = {Donald Knuth}, title = {TAOCP}, year = 1968}")
            .unwrap();
    for backend in [MathBackend::KaTeX, MathBackend::MathJax, MathBackend::MathML] {
        let config = RenderConfig {
            math_backend: backend,
            standalone: true,
            ..RenderConfig::default()
        };
        let first = render(input, Some(&bibliography), &config).unwrap();
        let second = render(input, Some(&bibliography), &config).unwrap();
        assert_eq!(first, second);
        assert!(first.contains(r##"<a href="#bib-knuth">Knuth, 1968</a>"##));
    }
}

#[test]
fn strict_mode_rejects_unknown_reference() {
    let config = RenderConfig {
        strict_mode: true,
        ..RenderConfig::default()
    };
    let err = render("See @sec:nowhere.", None, &config).unwrap_err();
    match err {
        Error::Resolution(errors) => assert_eq!(errors.len(), 1),
        other => panic!("expected resolution error, got {other}"),
    }

    // The same document resolved leniently still refuses a strict render.
    let resolved = resolve_default("See @sec:nowhere.");
    assert!(matches!(
        resolved.render(&config),
        Err(RenderError::StrictMode { .. })
    ));
}

#[test]
fn mathml_backend_reports_unsupported_constructs() {
    let config = RenderConfig {
        math_backend: MathBackend::MathML,
        ..RenderConfig::default()
    };
    let err = render("$$\n\\begin{pmatrix} 1 \\end{pmatrix}\n$$", None, &config).unwrap_err();
    assert!(matches!(
        err,
        Error::Render(RenderError::UnsupportedMath { construct, .. }) if construct == "\\begin"
    ));

    let html = render("$\\frac{1}{2}$", None, &config).unwrap();
    assert!(html.contains("<mfrac>"));
}

#[test]
fn resolved_documents_can_be_rendered_from_many_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResolvedDocument>();
    assert_send_sync::<Bibliography>();
    assert_send_sync::<RenderConfig>();

    let resolved = resolve_default("# A {#sec:a}\n\nSee @sec:a and $x$.");
    let config = RenderConfig::default();
    let expected = resolved.render(&config).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| resolved.render(&config).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn validation_and_introspection() {
    let result = validate("# A {#x}\n\n# B {#x}", None, false);
    assert!(!result.valid);
    assert!(result.errors[0].contains("duplicate label `x`"));

    let resolved = resolve_default("# A {#sec:a}\n\n::: theorem {#thm:t}\nT.\n:::");
    let info = DocumentInfo::from_resolved(&resolved);
    assert_eq!(info.labels.len(), 2);
    assert_eq!(info.statistics.label_count, 2);
    assert!(info.to_json().unwrap().contains("\"display\": \"Theorem 1\""));
}

#[test]
fn captionless_numbered_figures_and_tables_show_their_numbers() {
    let html = render_default(
        "::: figure {#fig:a}\n![a](a.png)\n:::\n\n| a |\n|---|\n| 1 |\n\n{#tab:x}\n\nSee @fig:a and @tab:x.",
    );
    let figure = &html[html.find("<figure").unwrap()..html.find("</figure>").unwrap()];
    assert!(figure.contains("Figure 1"));
    let table = &html[html.find("<table").unwrap()..html.find("</table>").unwrap()];
    assert!(table.contains("Table 1"));
}

#[test]
fn custom_environments_never_share_a_builtin_counter() {
    let resolved = resolve_default("::: section {#x:s}\nA.\n:::\n\n# Intro {#sec:intro}");
    assert_eq!(resolved.label("x:s").unwrap().number, "1");
    assert_eq!(resolved.label("sec:intro").unwrap().number, "1");
    assert_eq!(resolved.label("sec:intro").unwrap().display, "Section 1");
}

#[test]
fn nested_inline_footnotes_link_both_ways() {
    let resolved = resolve_default("Text^[outer ^[inner]].");
    assert_eq!(resolved.footnotes.len(), 2);
    assert!(resolved.warnings.is_empty());

    let html = resolved.render(&RenderConfig::default()).unwrap();
    for number in [1, 2] {
        assert!(html.contains(&format!(r#"id="fnref-{}""#, number)));
        assert!(html.contains(&format!(r#"<li id="fn-{}">"#, number)));
    }
    assert!(!html.contains("mda-unresolved"));
}
