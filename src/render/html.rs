//! HTML renderer for resolved documents.

use super::RenderConfig;
use crate::ast::{
    label_to_id, Alignment, Block, Citation, CrossReference, EnvironmentKind, Footnote, Inline,
    Label, ReferenceTarget,
};
use crate::bibtex::BibEntry;
use crate::error::RenderError;
use crate::render::math::{create_renderer, MathRenderer};
use crate::resolve::numbering::heading_id;
use crate::resolve::ResolvedDocument;
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, RenderError>;

/// Render a resolved document to HTML.
///
/// In strict mode a document that still carries unresolved references,
/// citations or footnotes is refused with [`RenderError::StrictMode`].
pub fn render_html(doc: &ResolvedDocument, config: &RenderConfig) -> Result<String> {
    if config.strict_mode {
        let unresolved: Vec<String> = doc
            .warnings
            .iter()
            .filter(|w| w.kind.is_unresolved())
            .map(|w| w.to_string())
            .collect();
        if !unresolved.is_empty() {
            return Err(RenderError::StrictMode {
                diagnostics: unresolved,
            });
        }
    }

    let html = HtmlRenderer::new(doc, config).render()?;
    tracing::debug!(
        bytes = html.len(),
        backend = %config.math_backend,
        standalone = config.standalone,
        "rendered document"
    );
    Ok(html)
}

struct HtmlRenderer<'a> {
    doc: &'a ResolvedDocument,
    config: &'a RenderConfig,
    math: Box<dyn MathRenderer>,
    output: String,
    /// Headings rendered so far, for ids of unlabeled headings
    heading_index: usize,
    /// Markers emitted per footnote number, for unique back-link targets
    footnote_refs: BTreeMap<usize, usize>,
}

impl<'a> HtmlRenderer<'a> {
    fn new(doc: &'a ResolvedDocument, config: &'a RenderConfig) -> Self {
        Self {
            doc,
            config,
            math: create_renderer(config.math_backend),
            output: String::new(),
            heading_index: 0,
            footnote_refs: BTreeMap::new(),
        }
    }

    fn class(&self, name: &str) -> String {
        self.config.class(name)
    }

    fn render(mut self) -> Result<String> {
        if self.config.standalone {
            self.render_standalone()?;
        } else {
            self.render_body_content()?;
        }
        Ok(self.output)
    }

    fn render_standalone(&mut self) -> Result<()> {
        let metadata = &self.doc.document.metadata;
        let title = self
            .config
            .title
            .as_deref()
            .or(metadata.title.as_deref())
            .unwrap_or("Document");

        self.output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        self.output.push_str("<meta charset=\"UTF-8\">\n");
        self.output
            .push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
        self.output
            .push_str(&format!("<title>{}</title>\n", escape_html(title)));

        if let Some(head) = self.math.head_content() {
            self.output.push_str(&head);
            self.output.push('\n');
        }

        self.output.push_str(&self.default_styles());

        if let Some(css) = &self.config.custom_css {
            self.output.push_str("<style>\n");
            self.output.push_str(css);
            self.output.push_str("\n</style>\n");
        }

        self.output.push_str("</head>\n<body>\n");
        self.output
            .push_str(&format!("<article class=\"{}\">\n", self.class("document")));

        self.render_header();
        if self.config.include_toc && !self.doc.toc.is_empty() {
            self.render_toc();
        }
        self.render_body_content()?;

        self.output.push_str("</article>\n</body>\n</html>\n");
        Ok(())
    }

    /// Title block from the front matter.
    fn render_header(&mut self) {
        let metadata = &self.doc.document.metadata;
        if metadata.title.is_none() && metadata.authors.is_empty() && metadata.date.is_none() {
            return;
        }

        let mut header = format!("<header class=\"{}\">\n", self.class("header"));
        if let Some(title) = self.config.title.as_ref().or(metadata.title.as_ref()) {
            header.push_str(&format!(
                "<h1 class=\"{}\">{}</h1>\n",
                self.class("title"),
                escape_html(title)
            ));
        }
        if let Some(subtitle) = &metadata.subtitle {
            header.push_str(&format!(
                "<p class=\"{}\">{}</p>\n",
                self.class("subtitle"),
                escape_html(subtitle)
            ));
        }
        if !metadata.authors.is_empty() {
            header.push_str(&format!(
                "<p class=\"{}\">{}</p>\n",
                self.class("authors"),
                escape_html(&metadata.authors.join(", "))
            ));
        }
        if let Some(date) = &metadata.date {
            header.push_str(&format!(
                "<p class=\"{}\">{}</p>\n",
                self.class("date"),
                escape_html(date)
            ));
        }
        header.push_str("</header>\n");
        self.output.push_str(&header);
    }

    fn render_body_content(&mut self) -> Result<()> {
        let doc = self.doc;
        for block in &doc.document.blocks {
            self.render_block(block)?;
        }

        if !doc.footnotes.is_empty() {
            self.render_footnotes_section()?;
        }

        if !doc.bibliography.is_empty() {
            self.render_bibliography();
        }

        Ok(())
    }

    /// Number of a label, if it was registered.
    fn number_of(&self, label: Option<&Label>) -> Option<&'a str> {
        let doc = self.doc;
        label
            .and_then(|l| doc.labels.get(&l.id))
            .map(|e| e.number.as_str())
    }

    fn push_id(&mut self, label: Option<&Label>) {
        if let Some(label) = label {
            self.output
                .push_str(&format!(r#" id="{}""#, label_to_id(&label.id)));
        }
    }

    fn render_block(&mut self, block: &Block) -> Result<()> {
        match block {
            Block::Paragraph(inlines) => {
                self.output.push_str("<p>");
                self.render_inlines(inlines)?;
                self.output.push_str("</p>\n");
            }
            Block::Heading {
                level,
                content,
                label,
            } => {
                self.heading_index += 1;
                let id = match label {
                    Some(label) => label_to_id(&label.id),
                    None => heading_id(self.heading_index),
                };
                self.output.push_str(&format!("<h{} id=\"{}\">", level, id));

                if let Some(number) = self.number_of(label.as_ref()) {
                    self.output.push_str(&format!(
                        r#"<span class="{}">{}</span> "#,
                        self.class("section-number"),
                        number
                    ));
                }

                self.render_inlines(content)?;
                self.output.push_str(&format!("</h{}>\n", level));
            }
            Block::CodeBlock { language, content } => {
                self.output.push_str("<pre><code");
                if let Some(lang) = language {
                    self.output
                        .push_str(&format!(r#" class="language-{}""#, escape_html(lang)));
                }
                self.output.push('>');
                self.output.push_str(&escape_html(content));
                self.output.push_str("</code></pre>\n");
            }
            Block::ThematicBreak => {
                self.output.push_str("<hr>\n");
            }
            Block::BlockQuote(blocks) => {
                self.output.push_str("<blockquote>\n");
                for block in blocks {
                    self.render_block(block)?;
                }
                self.output.push_str("</blockquote>\n");
            }
            Block::List {
                ordered,
                start,
                items,
            } => {
                let tag = if *ordered { "ol" } else { "ul" };
                self.output.push('<');
                self.output.push_str(tag);
                if let Some(start) = start.filter(|s| *ordered && *s != 1) {
                    self.output.push_str(&format!(r#" start="{}""#, start));
                }
                self.output.push_str(">\n");

                for item in items {
                    self.output.push_str("<li>");
                    if let Some(checked) = item.checked {
                        self.output.push_str(if checked {
                            r#"<input type="checkbox" checked disabled> "#
                        } else {
                            r#"<input type="checkbox" disabled> "#
                        });
                    }
                    match item.content.as_slice() {
                        // Tight items render their paragraph inline
                        [Block::Paragraph(inlines)] => self.render_inlines(inlines)?,
                        blocks => {
                            for block in blocks {
                                self.render_block(block)?;
                            }
                        }
                    }
                    self.output.push_str("</li>\n");
                }

                self.output.push_str(&format!("</{}>\n", tag));
            }
            Block::DisplayMath { content, label, .. } => {
                self.output
                    .push_str(&format!(r#"<div class="{}""#, self.class("equation")));
                self.push_id(label.as_ref());
                self.output.push_str(">\n");

                let rendered = self.math.render_display(content)?;
                self.output.push_str(&rendered);

                if let Some(number) = self.number_of(label.as_ref()) {
                    self.output.push_str(&format!(
                        r#"<span class="{}">({})</span>"#,
                        self.class("equation-number"),
                        number
                    ));
                }

                self.output.push_str("\n</div>\n");
            }
            Block::Environment {
                kind,
                label,
                content,
            } => {
                self.render_environment(kind, label.as_ref(), content)?;
            }
            Block::Figure {
                content,
                caption,
                label,
            } => {
                self.output
                    .push_str(&format!(r#"<figure class="{}""#, self.class("figure")));
                self.push_id(label.as_ref());
                self.output.push_str(">\n");
                for block in content {
                    self.render_block(block)?;
                }
                let number = self.number_of(label.as_ref());
                if caption.is_some() || number.is_some() {
                    self.output.push_str("<figcaption>");
                    self.render_caption("Figure", number, caption.as_deref())?;
                    self.output.push_str("</figcaption>\n");
                }
                self.output.push_str("</figure>\n");
            }
            Block::TableOfContents => {
                // Standalone output places the contents before the body
                if self.config.include_toc && !self.config.standalone {
                    self.render_toc();
                }
            }
            Block::Table {
                headers,
                alignments,
                rows,
                caption,
                label,
            } => {
                self.render_table(headers, alignments, rows, caption.as_deref(), label.as_ref())?;
            }
            Block::RawHtml(html) => {
                self.output.push_str(html);
                self.output.push('\n');
            }
            // Definitions are collected into the footnotes section
            Block::FootnoteDefinition { .. } => {}
        }

        Ok(())
    }

    fn render_environment(
        &mut self,
        kind: &EnvironmentKind,
        label: Option<&Label>,
        content: &[Block],
    ) -> Result<()> {
        let mut classes = vec![self.class("environment"), self.class(&kind.name())];
        if kind.is_theorem_like() {
            classes.push(self.class("theorem-like"));
        }
        self.output
            .push_str(&format!(r#"<div class="{}""#, classes.join(" ")));
        self.push_id(label);
        self.output.push_str(">\n");

        let mut title = kind.display_name();
        if let Some(number) = self.number_of(label) {
            title.push(' ');
            title.push_str(number);
        }
        let header = if matches!(kind, EnvironmentKind::Proof) {
            format!("<em>{}.</em>", escape_html(&title))
        } else {
            format!("<strong>{}</strong>.", escape_html(&title))
        };
        self.output.push_str(&format!(
            "<span class=\"{}\">{}</span>\n",
            self.class("env-header"),
            header
        ));

        self.output
            .push_str(&format!(r#"<div class="{}">"#, self.class("env-content")));
        self.output.push('\n');
        for block in content {
            self.render_block(block)?;
        }
        self.output.push_str("</div>\n");

        if matches!(kind, EnvironmentKind::Proof) {
            self.output
                .push_str(&format!(r#"<span class="{}">∎</span>"#, self.class("qed")));
            self.output.push('\n');
        }

        self.output.push_str("</div>\n");
        Ok(())
    }

    /// Caption text with its "Figure N" prefix; a numbered block without a
    /// caption still shows the prefix.
    fn render_caption(
        &mut self,
        kind: &str,
        number: Option<&str>,
        caption: Option<&[Inline]>,
    ) -> Result<()> {
        match (number, caption) {
            (Some(number), Some(_)) => self
                .output
                .push_str(&format!("<strong>{} {}:</strong> ", kind, number)),
            (Some(number), None) => self
                .output
                .push_str(&format!("<strong>{} {}</strong>", kind, number)),
            (None, _) => {}
        }
        if let Some(caption) = caption {
            self.render_inlines(caption)?;
        }
        Ok(())
    }

    fn render_table(
        &mut self,
        headers: &[Vec<Inline>],
        alignments: &[Alignment],
        rows: &[Vec<Vec<Inline>>],
        caption: Option<&[Inline]>,
        label: Option<&Label>,
    ) -> Result<()> {
        self.output
            .push_str(&format!(r#"<table class="{}""#, self.class("table")));
        self.push_id(label);
        self.output.push_str(">\n");

        let number = self.number_of(label);
        if caption.is_some() || number.is_some() {
            self.output.push_str("<caption>");
            self.render_caption("Table", number, caption)?;
            self.output.push_str("</caption>\n");
        }

        self.output.push_str("<thead>\n<tr>\n");
        for (i, cell) in headers.iter().enumerate() {
            let style = alignment_style(alignments.get(i).copied().unwrap_or_default());
            self.output.push_str(&format!("<th{}>", style));
            self.render_inlines(cell)?;
            self.output.push_str("</th>\n");
        }
        self.output.push_str("</tr>\n</thead>\n");

        self.output.push_str("<tbody>\n");
        for row in rows {
            self.output.push_str("<tr>\n");
            for (i, cell) in row.iter().enumerate() {
                let style = alignment_style(alignments.get(i).copied().unwrap_or_default());
                self.output.push_str(&format!("<td{}>", style));
                self.render_inlines(cell)?;
                self.output.push_str("</td>\n");
            }
            self.output.push_str("</tr>\n");
        }
        self.output.push_str("</tbody>\n</table>\n");

        Ok(())
    }

    fn render_toc(&mut self) {
        let toc = &self.doc.toc;
        let Some(base) = toc.iter().map(|t| t.level).min() else {
            return;
        };

        self.output
            .push_str(&format!(r#"<nav class="{}">"#, self.class("toc")));
        self.output.push_str("\n<h2>Contents</h2>\n<ul>\n");

        let mut depth = base;
        for entry in toc {
            while depth < entry.level {
                self.output.push_str("<ul>\n");
                depth += 1;
            }
            while depth > entry.level {
                self.output.push_str("</ul>\n");
                depth -= 1;
            }

            self.output
                .push_str(&format!("<li><a href=\"#{}\">", entry.html_id));
            if let Some(number) = &entry.number {
                self.output.push_str(&format!(
                    r#"<span class="{}">{}</span> "#,
                    self.class("toc-number"),
                    number
                ));
            }
            self.output.push_str(&escape_html(&entry.text));
            self.output.push_str("</a></li>\n");
        }

        while depth > base {
            self.output.push_str("</ul>\n");
            depth -= 1;
        }
        self.output.push_str("</ul>\n</nav>\n");
    }

    fn render_inlines(&mut self, inlines: &[Inline]) -> Result<()> {
        for inline in inlines {
            self.render_inline(inline)?;
        }
        Ok(())
    }

    fn render_inline(&mut self, inline: &Inline) -> Result<()> {
        match inline {
            Inline::Text(text) => {
                self.output.push_str(&escape_html(text));
            }
            Inline::Emphasis(inlines) => {
                self.output.push_str("<em>");
                self.render_inlines(inlines)?;
                self.output.push_str("</em>");
            }
            Inline::Strong(inlines) => {
                self.output.push_str("<strong>");
                self.render_inlines(inlines)?;
                self.output.push_str("</strong>");
            }
            Inline::Strikethrough(inlines) => {
                self.output.push_str("<del>");
                self.render_inlines(inlines)?;
                self.output.push_str("</del>");
            }
            Inline::Code(code) => {
                self.output.push_str("<code>");
                self.output.push_str(&escape_html(code));
                self.output.push_str("</code>");
            }
            Inline::Link {
                url,
                title,
                content,
            } => {
                self.output
                    .push_str(&format!(r#"<a href="{}""#, escape_html(url)));
                if let Some(title) = title {
                    self.output
                        .push_str(&format!(r#" title="{}""#, escape_html(title)));
                }
                self.output.push('>');
                self.render_inlines(content)?;
                self.output.push_str("</a>");
            }
            Inline::Image { url, alt, title } => {
                self.output.push_str(&format!(
                    r#"<img src="{}" alt="{}""#,
                    escape_html(url),
                    escape_html(alt)
                ));
                if let Some(title) = title {
                    self.output
                        .push_str(&format!(r#" title="{}""#, escape_html(title)));
                }
                self.output.push('>');
            }
            Inline::InlineMath { latex, .. } => {
                let rendered = self.math.render_inline(latex)?;
                self.output.push_str(&rendered);
            }
            Inline::Citation(citation) => self.render_citation(citation),
            Inline::Reference(reference) => self.render_reference(reference),
            Inline::Footnote(footnote) => self.render_footnote_ref(footnote),
            Inline::SoftBreak => {
                self.output.push('\n');
            }
            Inline::HardBreak => {
                self.output.push_str("<br>\n");
            }
            Inline::Label(_) => {}
        }

        Ok(())
    }

    fn render_reference(&mut self, reference: &CrossReference) {
        match &reference.resolved {
            Some(ReferenceTarget::Found { text, html_id }) => {
                self.output.push_str(&format!(
                    "<a href=\"#{}\" class=\"{}\">{}</a>",
                    html_id,
                    self.class("ref"),
                    escape_html(text)
                ));
            }
            _ => {
                self.output.push_str(&format!(
                    "<span class=\"{} {}\" title=\"{}\">??</span>",
                    self.class("ref"),
                    self.class("unresolved"),
                    escape_html(&reference.label)
                ));
            }
        }
    }

    fn render_citation(&mut self, citation: &Citation) {
        let mut parts = Vec::with_capacity(citation.items.len());
        for item in &citation.items {
            let mut part = match &item.resolved {
                Some(short) => format!(
                    "<a href=\"#bib-{}\">{}</a>",
                    label_to_id(&item.key),
                    escape_html(short)
                ),
                None => format!(
                    "<span class=\"{}\">{}</span>",
                    self.class("unresolved"),
                    escape_html(&item.key)
                ),
            };
            if let Some(locator) = &item.locator {
                part.push_str(", ");
                part.push_str(&escape_html(locator));
            }
            parts.push(part);
        }

        self.output.push_str(&format!(
            "<span class=\"{}\">[{}]</span>",
            self.class("citation"),
            parts.join("; ")
        ));
    }

    fn render_footnote_ref(&mut self, footnote: &Footnote) {
        let Some(number) = footnote.number else {
            self.output.push_str(&format!(
                "<sup class=\"{} {}\">?</sup>",
                self.class("footnote-ref"),
                self.class("unresolved")
            ));
            return;
        };

        let seen = self.footnote_refs.entry(number).or_insert(0);
        *seen += 1;
        let back_id = match *seen {
            1 => format!("fnref-{}", number),
            n => format!("fnref-{}-{}", number, n),
        };

        self.output.push_str(&format!(
            "<sup id=\"{}\" class=\"{}\"><a href=\"#fn-{}\">[{}]</a></sup>",
            back_id,
            self.class("footnote-ref"),
            number,
            number
        ));
    }

    fn render_footnotes_section(&mut self) -> Result<()> {
        let doc = self.doc;
        self.output
            .push_str(&format!(r#"<section class="{}">"#, self.class("footnotes")));
        self.output.push_str("\n<hr>\n<ol>\n");

        for footnote in &doc.footnotes {
            self.output
                .push_str(&format!("<li id=\"fn-{}\">", footnote.number));
            self.render_inlines(&footnote.content)?;
            self.output.push_str(&format!(
                " <a href=\"#fnref-{}\" class=\"{}\">↩</a></li>\n",
                footnote.number,
                self.class("footnote-back")
            ));
        }

        self.output.push_str("</ol>\n</section>\n");
        Ok(())
    }

    fn render_bibliography(&mut self) {
        self.output
            .push_str(&format!(r#"<section class="{}">"#, self.class("bibliography")));
        self.output.push_str("\n<h2>References</h2>\n<ol>\n");

        for entry in &self.doc.bibliography {
            self.output.push_str(&format!(
                "<li id=\"bib-{}\">{}</li>\n",
                label_to_id(&entry.key),
                format_bibliography_entry(entry)
            ));
        }

        self.output.push_str("</ol>\n</section>\n");
    }

    fn default_styles(&self) -> String {
        format!(
            r#"<style>
.{p}document {{ max-width: 800px; margin: 0 auto; padding: 2em; font-family: Georgia, serif; line-height: 1.6; }}
.{p}header {{ text-align: center; margin-bottom: 2em; }}
.{p}subtitle, .{p}authors, .{p}date {{ margin: 0.25em 0; color: #444; }}
.{p}section-number {{ color: #666; margin-right: 0.5em; }}
.{p}equation {{ display: flex; align-items: center; justify-content: space-between; margin: 1em 0; }}
.{p}equation-number {{ color: #666; }}
.{p}theorem-like {{ margin: 1.5em 0; padding: 1em; background: #f8f8f8; border-left: 3px solid #333; }}
.{p}proof {{ margin: 1em 0; }}
.{p}qed {{ float: right; }}
.{p}figure {{ margin: 2em 0; text-align: center; }}
.{p}figure img {{ max-width: 100%; }}
.{p}table {{ border-collapse: collapse; margin: 1em auto; }}
.{p}table th, .{p}table td {{ border: 1px solid #ddd; padding: 0.5em 1em; }}
.{p}table th {{ background: #f0f0f0; }}
.{p}toc {{ background: #fafafa; padding: 1em 2em; margin: 2em 0; border-radius: 4px; }}
.{p}toc ul {{ list-style: none; padding-left: 1.5em; }}
.{p}toc > ul {{ padding-left: 0; }}
.{p}ref {{ color: #0066cc; text-decoration: none; }}
.{p}ref:hover {{ text-decoration: underline; }}
.{p}unresolved {{ color: #b00; }}
.{p}footnotes {{ font-size: 0.9em; color: #666; }}
.{p}footnote-ref {{ font-size: 0.8em; }}
.{p}bibliography {{ margin-top: 3em; }}
.{p}bibliography ol {{ padding-left: 2em; }}
.{p}env-header {{ font-weight: bold; }}
.{p}env-content {{ margin-top: 0.5em; }}
</style>
"#,
            p = self.class("")
        )
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn alignment_style(align: Alignment) -> &'static str {
    match align {
        Alignment::Left => "",
        Alignment::Center => r#" style="text-align: center""#,
        Alignment::Right => r#" style="text-align: right""#,
    }
}

/// One reference-list entry: authors, year, title, venue, publisher, DOI.
fn format_bibliography_entry(entry: &BibEntry) -> String {
    let mut parts = Vec::new();

    if !entry.authors.is_empty() {
        parts.push(escape_html(&entry.authors.join(", ")));
    }

    if let Some(year) = entry.year() {
        parts.push(format!("({})", escape_html(year)));
    }

    if let Some(title) = entry.title() {
        parts.push(format!("<em>{}</em>", escape_html(title)));
    }

    if let Some(journal) = entry.field("journal") {
        let mut venue = escape_html(journal);
        if let Some(volume) = entry.field("volume") {
            venue.push_str(&format!(", {}", escape_html(volume)));
            if let Some(number) = entry.field("number") {
                venue.push_str(&format!("({})", escape_html(number)));
            }
        }
        if let Some(pages) = entry.field("pages") {
            venue.push_str(&format!(", {}", escape_html(pages)));
        }
        parts.push(venue);
    } else if let Some(booktitle) = entry.field("booktitle") {
        parts.push(format!("In <em>{}</em>", escape_html(booktitle)));
    }

    if let Some(publisher) = entry.field("publisher") {
        parts.push(escape_html(publisher));
    }

    if let Some(doi) = entry.field("doi") {
        let doi = escape_html(doi);
        parts.push(format!(r#"<a href="https://doi.org/{}">{}</a>"#, doi, doi));
    }

    if parts.is_empty() {
        return escape_html(&entry.key);
    }
    parts.join(". ") + "."
}
