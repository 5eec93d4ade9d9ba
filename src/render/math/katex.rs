//! KaTeX and MathJax passthrough renderers.
//!
//! Both leave the LaTeX source in the page, wrapped in `\(..\)` or `\[..\]`,
//! for a client-side script to typeset.

use super::{escape_math, MathRenderer};
use crate::error::RenderError;

/// Passthrough for KaTeX's auto-render extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct KaTeXRenderer;

/// Passthrough for MathJax 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathJaxRenderer;

fn inline_container(engine: &str, latex: &str) -> String {
    format!(
        r#"<span class="math inline" data-math="{}">\({}\)</span>"#,
        engine,
        escape_math(latex)
    )
}

fn display_container(engine: &str, latex: &str) -> String {
    format!(
        r#"<div class="math display" data-math="{}">\[{}\]</div>"#,
        engine,
        escape_math(latex)
    )
}

impl MathRenderer for KaTeXRenderer {
    fn render_inline(&self, latex: &str) -> Result<String, RenderError> {
        Ok(inline_container("katex", latex))
    }

    fn render_display(&self, latex: &str) -> Result<String, RenderError> {
        Ok(display_container("katex", latex))
    }

    fn head_content(&self) -> Option<String> {
        Some(KATEX_HEAD.to_string())
    }
}

impl MathRenderer for MathJaxRenderer {
    fn render_inline(&self, latex: &str) -> Result<String, RenderError> {
        Ok(inline_container("mathjax", latex))
    }

    fn render_display(&self, latex: &str) -> Result<String, RenderError> {
        Ok(display_container("mathjax", latex))
    }

    fn head_content(&self) -> Option<String> {
        Some(MATHJAX_HEAD.to_string())
    }
}

const KATEX_HEAD: &str = r#"<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css" crossorigin="anonymous">
<script defer src="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.js" crossorigin="anonymous"></script>
<script defer src="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/contrib/auto-render.min.js" crossorigin="anonymous"
    onload="renderMathInElement(document.body, {
        delimiters: [
            {left: '\\[', right: '\\]', display: true},
            {left: '\\(', right: '\\)', display: false}
        ]
    });"></script>"#;

const MATHJAX_HEAD: &str = r#"<script>
MathJax = {
    tex: {
        inlineMath: [['\\(', '\\)']],
        displayMath: [['\\[', '\\]']]
    }
};
</script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_math() {
        let result = KaTeXRenderer.render_inline("E = mc^2").unwrap();
        assert_eq!(
            result,
            r#"<span class="math inline" data-math="katex">\(E = mc^2\)</span>"#
        );
    }

    #[test]
    fn test_display_math_mathjax() {
        let result = MathJaxRenderer.render_display("\\int_0^1 x dx").unwrap();
        assert_eq!(
            result,
            r#"<div class="math display" data-math="mathjax">\[\int_0^1 x dx\]</div>"#
        );
        assert!(MathJaxRenderer.head_content().unwrap().contains("MathJax-script"));
    }

    #[test]
    fn test_escaping() {
        let result = KaTeXRenderer.render_inline("a < b & c").unwrap();
        assert!(result.contains(r"\(a &lt; b &amp; c\)"));
    }
}
