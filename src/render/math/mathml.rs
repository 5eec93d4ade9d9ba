//! LaTeX math to MathML translation.
//!
//! Covers a bounded subset of LaTeX math: fractions, roots, scripts, Greek
//! letters, operators and relations, big operators, named functions, font
//! commands, accents, `\left`/`\right` fences, spacing and `\text`.
//! Anything outside it is an error; nothing is emitted for a span that
//! fails to translate.

use super::{escape_math, MathRenderer};
use crate::error::RenderError;
use std::iter::Peekable;
use std::str::CharIndices;

/// Translates math to MathML on the server; no script is needed in the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMLRenderer;

impl MathRenderer for MathMLRenderer {
    fn render_inline(&self, latex: &str) -> Result<String, RenderError> {
        let mathml = latex_to_mathml(latex, false)?;
        Ok(format!(r#"<span class="math inline">{}</span>"#, mathml))
    }

    fn render_display(&self, latex: &str) -> Result<String, RenderError> {
        let mathml = latex_to_mathml(latex, true)?;
        Ok(format!(r#"<div class="math display">{}</div>"#, mathml))
    }

    fn head_content(&self) -> Option<String> {
        Some(MATHML_STYLES.to_string())
    }
}

const MATHML_STYLES: &str = r#"<style>
math {
    font-size: 1.1em;
}
div.math.display {
    margin: 1em 0;
}
</style>"#;

/// Translate one LaTeX math expression into a `<math>` element.
pub fn latex_to_mathml(latex: &str, display: bool) -> Result<String, RenderError> {
    let tokens = tokenize(latex)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        latex,
    };
    let nodes = parser.parse_expression(Stop::End)?;

    let mut out = format!(
        r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="{}">"#,
        if display { "block" } else { "inline" }
    );
    write_sequence(&nodes, display, &mut out);
    out.push_str("</math>");
    Ok(out)
}

fn malformed(latex: &str, message: impl Into<String>) -> RenderError {
    RenderError::MalformedMath {
        message: message.into(),
        latex: latex.to_string(),
    }
}

fn unsupported(latex: &str, construct: impl Into<String>) -> RenderError {
    RenderError::UnsupportedMath {
        construct: construct.into(),
        latex: latex.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tokens

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `\name`, or `\` followed by one non-letter, without the backslash
    Command(&'a str),
    /// A text-mode command with its raw braced argument
    Text { command: &'a str, content: &'a str },
    Number(&'a str),
    Letter(char),
    Operator(char),
    Open,
    Close,
    Sup,
    Sub,
    Ampersand,
}

/// Commands whose argument is text, not math.
const TEXT_COMMANDS: &[&str] = &[
    "text",
    "textrm",
    "textnormal",
    "textbf",
    "textit",
    "mbox",
    "operatorname",
];

fn tokenize(latex: &str) -> Result<Vec<Token<'_>>, RenderError> {
    let mut tokens = Vec::new();
    let mut chars = latex.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '\\' => {
                let rest = &latex[i + 1..];
                let letters = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
                let name = if letters > 0 {
                    &rest[..letters]
                } else {
                    match rest.chars().next() {
                        Some(next) => &rest[..next.len_utf8()],
                        None => return Err(malformed(latex, "trailing backslash")),
                    }
                };
                let end = i + 1 + name.len();
                skip_to(&mut chars, end);

                if TEXT_COMMANDS.contains(&name) {
                    let after = &latex[end..];
                    let trimmed = after.trim_start();
                    if !trimmed.starts_with('{') {
                        return Err(malformed(
                            latex,
                            format!("`\\{}` expects a braced argument", name),
                        ));
                    }
                    let close = matching_brace(trimmed)
                        .ok_or_else(|| malformed(latex, "unbalanced braces: missing `}`"))?;
                    tokens.push(Token::Text {
                        command: name,
                        content: &trimmed[1..close],
                    });
                    skip_to(&mut chars, end + (after.len() - trimmed.len()) + close + 1);
                } else {
                    tokens.push(Token::Command(name));
                }
            }
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '^' => tokens.push(Token::Sup),
            '_' => tokens.push(Token::Sub),
            '&' => tokens.push(Token::Ampersand),
            '~' => tokens.push(Token::Command(&latex[i..i + 1])),
            c if c.is_ascii_digit() => {
                let bytes = latex.as_bytes();
                let mut end = i + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
                    end += 1;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                }
                tokens.push(Token::Number(&latex[i..end]));
                skip_to(&mut chars, end);
            }
            c if c.is_alphabetic() => tokens.push(Token::Letter(c)),
            '+' | '-' | '=' | '<' | '>' | '(' | ')' | '[' | ']' | ',' | ';' | '.' | '/' | '|'
            | '!' | '\'' | ':' | '*' | '?' => tokens.push(Token::Operator(c)),
            other => {
                return Err(malformed(latex, format!("unexpected character `{}`", other)));
            }
        }
    }

    Ok(tokens)
}

fn skip_to(chars: &mut Peekable<CharIndices<'_>>, end: usize) {
    while chars.peek().map_or(false, |(j, _)| *j < end) {
        chars.next();
    }
}

fn matching_brace(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tree

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Ident {
        text: String,
        variant: Option<&'static str>,
    },
    Number {
        text: String,
        variant: Option<&'static str>,
    },
    Operator {
        text: String,
        large: bool,
        /// Scripts go under/over in display mode
        limits: bool,
    },
    /// Named function such as `\sin` or `\lim`
    Function {
        name: String,
        limits: bool,
    },
    Text {
        text: String,
        variant: Option<&'static str>,
    },
    Space(&'static str),
    Row(Vec<Node>),
    Frac {
        numerator: Box<Node>,
        denominator: Box<Node>,
        line: bool,
    },
    Sqrt(Box<Node>),
    Root {
        radicand: Box<Node>,
        index: Box<Node>,
    },
    Scripts {
        base: Box<Node>,
        sub: Option<Box<Node>>,
        sup: Option<Box<Node>>,
    },
    Accent {
        base: Box<Node>,
        mark: &'static str,
    },
    Fenced {
        open: &'static str,
        body: Vec<Node>,
        close: &'static str,
    },
}

impl Node {
    fn ident(text: impl Into<String>) -> Self {
        Node::Ident {
            text: text.into(),
            variant: None,
        }
    }

    fn op(text: impl Into<String>) -> Self {
        Node::Operator {
            text: text.into(),
            large: false,
            limits: false,
        }
    }

    fn takes_limits(&self) -> bool {
        matches!(
            self,
            Node::Operator { limits: true, .. } | Node::Function { limits: true, .. }
        )
    }

    /// Apply a font variant to every identifier, number and text leaf.
    fn with_variant(self, variant: &'static str) -> Self {
        match self {
            Node::Ident { text, .. } => Node::Ident {
                text,
                variant: Some(variant),
            },
            Node::Number { text, .. } => Node::Number {
                text,
                variant: Some(variant),
            },
            Node::Text { text, .. } => Node::Text {
                text,
                variant: Some(variant),
            },
            Node::Row(nodes) => Node::Row(nodes.into_iter().map(|n| n.with_variant(variant)).collect()),
            Node::Scripts { base, sub, sup } => Node::Scripts {
                base: Box::new(base.with_variant(variant)),
                sub,
                sup,
            },
            Node::Accent { base, mark } => Node::Accent {
                base: Box::new(base.with_variant(variant)),
                mark,
            },
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    End,
    Brace,
    Right,
    Bracket,
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    latex: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn malformed(&self, message: impl Into<String>) -> RenderError {
        malformed(self.latex, message)
    }

    fn unsupported(&self, construct: impl Into<String>) -> RenderError {
        unsupported(self.latex, construct)
    }

    fn parse_expression(&mut self, stop: Stop) -> Result<Vec<Node>, RenderError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return match stop {
                        Stop::End => Ok(nodes),
                        Stop::Brace => Err(self.malformed("unbalanced braces: missing `}`")),
                        Stop::Right => Err(self.malformed("`\\left` without matching `\\right`")),
                        Stop::Bracket => Err(self.malformed("missing `]` after `\\sqrt[`")),
                    };
                }
                Some(Token::Close) => {
                    if stop == Stop::Brace {
                        self.pos += 1;
                        return Ok(nodes);
                    }
                    return Err(self.malformed("unbalanced braces: unexpected `}`"));
                }
                Some(Token::Command("right")) if stop == Stop::Right => return Ok(nodes),
                Some(Token::Operator(']')) if stop == Stop::Bracket => {
                    self.pos += 1;
                    return Ok(nodes);
                }
                _ => {}
            }
            if let Some(node) = self.parse_scripted()? {
                nodes.push(node);
            }
        }
    }

    /// An atom followed by any number of `_`/`^` scripts.
    fn parse_scripted(&mut self) -> Result<Option<Node>, RenderError> {
        let base = match self.peek() {
            Some(Token::Sup | Token::Sub) => Node::Row(Vec::new()),
            _ => match self.parse_atom()? {
                Some(node) => node,
                None => return Ok(None),
            },
        };

        let mut sub = None;
        let mut sup = None;
        loop {
            match self.peek() {
                Some(Token::Sup) => {
                    if sup.is_some() {
                        return Err(self.malformed("double superscript"));
                    }
                    self.pos += 1;
                    sup = Some(Box::new(self.parse_script_argument('^')?));
                }
                Some(Token::Sub) => {
                    if sub.is_some() {
                        return Err(self.malformed("double subscript"));
                    }
                    self.pos += 1;
                    sub = Some(Box::new(self.parse_script_argument('_')?));
                }
                Some(Token::Command("limits" | "nolimits")) => self.pos += 1,
                _ => break,
            }
        }

        if sub.is_none() && sup.is_none() {
            return Ok(Some(base));
        }
        Ok(Some(Node::Scripts {
            base: Box::new(base),
            sub,
            sup,
        }))
    }

    fn parse_script_argument(&mut self, marker: char) -> Result<Node, RenderError> {
        match self.peek() {
            None | Some(Token::Close | Token::Sup | Token::Sub) => {
                Err(self.malformed(format!("dangling `{}`", marker)))
            }
            _ => self
                .parse_single_argument()?
                .ok_or_else(|| self.malformed(format!("dangling `{}`", marker))),
        }
    }

    /// A required argument of a command.
    fn parse_argument(&mut self, command: &str) -> Result<Node, RenderError> {
        match self.peek() {
            None | Some(Token::Close) => {
                Err(self.malformed(format!("missing argument for `\\{}`", command)))
            }
            _ => self
                .parse_single_argument()?
                .ok_or_else(|| self.malformed(format!("missing argument for `\\{}`", command))),
        }
    }

    /// An unbraced argument is one token; for numbers that is one digit, so
    /// `x^23` and `\frac12` read like TeX.
    fn parse_single_argument(&mut self) -> Result<Option<Node>, RenderError> {
        if let Some(Token::Number(text)) = self.peek() {
            let mut chars = text.chars();
            if let (Some(first), rest) = (chars.next(), chars.as_str()) {
                if !rest.is_empty() {
                    self.tokens[self.pos] = Token::Number(rest);
                    return Ok(Some(Node::Number {
                        text: first.to_string(),
                        variant: None,
                    }));
                }
            }
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Option<Node>, RenderError> {
        let Some(token) = self.next() else {
            return Err(self.malformed("unexpected end of expression"));
        };
        let node = match token {
            Token::Open => Node::Row(self.parse_expression(Stop::Brace)?),
            Token::Close => return Err(self.malformed("unbalanced braces: unexpected `}`")),
            Token::Number(text) => Node::Number {
                text: text.to_string(),
                variant: None,
            },
            Token::Letter(c) => Node::ident(c),
            Token::Operator(c) => Node::op(operator_text(c)),
            Token::Text { command, content } => text_node(command, content),
            Token::Ampersand => return Err(self.unsupported("&")),
            Token::Sup => return Err(self.malformed("dangling `^`")),
            Token::Sub => return Err(self.malformed("dangling `_`")),
            Token::Command(name) => return self.parse_command(name),
        };
        Ok(Some(node))
    }

    fn parse_command(&mut self, name: &'a str) -> Result<Option<Node>, RenderError> {
        let node = match name {
            "frac" | "dfrac" | "tfrac" | "cfrac" => Node::Frac {
                numerator: Box::new(self.parse_argument(name)?),
                denominator: Box::new(self.parse_argument(name)?),
                line: true,
            },
            "binom" | "dbinom" | "tbinom" => Node::Fenced {
                open: "(",
                body: vec![Node::Frac {
                    numerator: Box::new(self.parse_argument(name)?),
                    denominator: Box::new(self.parse_argument(name)?),
                    line: false,
                }],
                close: ")",
            },
            "sqrt" => {
                let index = if self.peek() == Some(Token::Operator('[')) {
                    self.pos += 1;
                    Some(Node::Row(self.parse_expression(Stop::Bracket)?))
                } else {
                    None
                };
                let radicand = Box::new(self.parse_argument(name)?);
                match index {
                    Some(index) => Node::Root {
                        radicand,
                        index: Box::new(index),
                    },
                    None => Node::Sqrt(radicand),
                }
            }
            "left" => {
                let open = self.parse_delimiter("left")?;
                let body = self.parse_expression(Stop::Right)?;
                self.pos += 1;
                let close = self.parse_delimiter("right")?;
                Node::Fenced { open, body, close }
            }
            "right" => return Err(self.malformed("`\\right` without matching `\\left`")),
            "begin" | "end" => return Err(self.unsupported(format!("\\{}", name))),
            "\\" => return Err(self.unsupported("\\\\")),
            "displaystyle" | "textstyle" | "limits" | "nolimits" => return Ok(None),
            _ => {
                if let Some(variant) = font_variant(name) {
                    self.parse_argument(name)?.with_variant(variant)
                } else if let Some(mark) = accent(name) {
                    Node::Accent {
                        base: Box::new(self.parse_argument(name)?),
                        mark,
                    }
                } else if let Some(node) = symbol(name) {
                    node
                } else {
                    return Err(self.unsupported(format!("\\{}", name)));
                }
            }
        };
        Ok(Some(node))
    }

    fn parse_delimiter(&mut self, after: &str) -> Result<&'static str, RenderError> {
        let delimiter = match self.next() {
            Some(Token::Operator(c)) => match c {
                '.' => "",
                '(' => "(",
                ')' => ")",
                '[' => "[",
                ']' => "]",
                '|' => "|",
                '/' => "/",
                _ => return Err(self.unsupported(format!("\\{}{}", after, c))),
            },
            Some(Token::Command(name)) => match name {
                "{" | "lbrace" => "{",
                "}" | "rbrace" => "}",
                "|" | "lVert" | "rVert" => "‖",
                "lvert" | "rvert" => "|",
                "langle" => "⟨",
                "rangle" => "⟩",
                "lfloor" => "⌊",
                "rfloor" => "⌋",
                "lceil" => "⌈",
                "rceil" => "⌉",
                _ => return Err(self.unsupported(format!("\\{}\\{}", after, name))),
            },
            _ => return Err(self.malformed(format!("missing delimiter after `\\{}`", after))),
        };
        Ok(delimiter)
    }
}

fn operator_text(c: char) -> String {
    match c {
        '-' => "−".to_string(),
        '*' => "∗".to_string(),
        '\'' => "′".to_string(),
        other => other.to_string(),
    }
}

fn text_node(command: &str, content: &str) -> Node {
    match command {
        "operatorname" => Node::Function {
            name: content.trim().to_string(),
            limits: false,
        },
        "textbf" => Node::Text {
            text: content.to_string(),
            variant: Some("bold"),
        },
        "textit" => Node::Text {
            text: content.to_string(),
            variant: Some("italic"),
        },
        _ => Node::Text {
            text: content.to_string(),
            variant: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Symbol tables

fn font_variant(name: &str) -> Option<&'static str> {
    Some(match name {
        "mathbb" => "double-struck",
        "mathbf" => "bold",
        "mathrm" => "normal",
        "mathit" => "italic",
        "mathcal" => "script",
        "mathsf" => "sans-serif",
        "mathtt" => "monospace",
        "mathfrak" => "fraktur",
        "boldsymbol" => "bold-italic",
        _ => return None,
    })
}

fn accent(name: &str) -> Option<&'static str> {
    Some(match name {
        "hat" | "widehat" => "^",
        "bar" | "overline" => "¯",
        "vec" => "→",
        "tilde" | "widetilde" => "~",
        "dot" => "˙",
        "ddot" => "¨",
        _ => return None,
    })
}

fn symbol(name: &str) -> Option<Node> {
    if let Some(letter) = greek(name) {
        let upright = name.starts_with(|c: char| c.is_ascii_uppercase());
        return Some(Node::Ident {
            text: letter.to_string(),
            variant: upright.then_some("normal"),
        });
    }
    if let Some((text, limits)) = big_operator(name) {
        return Some(Node::Operator {
            text: text.to_string(),
            large: true,
            limits,
        });
    }
    if let Some(limits) = function(name) {
        return Some(Node::Function {
            name: name.to_string(),
            limits,
        });
    }
    if let Some(width) = space(name) {
        return Some(Node::Space(width));
    }
    if let Some(text) = operator(name) {
        return Some(Node::op(text));
    }
    identifier(name).map(Node::ident)
}

fn greek(name: &str) -> Option<&'static str> {
    Some(match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" => "ϵ",
        "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "vartheta" => "ϑ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "omicron" => "ο",
        "pi" => "π",
        "varpi" => "ϖ",
        "rho" => "ρ",
        "varrho" => "ϱ",
        "sigma" => "σ",
        "varsigma" => "ς",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" => "ϕ",
        "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Upsilon" => "Υ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        _ => return None,
    })
}

/// Big operators and whether they take limits in display mode.
fn big_operator(name: &str) -> Option<(&'static str, bool)> {
    Some(match name {
        "sum" => ("∑", true),
        "prod" => ("∏", true),
        "coprod" => ("∐", true),
        "bigcup" => ("⋃", true),
        "bigcap" => ("⋂", true),
        "bigoplus" => ("⨁", true),
        "bigotimes" => ("⨂", true),
        "bigvee" => ("⋁", true),
        "bigwedge" => ("⋀", true),
        "int" => ("∫", false),
        "iint" => ("∬", false),
        "iiint" => ("∭", false),
        "oint" => ("∮", false),
        _ => return None,
    })
}

/// Named functions and whether they take limits in display mode.
fn function(name: &str) -> Option<bool> {
    match name {
        "lim" | "liminf" | "limsup" | "max" | "min" | "sup" | "inf" | "det" | "gcd" | "Pr"
        | "argmax" | "argmin" => Some(true),
        "sin" | "cos" | "tan" | "cot" | "sec" | "csc" | "arcsin" | "arccos" | "arctan"
        | "sinh" | "cosh" | "tanh" | "coth" | "log" | "ln" | "lg" | "exp" | "deg" | "dim"
        | "ker" | "arg" | "hom" => Some(false),
        _ => None,
    }
}

fn space(name: &str) -> Option<&'static str> {
    Some(match name {
        "," => "0.1667em",
        ":" | ">" => "0.2222em",
        ";" | " " | "~" => "0.2778em",
        "!" => "-0.1667em",
        "quad" => "1em",
        "qquad" => "2em",
        _ => return None,
    })
}

/// Relations, binary operators, arrows and delimiters.
fn operator(name: &str) -> Option<&'static str> {
    Some(match name {
        // relations
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "simeq" => "≃",
        "cong" => "≅",
        "propto" => "∝",
        "ll" => "≪",
        "gg" => "≫",
        "in" => "∈",
        "notin" => "∉",
        "ni" => "∋",
        "subset" => "⊂",
        "supset" => "⊃",
        "subseteq" => "⊆",
        "supseteq" => "⊇",
        "mid" => "∣",
        "parallel" => "∥",
        "perp" => "⊥",
        // binary operators
        "pm" => "±",
        "mp" => "∓",
        "times" => "×",
        "div" => "÷",
        "cdot" => "⋅",
        "ast" => "∗",
        "star" => "⋆",
        "circ" => "∘",
        "bullet" => "∙",
        "oplus" => "⊕",
        "otimes" => "⊗",
        "cup" => "∪",
        "cap" => "∩",
        "setminus" => "∖",
        "wedge" | "land" => "∧",
        "vee" | "lor" => "∨",
        // arrows
        "to" | "rightarrow" => "→",
        "leftarrow" | "gets" => "←",
        "leftrightarrow" => "↔",
        "Rightarrow" | "implies" => "⇒",
        "Leftarrow" => "⇐",
        "Leftrightarrow" | "iff" => "⇔",
        "mapsto" => "↦",
        "uparrow" => "↑",
        "downarrow" => "↓",
        "longrightarrow" => "⟶",
        "longleftarrow" => "⟵",
        // delimiters and punctuation
        "{" | "lbrace" => "{",
        "}" | "rbrace" => "}",
        "|" => "‖",
        "langle" => "⟨",
        "rangle" => "⟩",
        "lfloor" => "⌊",
        "rfloor" => "⌋",
        "lceil" => "⌈",
        "rceil" => "⌉",
        "ldots" | "dots" => "…",
        "cdots" => "⋯",
        "vdots" => "⋮",
        "ddots" => "⋱",
        "colon" => ":",
        "neg" | "lnot" => "¬",
        "%" => "%",
        "$" => "$",
        "#" => "#",
        "&" => "&",
        "_" => "_",
        _ => return None,
    })
}

/// Symbols rendered as identifiers.
fn identifier(name: &str) -> Option<&'static str> {
    Some(match name {
        "infty" => "∞",
        "partial" => "∂",
        "nabla" => "∇",
        "forall" => "∀",
        "exists" => "∃",
        "emptyset" | "varnothing" => "∅",
        "ell" => "ℓ",
        "hbar" => "ℏ",
        "Re" => "ℜ",
        "Im" => "ℑ",
        "aleph" => "ℵ",
        "prime" => "′",
        "angle" => "∠",
        "top" => "⊤",
        "bot" => "⊥",
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Output

fn write_sequence(nodes: &[Node], display: bool, out: &mut String) {
    if let [single] = nodes {
        single.write(display, out);
    } else {
        out.push_str("<mrow>");
        for node in nodes {
            node.write(display, out);
        }
        out.push_str("</mrow>");
    }
}

fn write_leaf(tag: &str, text: &str, variant: Option<&str>, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    if let Some(variant) = variant {
        out.push_str(&format!(r#" mathvariant="{}""#, variant));
    }
    out.push('>');
    out.push_str(&escape_math(text));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_fence(text: &str, out: &mut String) {
    if !text.is_empty() {
        out.push_str(r#"<mo fence="true" stretchy="true">"#);
        out.push_str(&escape_math(text));
        out.push_str("</mo>");
    }
}

impl Node {
    fn write(&self, display: bool, out: &mut String) {
        match self {
            Node::Ident { text, variant } => write_leaf("mi", text, *variant, out),
            Node::Number { text, variant } => write_leaf("mn", text, *variant, out),
            Node::Text { text, variant } => write_leaf("mtext", text, *variant, out),
            Node::Function { name, .. } => write_leaf("mi", name, None, out),
            Node::Operator { text, large, .. } => {
                if *large {
                    out.push_str(r#"<mo largeop="true">"#);
                } else {
                    out.push_str("<mo>");
                }
                out.push_str(&escape_math(text));
                out.push_str("</mo>");
            }
            Node::Space(width) => out.push_str(&format!(r#"<mspace width="{}"/>"#, width)),
            Node::Row(nodes) => {
                out.push_str("<mrow>");
                for node in nodes {
                    node.write(display, out);
                }
                out.push_str("</mrow>");
            }
            Node::Frac {
                numerator,
                denominator,
                line,
            } => {
                out.push_str(if *line {
                    "<mfrac>"
                } else {
                    r#"<mfrac linethickness="0">"#
                });
                numerator.write(display, out);
                denominator.write(display, out);
                out.push_str("</mfrac>");
            }
            Node::Sqrt(radicand) => {
                out.push_str("<msqrt>");
                radicand.write(display, out);
                out.push_str("</msqrt>");
            }
            Node::Root { radicand, index } => {
                out.push_str("<mroot>");
                radicand.write(display, out);
                index.write(display, out);
                out.push_str("</mroot>");
            }
            Node::Scripts { base, sub, sup } => {
                let limits = display && base.takes_limits();
                let tag = match (sub, sup, limits) {
                    (Some(_), Some(_), true) => "munderover",
                    (Some(_), None, true) => "munder",
                    (None, Some(_), true) => "mover",
                    (Some(_), Some(_), false) => "msubsup",
                    (Some(_), None, false) => "msub",
                    _ => "msup",
                };
                out.push('<');
                out.push_str(tag);
                out.push('>');
                base.write(display, out);
                for script in [sub, sup].into_iter().flatten() {
                    script.write(display, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Node::Accent { base, mark } => {
                out.push_str(r#"<mover accent="true">"#);
                base.write(display, out);
                out.push_str("<mo>");
                out.push_str(mark);
                out.push_str("</mo></mover>");
            }
            Node::Fenced { open, body, close } => {
                out.push_str("<mrow>");
                write_fence(open, out);
                for node in body {
                    node.write(display, out);
                }
                write_fence(close, out);
                out.push_str("</mrow>");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inner(latex: &str, display: bool) -> String {
        let full = latex_to_mathml(latex, display).unwrap();
        let start = full.find('>').unwrap() + 1;
        full[start..full.len() - "</math>".len()].to_string()
    }

    #[test]
    fn test_math_element() {
        assert_eq!(
            latex_to_mathml("x", false).unwrap(),
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="inline"><mi>x</mi></math>"#
        );
        assert!(latex_to_mathml("x", true).unwrap().contains(r#"display="block""#));
    }

    #[test]
    fn test_scripts_and_numbers() {
        assert_eq!(
            inner("x^2 + 3.14", false),
            "<mrow><msup><mi>x</mi><mn>2</mn></msup><mo>+</mo><mn>3.14</mn></mrow>"
        );
        assert_eq!(
            inner("a_{ij}^{n}", false),
            "<msubsup><mi>a</mi><mrow><mi>i</mi><mi>j</mi></mrow><mrow><mi>n</mi></mrow></msubsup>"
        );
    }

    #[test]
    fn test_unbraced_arguments_take_one_digit() {
        assert_eq!(
            inner("x^23", false),
            "<mrow><msup><mi>x</mi><mn>2</mn></msup><mn>3</mn></mrow>"
        );
        assert_eq!(inner("\\frac12", false), "<mfrac><mn>1</mn><mn>2</mn></mfrac>");
        assert!(inner("\\sum\\limits_{k}", true).starts_with("<munder>"));
    }

    #[test]
    fn test_fraction_and_roots() {
        assert_eq!(
            inner("\\frac{a}{b}", false),
            "<mfrac><mrow><mi>a</mi></mrow><mrow><mi>b</mi></mrow></mfrac>"
        );
        assert_eq!(inner("\\sqrt x", false), "<msqrt><mi>x</mi></msqrt>");
        assert_eq!(
            inner("\\sqrt[3]{8}", false),
            "<mroot><mrow><mn>8</mn></mrow><mrow><mn>3</mn></mrow></mroot>"
        );
    }

    #[test]
    fn test_greek_and_operators() {
        assert_eq!(
            inner("\\alpha \\leq \\Omega - 1", false),
            r#"<mrow><mi>α</mi><mo>≤</mo><mi mathvariant="normal">Ω</mi><mo>−</mo><mn>1</mn></mrow>"#
        );
    }

    #[test]
    fn test_big_operator_limits_depend_on_mode() {
        assert_eq!(
            inner("\\sum_{i=1}^n", true),
            r#"<munderover><mo largeop="true">∑</mo><mrow><mi>i</mi><mo>=</mo><mn>1</mn></mrow><mi>n</mi></munderover>"#
        );
        assert!(inner("\\sum_{i=1}^n", false).starts_with("<msubsup>"));
        assert!(inner("\\int_0^1", true).starts_with("<msubsup>"));
        assert!(inner("\\lim_{x \\to 0}", true).starts_with("<munder><mi>lim</mi>"));
    }

    #[test]
    fn test_fonts_text_and_accents() {
        assert_eq!(
            inner("\\mathbb{R}", false),
            r#"<mrow><mi mathvariant="double-struck">R</mi></mrow>"#
        );
        assert_eq!(
            inner("\\text{if } x", false),
            "<mrow><mtext>if </mtext><mi>x</mi></mrow>"
        );
        assert_eq!(
            inner("\\vec v", false),
            r#"<mover accent="true"><mi>v</mi><mo>→</mo></mover>"#
        );
    }

    #[test]
    fn test_left_right_fences() {
        assert_eq!(
            inner("\\left( x \\right.", false),
            r#"<mrow><mo fence="true" stretchy="true">(</mo><mi>x</mi></mrow>"#
        );
        assert_eq!(
            inner("\\left\\{ a \\right\\}", false),
            r#"<mrow><mo fence="true" stretchy="true">{</mo><mi>a</mi><mo fence="true" stretchy="true">}</mo></mrow>"#
        );
    }

    #[test]
    fn test_escapes_relations() {
        assert_eq!(inner("a<b", false), "<mrow><mi>a</mi><mo>&lt;</mo><mi>b</mi></mrow>");
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            latex_to_mathml("\\begin{matrix} a \\end{matrix}", true),
            Err(RenderError::UnsupportedMath { construct, .. }) if construct == "\\begin"
        ));
        assert!(matches!(
            latex_to_mathml("a & b", false),
            Err(RenderError::UnsupportedMath { construct, .. }) if construct == "&"
        ));
        assert!(matches!(
            latex_to_mathml("a \\\\ b", false),
            Err(RenderError::UnsupportedMath { construct, .. }) if construct == "\\\\"
        ));
        assert!(matches!(
            latex_to_mathml("\\foo x", false),
            Err(RenderError::UnsupportedMath { construct, latex }) if construct == "\\foo" && latex == "\\foo x"
        ));
    }

    #[test]
    fn test_malformed_input() {
        for bad in ["x^2^3", "x_1_2", "{a", "a}", "x^", "\\frac{a}", "\\left( x"] {
            assert!(
                matches!(latex_to_mathml(bad, false), Err(RenderError::MalformedMath { .. })),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn test_renderer_wraps_in_container() {
        let html = MathMLRenderer.render_display("x").unwrap();
        assert!(html.starts_with(r#"<div class="math display"><math"#));
        assert!(html.ends_with("</math></div>"));
    }
}
