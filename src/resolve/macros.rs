//! Macro expansion for user-defined LaTeX commands.
//!
//! Expansion is textual: an invocation `\name{a}{b}` is replaced by the
//! macro's template with `#1`, `#2` substituted. Arguments are expanded
//! before substitution and templates are expanded with the macro's name on
//! a stack, which is how cycles are detected.

use super::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::ast::{walk_blocks_mut, walk_inlines_mut, Block, Inline, Macro};
use crate::error::{Position, ResolveError};
use std::collections::{BTreeMap, BTreeSet};

/// Expand all user-defined macros in the math of a document.
pub(crate) fn expand_document(
    blocks: &mut [Block],
    macros: &BTreeMap<String, Macro>,
    diagnostics: &mut Diagnostics,
) {
    if macros.is_empty() {
        return;
    }

    let mut expander = MacroExpander::new(macros, diagnostics);
    walk_blocks_mut(blocks, &mut |block| {
        if let Block::DisplayMath {
            content, position, ..
        } = block
        {
            *content = expander.expand(content, *position);
        }
    });
    walk_inlines_mut(blocks, &mut |inline| {
        if let Inline::InlineMath { latex, position } = inline {
            *latex = expander.expand(latex, *position);
        }
    });
}

pub(crate) struct MacroExpander<'a> {
    macros: &'a BTreeMap<String, Macro>,
    diagnostics: &'a mut Diagnostics,
    /// Cycles already reported, so each is reported once per document.
    reported: BTreeSet<String>,
    /// Source position of the math span being expanded.
    position: Position,
}

impl<'a> MacroExpander<'a> {
    pub(crate) fn new(macros: &'a BTreeMap<String, Macro>, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            macros,
            diagnostics,
            reported: BTreeSet::new(),
            position: Position::default(),
        }
    }

    pub(crate) fn expand(&mut self, latex: &str, position: Position) -> String {
        self.position = position;
        let mut stack = Vec::new();
        self.expand_with(latex, &mut stack)
    }

    fn expand_with(&mut self, input: &str, stack: &mut Vec<String>) -> String {
        let macros = self.macros;
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(slash) = rest.find('\\') {
            out.push_str(&rest[..slash]);
            let (name, after_name) = command_name(&rest[slash + 1..]);
            let invocation_start = &rest[slash..];

            let Some(definition) = macros.get(name) else {
                // Not ours: copy `\name` through unchanged
                out.push_str(&invocation_start[..1 + name.len()]);
                rest = after_name;
                continue;
            };

            let Some((args, after_args)) = take_arguments(after_name, definition.arg_count) else {
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::MacroArity,
                    name,
                    format!(
                        "macro `\\{}` expects {} argument(s); invocation left unexpanded",
                        name, definition.arg_count
                    ),
                );
                self.diagnostics.warn(diagnostic.at(self.position));
                out.push_str(&invocation_start[..1 + name.len()]);
                rest = after_name;
                continue;
            };
            let invocation = &invocation_start[..invocation_start.len() - after_args.len()];

            if stack.iter().any(|entry| entry == name) {
                self.report_cycle(stack, name);
                out.push_str(invocation);
                rest = after_args;
                continue;
            }

            let args: Vec<String> = args.iter().map(|arg| self.expand_with(arg, stack)).collect();

            stack.push(name.to_string());
            let template = self.expand_with(&definition.template, stack);
            stack.pop();

            out.push_str(&substitute_args(&template, &args));
            rest = after_args;
        }

        out.push_str(rest);
        out
    }

    fn report_cycle(&mut self, stack: &[String], name: &str) {
        let start = stack.iter().position(|entry| entry == name).unwrap_or(0);
        let chain = stack[start..]
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .map(|n| format!("\\{}", n))
            .collect::<Vec<_>>()
            .join(" -> ");
        if self.reported.insert(chain.clone()) {
            self.diagnostics.error(ResolveError::MacroCycle { chain });
        }
    }
}

/// Split a command name off the text following a backslash. Letter runs form
/// a name; otherwise the name is the single next character.
fn command_name(input: &str) -> (&str, &str) {
    let letters = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(input.len(), |(i, _)| i);
    if letters > 0 {
        return input.split_at(letters);
    }
    match input.chars().next() {
        Some(c) => input.split_at(c.len_utf8()),
        None => ("", input),
    }
}

/// Read `count` braced arguments, skipping whitespace between them.
fn take_arguments(input: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut args = Vec::with_capacity(count);
    let mut rest = input;
    for _ in 0..count {
        let trimmed = rest.trim_start();
        if !trimmed.starts_with('{') {
            return None;
        }
        let close = matching_brace(trimmed)?;
        args.push(&trimmed[1..close]);
        rest = &trimmed[close + 1..];
    }
    Some((args, rest))
}

/// Byte index of the brace closing the one at the start of `input`.
/// Escaped braces do not count.
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

/// Replace `#1`..`#9` in a template with the given arguments. Placeholders
/// without a matching argument are left as written.
fn substitute_args(template: &str, args: &[String]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '#' {
            if let Some(arg) = chars
                .peek()
                .and_then(|d| d.to_digit(10))
                .and_then(|n| (n as usize).checked_sub(1))
                .and_then(|i| args.get(i))
            {
                result.push_str(arg);
                chars.next();
                continue;
            }
        }
        result.push(c);
    }

    result
}
