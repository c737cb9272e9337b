#![forbid(unsafe_code)]

use crate::error::Error;
use regex::bytes::{Regex, RegexBuilder};
use std::borrow::Cow;

/// A `s/pattern/replacement/flags` substitution applied line by line.
///
/// Any delimiter other than a backslash, newline or alphanumeric may replace
/// `/`. Patterns use regex crate syntax. In the replacement `&` is the whole
/// match, `\1`..`\9` are groups, and `\n` is a newline. Supported flags are
/// `g` (every match on the line) and `i`/`I` (case insensitive).
#[derive(Debug, Clone)]
pub struct SedExpr {
    regex: Regex,
    replacement: String,
    global: bool,
}

impl SedExpr {
    pub fn parse(expr: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidCleanExpr {
            expr: expr.to_owned(),
            reason: reason.to_owned(),
        };

        let mut chars = expr.chars();
        if chars.next() != Some('s') {
            return Err(invalid("must start with 's'"));
        }
        let delim = match chars.next() {
            Some(c) if c != '\\' && c != '\n' && !c.is_alphanumeric() => c,
            _ => return Err(invalid("invalid delimiter")),
        };

        let pattern = section(&mut chars, delim, Pattern).ok_or_else(|| invalid("unterminated pattern"))?;
        let replacement =
            section(&mut chars, delim, Replacement).ok_or_else(|| invalid("unterminated replacement"))?;

        let mut global = false;
        let mut insensitive = false;
        for flag in chars {
            match flag {
                'g' => global = true,
                'i' | 'I' => insensitive = true,
                _ => return Err(invalid("unsupported flag")),
            }
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(insensitive)
            .build()
            .map_err(|err| invalid(&err.to_string()))?;
        Ok(Self {
            regex,
            replacement,
            global,
        })
    }

    /// Apply the substitution to every line of `input`. Line endings are
    /// kept out of reach of the pattern.
    pub fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        if !self.regex.is_match(input) {
            return Cow::Borrowed(input);
        }
        let mut out = Vec::with_capacity(input.len());
        for line in input.split_inclusive(|b| *b == b'\n') {
            let (body, ending) = match line.strip_suffix(b"\n") {
                Some(body) => (body, &b"\n"[..]),
                None => (line, &b""[..]),
            };
            let replaced = if self.global {
                self.regex.replace_all(body, self.replacement.as_bytes())
            } else {
                self.regex.replace(body, self.replacement.as_bytes())
            };
            out.extend_from_slice(&replaced);
            out.extend_from_slice(ending);
        }
        Cow::Owned(out)
    }
}

/// Apply every expression in order.
pub fn apply_all<'a>(exprs: &[SedExpr], input: &'a [u8]) -> Cow<'a, [u8]> {
    exprs.iter().fold(Cow::Borrowed(input), |acc, expr| match acc {
        Cow::Borrowed(bytes) => expr.apply(bytes),
        Cow::Owned(bytes) => Cow::Owned(expr.apply(&bytes).into_owned()),
    })
}

#[derive(Clone, Copy)]
enum Part {
    Pattern,
    Replacement,
}
use Part::{Pattern, Replacement};

/// Read up to the next unescaped `delim`, translating escapes for `part`.
/// `None` when the delimiter never shows up.
fn section(chars: &mut std::str::Chars<'_>, delim: char, part: Part) -> Option<String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match (c, part) {
            (c, _) if c == delim => return Some(out),
            ('\\', Pattern) => match chars.next()? {
                c if c == delim => out.push_str(&regex::escape(&c.to_string())),
                c => {
                    out.push('\\');
                    out.push(c);
                }
            },
            ('\\', Replacement) => match chars.next()? {
                c if c == delim => push_literal(&mut out, c),
                'n' => out.push('\n'),
                '&' => out.push('&'),
                c @ '0'..='9' => {
                    out.push_str("${");
                    out.push(c);
                    out.push('}');
                }
                c => push_literal(&mut out, c),
            },
            ('&', Replacement) => out.push_str("${0}"),
            (c, Replacement) => push_literal(&mut out, c),
            (c, Pattern) => out.push(c),
        }
    }
    None
}

fn push_literal(out: &mut String, c: char) {
    if c == '$' {
        out.push_str("$$");
    } else {
        out.push(c);
    }
}
