use std::collections::HashMap;

/// Identifiers that are never rewritten into context lookups: language
/// literals, operators spelled as words, and well-known globals.
pub const RESERVED_WORDS: &[&str] = &[
    "true", "false", "NaN", "null", "undefined", "debugger", "console", "window", "in",
    "instanceof", "new", "function", "return", "this", "typeof", "eval", "void", "Math",
    "RegExp", "Array", "Object", "Date", "Infinity", "parseInt", "parseFloat", "isNaN",
    "Number", "String", "Boolean", "JSON",
];

// ── ExpressionFormatter ───────────────────────────────────────────────────

/// Memoizing wrapper around [`format_expression`].
///
/// One formatter lives in each registry, so an expression string shared
/// by many templates is scanned once.
#[derive(Debug, Default)]
pub struct ExpressionFormatter {
    cache: HashMap<String, String>,
}

impl ExpressionFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&mut self, expr: &str) -> String {
        if let Some(hit) = self.cache.get(expr) {
            return hit.clone();
        }
        let formatted = format_expression(expr);
        self.cache.insert(expr.to_string(), formatted.clone());
        formatted
    }

    /// Number of distinct expressions formatted so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

// ── format_expression ─────────────────────────────────────────────────────

/// Rewrite every bare identifier in `expr` into a `context['name']` lookup.
///
/// Quoted strings, numeric literals, operators, property names after `.`
/// and [`RESERVED_WORDS`] are copied through unchanged.
///
/// ```
/// use quill_template::expr::format_expression;
///
/// assert_eq!(format_expression("a.b + c"), "context['a'].b + context['c']");
/// assert_eq!(format_expression("'a var'"), "'a var'");
/// ```
pub fn format_expression(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 16);
    let mut quote: Option<char> = None;
    let mut ident = String::new();
    let mut ident_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == q && chars[i - 1] != '\\' {
                quote = None;
            }
            i += 1;
            continue;
        }

        if is_ident_char(c) && !(ident.is_empty() && c.is_ascii_digit()) {
            if ident.is_empty() {
                ident_start = i;
            }
            ident.push(c);
            i += 1;
            continue;
        }

        flush(&mut out, &mut ident, ident_start, &chars);

        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
            i += 1;
        } else if c.is_ascii_digit() {
            i = copy_number(&chars, i, &mut out);
        } else {
            out.push(c);
            i += 1;
        }
    }
    flush(&mut out, &mut ident, ident_start, &chars);
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn flush(out: &mut String, ident: &mut String, start: usize, chars: &[char]) {
    if ident.is_empty() {
        return;
    }
    let after_dot = start > 0 && chars[start - 1] == '.';
    if after_dot || RESERVED_WORDS.contains(&ident.as_str()) {
        out.push_str(ident);
    } else {
        out.push_str("context['");
        out.push_str(ident);
        out.push_str("']");
    }
    ident.clear();
}

/// Copy a numeric literal starting at `start`, including hex digits,
/// fractions and signed exponents. Returns the index after the literal.
fn copy_number(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let signed_exponent = (c == '+' || c == '-')
            && i > start
            && matches!(chars[i - 1], 'e' | 'E')
            && !chars[start..i].iter().any(|&d| d == 'x' || d == 'X');
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || signed_exponent {
            out.push(c);
            i += 1;
        } else {
            break;
        }
    }
    i
}
