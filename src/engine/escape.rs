// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Escaping for the engine's SQL dialect.
//!
//! Text inside `MATCH('...')` goes through two parsers: the SQL string literal
//! parser strips one level of backslashes, then the full-text parser sees the
//! rest. Operator characters therefore get a doubled backslash.
//!
//! ```text
//! user input      MATCH literal
//! ----------      -------------
//! t-shirt         t\\-shirt
//! "quoted"        \\"quoted\\"
//! o'neil          o\'neil
//! красный         красный
//! ```

/// Characters with meaning in the full-text query syntax.
const MATCH_OPERATORS: &[char] = &[
    '\\', '(', ')', '|', '-', '!', '@', '~', '"', '&', '/', '^', '$', '=', '<', '*', '?',
];

/// Escape user text for literal matching inside `MATCH('...')`.
///
/// Works per `char`, so multi-byte scripts pass through untouched. Control
/// characters become spaces (they only ever split tokens).
pub fn escape_match(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MATCH_OPERATORS.contains(&c) {
            escaped.push_str("\\\\");
            escaped.push(c);
        } else if c == '\'' {
            escaped.push_str("\\'");
        } else if c.is_control() {
            escaped.push(' ');
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Quote a value as a SQL string literal for attribute comparisons.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            c if c.is_control() => {}
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}
