//! Glob matching for tree paths.
//!
//! Supported syntax:
//!
//! - `*` any run of characters except `/`
//! - `**` zero or more whole path segments (only as a complete component;
//!   elsewhere it behaves like `*`)
//! - `?` one character except `/`
//! - `[abc]`, `[a-z]`, `[^abc]` / `[!abc]` character classes (never match `/`)
//! - `{alt1,alt2}` alternation
//! - `\x` matches `x` literally
//!
//! A pattern is compiled once into a [`globset::GlobMatcher`] and is then
//! safe to share across tasks.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{FindError, Result};

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compiles `pattern`, folding case on both sides when `ignore_case` is set.
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self> {
        let invalid = |reason: String| FindError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let normalized =
            exclude_separator_from_classes(pattern).map_err(|r| invalid(r.to_string()))?;
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .backslash_escape(true)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| invalid(e.kind().to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// The pattern as written by the user.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// One-shot match. Prefer [`Pattern::new`] when matching many paths.
pub fn matches(pattern: &str, path: &str, ignore_case: bool) -> Result<bool> {
    Ok(Pattern::new(pattern, ignore_case)?.is_match(path))
}

/// `literal_separator` only governs `*` and `?`, so classes are adjusted here:
/// negated classes (spelled `!` or `^`) gain `/` in their exclusion set and a
/// literal `/` inside a positive class is rejected.
fn exclude_separator_from_classes(pattern: &str) -> std::result::Result<String, &'static str> {
    let mut out = String::with_capacity(pattern.len() + 2);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' => {
                out.push('[');
                let negated = matches!(chars.peek(), Some('!') | Some('^'));
                if negated {
                    chars.next();
                    out.push('!');
                }
                // A leading `]` is part of the set.
                if chars.peek() == Some(&']') {
                    out.extend(chars.next());
                }

                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '/' if !negated => return Err("character class cannot match '/'"),
                        c => body.push(c),
                    }
                }

                if closed && negated {
                    // Keep a trailing `-` last so it stays a literal.
                    match body.strip_suffix('-') {
                        Some(rest) => body = format!("{}/-", rest),
                        None => body.push('/'),
                    }
                }
                out.push_str(&body);
                // Unclosed classes are left for globset to report.
                if closed {
                    out.push(']');
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
