//! Rule compilation and matching.
//!
//! A [`Rule`] owns a template and the matchers derived from it. Compilation
//! happens eagerly when the rule is registered, so a bad pattern surfaces
//! immediately rather than at first use:
//!
//! ```text
//! raw pattern ── template::expand ──► expanded pattern   ({@refs} spliced)
//!                      │
//!                      ▼
//!              template::segments                        (literals | fields)
//!                      │
//!                      ▼
//!               build_matcher ×2      ^(?P<side000>[\w.\-/:]+)-…$
//!                      │              exact + case-insensitive twin
//!                      ▼
//!            solve / parse / validate
//! ```
//!
//! Repeated placeholders are legal in templates but capture-group names
//! must be unique, so every occurrence is suffixed while the expression is
//! built and stripped again when results are reported (see `occurrence`).
//!
//! Parsing is gated by a cheap structural pre-check: the literal characters
//! of the pattern must all be present in the candidate name. A pattern with
//! no literal text at all has no field boundaries and cannot be parsed —
//! solving such a pattern still works, the capability is asymmetric.

use bitflags::bitflags;
use indexmap::IndexMap;
use regex::Regex;

use super::{occurrence, template};
use crate::Value;
use crate::engine::template::Segment;
use crate::error::{NamingError, Result};
use crate::tokens::{TokenKind, TokenNumber};

bitflags! {
    /// Where the compiled expression is pinned when matching a candidate.
    ///
    /// `START` and `END` leave the opposite side open for arbitrary
    /// content; `BOTH` requires an exact end-to-end match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Anchor: u8 {
        const START = 1 << 0;
        const END   = 1 << 1;
        const BOTH  = Self::START.bits() | Self::END.bits();
    }
}

impl Anchor {
    pub(crate) fn as_str(self) -> &'static str {
        if self.contains(Anchor::BOTH) {
            "both"
        } else if self.contains(Anchor::START) {
            "start"
        } else {
            "end"
        }
    }

    pub(crate) fn parse_name(name: &str) -> Option<Anchor> {
        match name {
            "start" => Some(Anchor::START),
            "end" => Some(Anchor::END),
            "both" => Some(Anchor::BOTH),
            _ => None,
        }
    }
}

/// Default capture class for a placeholder: the name-safe characters
/// commonly found in pipeline names and paths.
const FIELD_CLASS: &str = r"[\w.\-/:]+";

/// A named template compiled into a matching expression.
///
/// Constructed through `Session::add_rule`, which supplies the reference
/// lookup for `{@other_rule}` expansion.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    pattern: String,
    anchor: Anchor,
    expanded: String,
    matcher: Regex,
    matcher_ci: Regex,
}

impl Rule {
    pub(crate) fn compile<F>(name: &str, pattern: &str, anchor: Anchor, lookup: &F) -> Result<Rule>
    where
        F: Fn(&str) -> Option<String>,
    {
        if name.is_empty() {
            return Err(NamingError::Rule {
                rule: name.to_string(),
                reason: "rule name must not be empty".to_string(),
            });
        }
        if pattern.is_empty() {
            return Err(NamingError::Rule {
                rule: name.to_string(),
                reason: "pattern must not be empty".to_string(),
            });
        }
        if anchor.is_empty() {
            return Err(NamingError::Rule {
                rule: name.to_string(),
                reason: "anchor must pin the start, the end, or both".to_string(),
            });
        }
        let expanded = template::expand(name, pattern, lookup)?;
        let segments = template::segments(name, &expanded)?;
        let matcher = build_matcher(name, &segments, anchor, false)?;
        let matcher_ci = build_matcher(name, &segments, anchor, true)?;
        Ok(Rule { name: name.to_string(), pattern: pattern.to_string(), anchor, expanded, matcher, matcher_ci })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template as registered, references unexpanded.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The template with every `{@reference}` spliced in.
    pub fn expanded_pattern(&self) -> &str {
        &self.expanded
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Ordered placeholder names of the expanded pattern; a name appears
    /// once per occurrence. Re-derived from the pattern on every access.
    pub fn fields(&self) -> Vec<String> {
        // The expanded pattern was validated at compile time.
        template::segments(&self.name, &self.expanded).map(|segs| template::fields(&segs)).unwrap_or_default()
    }

    /// Render a name from per-field values. Repeated placeholders are
    /// addressed by their 1-based keys (`side1`, `side2`); every other
    /// field by its bare name. Missing keys fail, naming every unmet field
    /// and the pattern.
    pub fn solve(&self, values: &IndexMap<String, String>) -> Result<String> {
        let segments = template::segments(&self.name, &self.expanded)?;
        let counts = field_counts(&segments);
        let mut seen: IndexMap<String, usize> = IndexMap::new();
        let mut missing: Vec<String> = Vec::new();
        let mut out = String::new();
        for seg in &segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let idx = next_occurrence(&mut seen, field);
                    let key = occurrence::result_key(field, idx, repeats(&counts, field));
                    match values.get(&key) {
                        Some(value) => out.push_str(value),
                        None => missing.push(key),
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(NamingError::Solving {
                rule: self.name.clone(),
                reason: format!("missing value(s) for {}; pattern is '{}'", missing.join(", "), self.expanded),
            });
        }
        Ok(out)
    }

    /// Decode a name into per-field values, delegating abbreviation
    /// recovery to each owning token.
    ///
    /// Returns `None` when the pattern has no literal separators (field
    /// boundaries would be ambiguous), an empty mapping when the structural
    /// pre-check passed but the expression rejected the candidate, and a
    /// `Parsing` error when the candidate is missing expected separators.
    pub fn parse(&self, name: &str, tokens: &IndexMap<String, TokenKind>) -> Result<Option<IndexMap<String, Value>>> {
        let segments = template::segments(&self.name, &self.expanded)?;
        match self.check_separators(name, &segments) {
            SeparatorCheck::NoSeparators => return Ok(None),
            SeparatorCheck::Missing(reason) => {
                return Err(NamingError::Parsing { name: name.to_string(), reason });
            }
            SeparatorCheck::Passed => {}
        }
        let Some(caps) = self.matcher.captures(name) else {
            return Ok(Some(IndexMap::new()));
        };
        let counts = field_counts(&segments);
        let mut out: IndexMap<String, Value> = IndexMap::new();
        for group in self.matcher.capture_names().flatten() {
            let Some(m) = caps.name(group) else { continue };
            let (field, idx) = occurrence::strip(group);
            let Some(token) = tokens.get(field) else {
                tracing::debug!(rule = %self.name, token = field, "token is not registered, skipping field");
                continue;
            };
            let key = occurrence::result_key(field, idx, repeats(&counts, field));
            out.insert(key, token.parse_value(m.as_str())?);
        }
        Ok(Some(out))
    }

    /// Check a name against this rule without decoding it.
    ///
    /// Non-required captured fields must be legal options of their token
    /// (by full name or abbreviation); numeric captures must carry the
    /// configured affixes and at least the padded digit count. `expected`
    /// values cross-check decoded full names, raw abbreviations, or
    /// numbers. `strict` additionally pins literal text to exact case and
    /// turns the padding-overflow warning into a rejection.
    pub fn validate(
        &self,
        name: &str,
        expected: &IndexMap<String, Value>,
        strict: bool,
        tokens: &IndexMap<String, TokenKind>,
    ) -> bool {
        let Ok(segments) = template::segments(&self.name, &self.expanded) else {
            return false;
        };
        match self.check_separators(name, &segments) {
            SeparatorCheck::Passed => {}
            SeparatorCheck::NoSeparators | SeparatorCheck::Missing(_) => return false,
        }
        let matcher = if strict { &self.matcher } else { &self.matcher_ci };
        let Some(caps) = matcher.captures(name) else {
            return false;
        };
        let counts = field_counts(&segments);
        for group in matcher.capture_names().flatten() {
            let Some(m) = caps.name(group) else { continue };
            let raw = m.as_str();
            let (field, idx) = occurrence::strip(group);
            let Some(token) = tokens.get(field) else { continue };
            match token {
                TokenKind::Token(t) if !t.required() => {
                    if !t.has_option_fullname(raw) && !t.has_option_abbreviation(raw) {
                        return false;
                    }
                }
                TokenKind::Token(_) => {}
                TokenKind::TokenNumber(t) => {
                    if !number_format_holds(t, raw, strict) {
                        return false;
                    }
                }
            }
            let key = occurrence::result_key(field, idx, repeats(&counts, field));
            if let Some(value) = expected.get(&key).or_else(|| expected.get(field)) {
                if !expected_matches(token, raw, value) {
                    return false;
                }
            }
        }
        true
    }

    /// Structural pre-check: every separator character of the pattern
    /// (non-alphanumeric literal text, e.g. `_`, `-`, `.`) must occur in
    /// the candidate at least as often as in the pattern. Alphanumeric
    /// literal text is hardcoded content, not a boundary, and is left to
    /// the expression itself.
    fn check_separators(&self, name: &str, segments: &[Segment]) -> SeparatorCheck {
        let mut expected: IndexMap<char, usize> = IndexMap::new();
        for seg in segments {
            if let Segment::Literal(text) = seg {
                for ch in text.chars().filter(|ch| !ch.is_ascii_alphanumeric()) {
                    *expected.entry(ch).or_insert(0) += 1;
                }
            }
        }
        if expected.is_empty() {
            tracing::warn!(rule = %self.name, "pattern has no literal separators, parsing is not possible");
            return SeparatorCheck::NoSeparators;
        }
        for (ch, want) in &expected {
            let have = name.chars().filter(|c| c == ch).count();
            if have < *want {
                return SeparatorCheck::Missing(format!(
                    "expected at least {want} occurrence(s) of '{ch}' but found {have}"
                ));
            }
        }
        SeparatorCheck::Passed
    }
}

enum SeparatorCheck {
    Passed,
    /// The pattern has no literal text at all.
    NoSeparators,
    Missing(String),
}

fn build_matcher(rule: &str, segments: &[Segment], anchor: Anchor, case_insensitive: bool) -> Result<Regex> {
    let mut src = String::new();
    if case_insensitive {
        src.push_str("(?i)");
    }
    if anchor.contains(Anchor::START) {
        src.push('^');
    }
    let mut seen: IndexMap<String, usize> = IndexMap::new();
    for seg in segments {
        match seg {
            Segment::Literal(text) => src.push_str(&regex::escape(text)),
            Segment::Field(field) => {
                let idx = next_occurrence(&mut seen, field);
                let group = occurrence::attach(field, idx);
                src.push_str(&format!("(?P<{group}>{FIELD_CLASS})"));
            }
        }
    }
    if anchor.contains(Anchor::END) {
        src.push('$');
    }
    Regex::new(&src).map_err(|err| NamingError::Rule {
        rule: rule.to_string(),
        reason: format!("pattern compiles to an invalid expression: {err}"),
    })
}

fn field_counts(segments: &[Segment]) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for field in template::fields(segments) {
        *counts.entry(field).or_insert(0) += 1;
    }
    counts
}

fn repeats(counts: &IndexMap<String, usize>, field: &str) -> bool {
    counts.get(field).copied().unwrap_or(1) > 1
}

fn next_occurrence(seen: &mut IndexMap<String, usize>, field: &str) -> usize {
    let slot = seen.entry(field.to_string()).or_insert(0);
    let idx = *slot;
    *slot += 1;
    idx
}

fn number_format_holds(token: &TokenNumber, raw: &str, strict: bool) -> bool {
    let Some(rest) = raw.strip_prefix(token.prefix()) else {
        return false;
    };
    let Some(core) = rest.strip_suffix(token.suffix()) else {
        return false;
    };
    if core.is_empty() || !core.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if core.len() < token.padding() {
        return false;
    }
    if core.len() > token.padding() {
        tracing::warn!(
            token = %token.name(),
            raw,
            "number has {} digits but the configured padding is {}, consider increasing the padding",
            core.len(),
            token.padding(),
        );
        if strict {
            return false;
        }
    }
    true
}

fn expected_matches(token: &TokenKind, raw: &str, expected: &Value) -> bool {
    match (token, expected) {
        (TokenKind::TokenNumber(t), Value::Number(n)) => t.parse(raw).map(|v| v == *n).unwrap_or(false),
        (TokenKind::TokenNumber(t), Value::Text(text)) => match text.parse::<u64>() {
            Ok(n) => t.parse(raw).map(|v| v == n).unwrap_or(false),
            Err(_) => false,
        },
        (TokenKind::Token(t), Value::Text(text)) => {
            raw == text.as_str() || t.parse(raw).map(|full| &full == text).unwrap_or(false)
        }
        (TokenKind::Token(_), Value::Number(_)) => false,
    }
}
