//! Template scanning and rule-reference expansion.
//!
//! A pattern is literal text interleaved with `{placeholder}` fields and
//! `{@other_rule}` references. This module is the textual front half of
//! compilation:
//!
//! ```text
//! "{side}-{region}_v{@tail}"
//!         │ expand()            splice referenced patterns, cycle-guarded
//!         ▼
//! "{side}-{region}_v{digits}"
//!         │ segments()          split + validate placeholder identifiers
//!         ▼
//! [Field(side), Literal("-"), Field(region), Literal("_v"), Field(digits)]
//! ```
//!
//! Expansion is depth-bounded and carries a visited set seeded with the
//! rule being compiled, so direct self-reference and indirect cycles both
//! fail with a typed error instead of recursing unboundedly. Diamonds
//! (two branches referencing the same rule) are fine: a name leaves the
//! visited set once its subtree is spliced.

use crate::error::{NamingError, Result};

/// References deeper than this indicate a runaway chain even when the
/// visited set somehow missed it.
const MAX_REFERENCE_DEPTH: usize = 32;

/// One piece of an expanded template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    /// Hardcoded text, escaped verbatim into the matcher.
    Literal(String),
    /// A `{placeholder}` naming a token.
    Field(String),
}

/// Split an expanded pattern into literal and field segments, validating
/// every placeholder as a usable capture-group identifier.
pub(crate) fn segments(rule: &str, pattern: &str) -> Result<Vec<Segment>> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in regex!(r"\{([^{}]+)\}").captures_iter(pattern) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if whole.0 > last {
            out.push(Segment::Literal(pattern[last..whole.0].to_string()));
        }
        if !regex!(r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(name) {
            return Err(NamingError::Rule {
                rule: rule.to_string(),
                reason: format!(
                    "placeholder '{{{name}}}' is not a valid capture name \
                     (letters, digits and underscores, not starting with a digit)"
                ),
            });
        }
        out.push(Segment::Field(name.to_string()));
        last = whole.1;
    }
    if last < pattern.len() {
        out.push(Segment::Literal(pattern[last..].to_string()));
    }
    Ok(out)
}

/// The ordered placeholder names of an expanded pattern; names may repeat.
pub(crate) fn fields(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|seg| match seg {
            Segment::Field(name) => Some(name.clone()),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Direct `{@name}` references of a raw pattern, in order of appearance.
pub(crate) fn references(pattern: &str) -> Vec<String> {
    regex!(r"\{@([A-Za-z_][A-Za-z0-9_]*)\}")
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Recursively splice every `{@name}` reference with that rule's own raw
/// pattern. `lookup` resolves a rule name to its raw pattern.
pub(crate) fn expand<F>(rule: &str, pattern: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut visited = vec![rule.to_string()];
    expand_inner(rule, pattern, lookup, &mut visited, 0)
}

fn expand_inner<F>(
    rule: &str,
    pattern: &str,
    lookup: &F,
    visited: &mut Vec<String>,
    depth: usize,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if depth > MAX_REFERENCE_DEPTH {
        return Err(NamingError::Rule {
            rule: rule.to_string(),
            reason: format!("reference expansion exceeded {MAX_REFERENCE_DEPTH} levels"),
        });
    }
    let mut out = String::new();
    let mut last = 0;
    for caps in regex!(r"\{@([A-Za-z_][A-Za-z0-9_]*)\}").captures_iter(pattern) {
        let (whole, name) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(n)) => (w, n.as_str()),
            _ => continue,
        };
        out.push_str(&pattern[last..whole.start()]);
        if visited.iter().any(|seen| seen == name) {
            return Err(NamingError::Rule {
                rule: rule.to_string(),
                reason: format!("circular reference through '{{@{name}}}'"),
            });
        }
        let target = lookup(name).ok_or_else(|| NamingError::Rule {
            rule: rule.to_string(),
            reason: format!("references unknown rule '{{@{name}}}'"),
        })?;
        visited.push(name.to_string());
        out.push_str(&expand_inner(rule, &target, lookup, visited, depth + 1)?);
        visited.pop();
        last = whole.end();
    }
    out.push_str(&pattern[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_none(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn segments_split_literals_and_fields() {
        let segs = segments("r", "{side}-{region}_v{digits}").unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Field("side".into()),
                Segment::Literal("-".into()),
                Segment::Field("region".into()),
                Segment::Literal("_v".into()),
                Segment::Field("digits".into()),
            ]
        );
        assert_eq!(fields(&segs), vec!["side", "region", "digits"]);
    }

    #[test]
    fn segments_reject_bad_identifiers() {
        let err = segments("r", "{bad-name}_{ok}").unwrap_err();
        assert!(err.to_string().contains("bad-name"));
        assert!(segments("r", "{1digit}").is_err());
    }

    #[test]
    fn expand_leaves_plain_patterns_alone() {
        let out = expand("r", "{a}_{b}", &lookup_none).unwrap();
        assert_eq!(out, "{a}_{b}");
    }

    #[test]
    fn expand_splices_nested_references() {
        let lookup = |name: &str| match name {
            "base" => Some("{side}-{region}".to_string()),
            "tail" => Some("v{@base}".to_string()),
            _ => None,
        };
        let out = expand("r", "{@tail}_{digits}", &lookup).unwrap();
        assert_eq!(out, "v{side}-{region}_{digits}");
    }

    #[test]
    fn expand_allows_diamond_references() {
        let lookup = |name: &str| match name {
            "leaf" => Some("{x}".to_string()),
            "left" => Some("{@leaf}".to_string()),
            "right" => Some("{@leaf}".to_string()),
            _ => None,
        };
        let out = expand("r", "{@left}_{@right}", &lookup).unwrap();
        assert_eq!(out, "{x}_{x}");
    }

    #[test]
    fn expand_rejects_unknown_references() {
        let err = expand("r", "{@ghost}", &lookup_none).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn expand_rejects_self_reference() {
        let lookup = |name: &str| (name == "r").then(|| "{@r}".to_string());
        assert!(expand("r", "x_{@r}", &lookup).is_err());
    }

    #[test]
    fn expand_rejects_indirect_cycles() {
        let lookup = |name: &str| match name {
            "a" => Some("{@b}".to_string()),
            "b" => Some("{@a}".to_string()),
            _ => None,
        };
        let err = expand("r", "{@a}", &lookup).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn references_lists_direct_targets_only() {
        assert_eq!(references("{@a}_{b}_{@c}"), vec!["a", "c"]);
        assert!(references("{a}_{b}").is_empty());
    }
}
