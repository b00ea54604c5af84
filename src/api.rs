//! Session façade: registries plus the solve/parse/validate entry points.
//!
//! A [`Session`] owns a token registry, a rule registry and the active-rule
//! pointer. All state is explicit — nothing lives in globals — and every
//! mutation goes through `&mut self`, so a session is single-threaded by
//! construction and trivially resettable.
//!
//! The façade's real job is the *calling convention*: a rule may use the
//! same token several times, so a flat argument list has colliding names.
//! [`Session::solve`] walks the active rule's fields and resolves every
//! occurrence with this priority:
//!
//! 1. a keyword matching the occurrence key (`side2`),
//! 2. a keyword matching the bare name, broadcast to all occurrences
//!    (`side`),
//! 3. a positional argument, consumed left-to-right by required fields,
//! 4. the token's own default (optional tokens) or fallback (required
//!    tokens that declare one).
//!
//! Anything still unresolved for a required field is a solving error
//! naming the field.

use indexmap::IndexMap;

use crate::Value;
use crate::engine::{Anchor, Rule};
use crate::error::{NamingError, Result};
use crate::tokens::{Token, TokenKind, TokenNumber};

/// Arguments for [`Session::solve`] and expectations for
/// [`Session::validate`]: positional values plus named values, mirroring a
/// keyword-style call.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Args::default()
    }

    /// Append a positional value, consumed left-to-right by required
    /// fields that have no keyword.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named value. Use the bare field name to broadcast across
    /// repeated occurrences, or a 1-based key (`side2`) for one occurrence.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.named.insert(field.to_string(), value.into());
        self
    }

    pub(crate) fn named(&self) -> &IndexMap<String, Value> {
        &self.named
    }
}

/// An explicit naming session: token and rule registries plus the active
/// rule used by the solve/parse/validate entry points.
#[derive(Debug, Clone, Default)]
pub struct Session {
    tokens: IndexMap<String, TokenKind>,
    rules: IndexMap<String, Rule>,
    active: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    // --- Token registry ------------------------------------------------------

    /// Register a token with its option pairs. An empty `options` slice
    /// makes the token required. `default` may name an option by full name
    /// or abbreviation; without it the first option is the default.
    pub fn add_token(&mut self, name: &str, options: &[(&str, &str)], default: Option<&str>) -> Result<()> {
        let mut token = Token::new(name);
        for (fullname, abbreviation) in options {
            token.add_option(*fullname, *abbreviation);
        }
        if let Some(default) = default {
            token.set_default(default)?;
        }
        self.insert_token(TokenKind::Token(token));
        Ok(())
    }

    /// Register a numeric token. Affixes must not be pure digit strings.
    pub fn add_token_number(&mut self, name: &str, prefix: &str, suffix: &str, padding: usize) -> Result<()> {
        let token = TokenNumber::new(name, prefix, suffix, padding)?;
        self.insert_token(TokenKind::TokenNumber(token));
        Ok(())
    }

    pub(crate) fn insert_token(&mut self, token: TokenKind) {
        tracing::debug!(token = token.name(), "registering token");
        self.tokens.insert(token.name().to_string(), token);
    }

    pub fn has_token(&self, name: &str) -> bool {
        self.tokens.contains_key(name)
    }

    pub fn get_token(&self, name: &str) -> Option<&TokenKind> {
        self.tokens.get(name)
    }

    pub fn get_token_mut(&mut self, name: &str) -> Option<&mut TokenKind> {
        self.tokens.get_mut(name)
    }

    pub fn remove_token(&mut self, name: &str) -> bool {
        self.tokens.shift_remove(name).is_some()
    }

    pub fn reset_tokens(&mut self) {
        self.tokens.clear();
    }

    pub fn tokens(&self) -> &IndexMap<String, TokenKind> {
        &self.tokens
    }

    // --- Rule registry -------------------------------------------------------

    /// Register a rule, compiling it eagerly. `{@name}` references resolve
    /// against rules already in the session. The first rule added becomes
    /// active.
    pub fn add_rule(&mut self, name: &str, pattern: &str, anchor: Anchor) -> Result<()> {
        let rules = &self.rules;
        let rule = Rule::compile(name, pattern, anchor, &|reference: &str| {
            rules.get(reference).map(|r| r.pattern().to_string())
        })?;
        self.rules.insert(name.to_string(), rule);
        if self.active.is_none() {
            tracing::debug!(rule = name, "no active rule, setting this one as active");
            self.active = Some(name.to_string());
        }
        Ok(())
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.rules.shift_remove(name).is_some()
    }

    pub fn reset_rules(&mut self) {
        self.rules.clear();
        self.active = None;
    }

    pub fn rules(&self) -> &IndexMap<String, Rule> {
        &self.rules
    }

    /// Mark a rule as the target for the solve/parse/validate entry
    /// points. Returns false when no rule has that name.
    pub fn set_active_rule(&mut self, name: &str) -> bool {
        if !self.has_rule(name) {
            return false;
        }
        self.active = Some(name.to_string());
        true
    }

    /// The active rule, if the pointer still names a registered rule.
    pub fn active_rule(&self) -> Option<&Rule> {
        self.active.as_ref().and_then(|name| self.rules.get(name))
    }

    // --- Solve / parse / validate --------------------------------------------

    /// Build a name from the active rule and the given arguments.
    pub fn solve(&self, args: &Args) -> Result<String> {
        let rule = self.active_rule().ok_or_else(|| NamingError::Solving {
            rule: "<none>".to_string(),
            reason: "no active rule in session".to_string(),
        })?;
        let fields = rule.fields();
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for field in &fields {
            *counts.entry(field.as_str()).or_insert(0) += 1;
        }
        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        let mut positional = args.positional.iter();
        let mut values: IndexMap<String, String> = IndexMap::new();
        for field in &fields {
            let occurrence = {
                let slot = seen.entry(field.as_str()).or_insert(0);
                *slot += 1;
                *slot
            };
            let repeated = counts.get(field.as_str()).copied().unwrap_or(1) > 1;
            let key = if repeated { format!("{field}{occurrence}") } else { field.clone() };
            let token = self.tokens.get(field.as_str()).ok_or_else(|| NamingError::Solving {
                rule: rule.name().to_string(),
                reason: format!("field '{field}' does not name a registered token"),
            })?;
            let supplied = args.named.get(&key).or_else(|| args.named.get(field.as_str()));
            let solved = match token {
                TokenKind::Token(t) => solve_word(rule, t, &key, supplied, &mut positional)?,
                TokenKind::TokenNumber(t) => solve_number(rule, t, &key, supplied, &mut positional)?,
            };
            values.insert(key, solved);
        }
        tracing::debug!(rule = rule.name(), ?values, "solving rule");
        rule.solve(&values)
    }

    /// Decode a name with the active rule. `Ok(None)` means the rule's
    /// pattern has no separators and cannot be parsed; an empty mapping
    /// means the name did not match the pattern.
    pub fn parse(&self, name: &str) -> Result<Option<IndexMap<String, Value>>> {
        let rule = self.active_rule().ok_or_else(|| NamingError::Parsing {
            name: name.to_string(),
            reason: "no active rule in session".to_string(),
        })?;
        rule.parse(name, &self.tokens)
    }

    /// Check a name against the active rule; `expected` named values are
    /// cross-checked against the decoded fields.
    pub fn validate(&self, name: &str, expected: &Args, strict: bool) -> Result<bool> {
        let rule = self.active_rule().ok_or_else(|| NamingError::Parsing {
            name: name.to_string(),
            reason: "no active rule in session".to_string(),
        })?;
        Ok(rule.validate(name, expected.named(), strict, &self.tokens))
    }
}

fn solve_word<'a>(
    rule: &Rule,
    token: &Token,
    key: &str,
    supplied: Option<&Value>,
    positional: &mut impl Iterator<Item = &'a Value>,
) -> Result<String> {
    if let Some(value) = supplied {
        return token.solve(Some(&value.to_string()));
    }
    if !token.required() {
        return token.solve(None);
    }
    if let Some(value) = positional.next() {
        return token.solve(Some(&value.to_string()));
    }
    if let Some(fallback) = token.fallback() {
        return token.solve(Some(fallback));
    }
    Err(NamingError::Solving {
        rule: rule.name().to_string(),
        reason: format!("missing value for required field '{key}'"),
    })
}

fn solve_number<'a>(
    rule: &Rule,
    token: &TokenNumber,
    key: &str,
    supplied: Option<&Value>,
    positional: &mut impl Iterator<Item = &'a Value>,
) -> Result<String> {
    let value = supplied.or_else(|| positional.next());
    match value {
        Some(Value::Number(n)) => Ok(token.solve(*n)),
        Some(Value::Text(text)) => match text.parse::<u64>() {
            Ok(n) => Ok(token.solve(n)),
            Err(_) => Err(NamingError::Token {
                token: token.name().to_string(),
                reason: format!("expects a numeric value, got '{text}'"),
            }),
        },
        None => Err(NamingError::Solving {
            rule: rule.name().to_string(),
            reason: format!("missing value for required field '{key}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lights_session() -> Session {
        let mut session = Session::new();
        session.add_token("whatAffects", &[], None).unwrap();
        session.add_token_number("digits", "", "", 3).unwrap();
        session
            .add_token(
                "category",
                &[
                    ("natural", "natural"),
                    ("practical", "practical"),
                    ("dramatic", "dramatic"),
                    ("volumetric", "volumetric"),
                ],
                Some("natural"),
            )
            .unwrap();
        session
            .add_token(
                "function",
                &[
                    ("key", "key"),
                    ("fill", "fill"),
                    ("ambient", "ambient"),
                    ("bounce", "bounce"),
                    ("rim", "rim"),
                    ("kick", "kick"),
                    ("custom", "custom"),
                ],
                Some("custom"),
            )
            .unwrap();
        session.add_token("type", &[("lighting", "LGT"), ("animation", "ANI")], Some("lighting")).unwrap();
        session
            .add_rule("lights", "{category}_{function}_{whatAffects}_{digits}_{type}", Anchor::BOTH)
            .unwrap();
        session
    }

    #[test]
    fn first_rule_becomes_active() {
        let session = lights_session();
        assert_eq!(session.active_rule().map(|r| r.name()), Some("lights"));
    }

    #[test]
    fn registry_lookups_never_fail() {
        let mut session = lights_session();
        assert!(session.has_token("category"));
        assert!(!session.has_token("missing"));
        assert!(session.get_token("missing").is_none());
        assert!(!session.remove_token("missing"));
        assert!(session.remove_token("category"));
        assert!(!session.has_rule("missing"));
        assert!(!session.set_active_rule("missing"));
    }

    #[test]
    fn removing_the_active_rule_clears_the_pointer_view() {
        let mut session = lights_session();
        assert!(session.remove_rule("lights"));
        assert!(session.active_rule().is_none());
        assert!(session.solve(&Args::new()).is_err());
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = lights_session();
        session.reset_tokens();
        session.reset_rules();
        assert!(session.tokens().is_empty());
        assert!(session.rules().is_empty());
        assert!(session.active_rule().is_none());
    }

    #[test]
    fn solve_with_explicit_keywords() {
        let session = lights_session();
        let name = session
            .solve(
                &Args::new()
                    .with("category", "natural")
                    .with("function", "ambient")
                    .with("whatAffects", "chars")
                    .with("digits", 1u32)
                    .with("type", "lighting"),
            )
            .unwrap();
        assert_eq!(name, "natural_ambient_chars_001_LGT");
    }

    #[test]
    fn solve_fills_defaults() {
        let session = lights_session();
        let name = session.solve(&Args::new().with("whatAffects", "chars").with("digits", 1u32)).unwrap();
        assert_eq!(name, "natural_custom_chars_001_LGT");
    }

    #[test]
    fn solve_consumes_positionals_for_required_fields() {
        let session = lights_session();
        let name = session.solve(&Args::new().arg("chars").arg(1u32).with("type", "animation")).unwrap();
        assert_eq!(name, "natural_custom_chars_001_ANI");

        let name = session.solve(&Args::new().arg("chars").arg(1u32)).unwrap();
        assert_eq!(name, "natural_custom_chars_001_LGT");
    }

    #[test]
    fn solve_accepts_digit_strings_for_numbers() {
        let session = lights_session();
        let name = session.solve(&Args::new().with("whatAffects", "chars").with("digits", "24")).unwrap();
        assert_eq!(name, "natural_custom_chars_024_LGT");
    }

    #[test]
    fn solve_reports_missing_required_fields() {
        let session = lights_session();
        let err = session.solve(&Args::new().with("digits", 1u32)).unwrap_err();
        assert!(err.to_string().contains("whatAffects"));
    }

    #[test]
    fn solve_rejects_values_outside_the_option_table() {
        let session = lights_session();
        let err = session
            .solve(&Args::new().with("function", "sarasa").with("whatAffects", "chars").with("digits", 1u32))
            .unwrap_err();
        assert!(matches!(err, NamingError::Token { .. }));
    }

    #[test]
    fn solve_uses_fallbacks_for_omitted_required_fields() {
        let mut session = lights_session();
        match session.get_token_mut("whatAffects") {
            Some(TokenKind::Token(token)) => token.set_fallback("nothing"),
            _ => unreachable!("whatAffects is a word token"),
        }
        let name = session.solve(&Args::new().with("digits", 1u32)).unwrap();
        assert_eq!(name, "natural_custom_nothing_001_LGT");
    }

    #[test]
    fn solve_fails_on_unregistered_pattern_fields() {
        let mut session = lights_session();
        session.add_rule("ghost", "{ghost}_{digits}", Anchor::BOTH).unwrap();
        session.set_active_rule("ghost");
        let err = session.solve(&Args::new().with("digits", 1u32)).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn parse_round_trips_a_solved_name() {
        let session = lights_session();
        let parsed = session.parse("dramatic_bounce_chars_001_LGT").unwrap().unwrap();
        assert_eq!(parsed["category"], Value::Text("dramatic".into()));
        assert_eq!(parsed["function"], Value::Text("bounce".into()));
        assert_eq!(parsed["whatAffects"], Value::Text("chars".into()));
        assert_eq!(parsed["digits"], Value::Number(1));
        assert_eq!(parsed["type"], Value::Text("lighting".into()));
    }
}
