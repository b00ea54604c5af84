//! Tokens: the per-field building blocks of a naming rule.
//!
//! A [`Token`] is a named field backed by a full-name → abbreviation table,
//! so names stay short while their meaning stays recoverable. A token with
//! an empty table is *required*: values pass through verbatim and must be
//! supplied explicitly. A [`TokenNumber`] is the numeric specialization:
//! zero-padded digits with optional prefix/suffix affixes (`v0025`).
//!
//! [`TokenKind`] is the closed sum over both. Its serialized form is
//! internally tagged with a `classname` discriminator, which is also the
//! on-disk dispatch used by the repository loader (see `repo.rs`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Value;
use crate::error::{NamingError, Result};

/// A named field with a full-name → abbreviation option table.
///
/// With options, one entry is the default: set explicitly, inherited from
/// the first inserted option, or — when neither holds — the
/// lexicographically smallest key, so serialized sessions stay
/// reproducible. Without options the token is required and [`Token::solve`]
/// demands an explicit value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    name: String,
    options: BTreeMap<String, String>,
    default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback: Option<String>,
}

impl Token {
    pub fn new(name: impl Into<String>) -> Self {
        Token { name: name.into(), options: BTreeMap::new(), default: None, fallback: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A token with no options is required: it has no default and must
    /// always receive an explicit value at solve time.
    pub fn required(&self) -> bool {
        self.options.is_empty()
    }

    /// Insert an option pair. The first inserted option becomes the
    /// default. Returns false without mutating when `fullname` is already
    /// present (use [`Token::update_option`] for that).
    pub fn add_option(&mut self, fullname: impl Into<String>, abbreviation: impl Into<String>) -> bool {
        let fullname = fullname.into();
        if self.options.contains_key(&fullname) {
            tracing::debug!(token = %self.name, option = %fullname, "option already exists, use update_option");
            return false;
        }
        if self.options.is_empty() {
            self.default = Some(fullname.clone());
        }
        self.options.insert(fullname, abbreviation.into());
        true
    }

    /// Overwrite the abbreviation of an existing option. Returns false
    /// when `fullname` is absent.
    pub fn update_option(&mut self, fullname: &str, abbreviation: impl Into<String>) -> bool {
        match self.options.get_mut(fullname) {
            Some(slot) => {
                *slot = abbreviation.into();
                true
            }
            None => {
                tracing::debug!(token = %self.name, option = %fullname, "option does not exist, use add_option");
                false
            }
        }
    }

    /// Delete an option. The stored default is not reassigned when the
    /// default entry is removed; the getter falls back to the smallest
    /// remaining key instead.
    pub fn remove_option(&mut self, fullname: &str) -> bool {
        self.options.remove(fullname).is_some()
    }

    pub fn has_option_fullname(&self, fullname: &str) -> bool {
        self.options.contains_key(fullname)
    }

    pub fn has_option_abbreviation(&self, abbreviation: &str) -> bool {
        self.options.values().any(|v| v == abbreviation)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// The default option key. A stored default that no longer names an
    /// option is treated as unset, falling back to the lexicographically
    /// smallest key when options exist.
    pub fn default(&self) -> Option<&str> {
        match &self.default {
            Some(d) if self.options.contains_key(d) => Some(d),
            _ => self.options.keys().next().map(|k| k.as_str()),
        }
    }

    /// Set the default. Accepts either a full name or an abbreviation; an
    /// abbreviation resolves to its key. Anything else is a token error.
    pub fn set_default(&mut self, value: &str) -> Result<()> {
        if self.options.contains_key(value) {
            self.default = Some(value.to_string());
            return Ok(());
        }
        if let Some(key) = self.options.iter().find(|(_, v)| *v == value).map(|(k, _)| k.clone()) {
            self.default = Some(key);
            return Ok(());
        }
        Err(NamingError::Token {
            token: self.name.clone(),
            reason: format!("default '{value}' must match one of the options: {}", self.option_keys()),
        })
    }

    /// A fallback is consulted when the token is required by rule position
    /// but the caller supplied nothing — an explicit escape hatch so
    /// omitted values don't always hard-fail.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn set_fallback(&mut self, value: impl Into<String>) {
        self.fallback = Some(value.into());
    }

    /// Render this token's contribution to a name. A required token echoes
    /// the value verbatim; an optional token maps a full name to its
    /// abbreviation, or its default abbreviation when no value is given.
    pub fn solve(&self, value: Option<&str>) -> Result<String> {
        if self.required() {
            return match value {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(NamingError::Token {
                    token: self.name.clone(),
                    reason: "token is required, a value must be passed".to_string(),
                }),
            };
        }
        match value {
            Some(v) => self.options.get(v).cloned().ok_or_else(|| NamingError::Token {
                token: self.name.clone(),
                reason: format!("'{v}' is not an option; options: {}", self.option_keys()),
            }),
            None => match self.default().and_then(|k| self.options.get(k)) {
                Some(abbreviation) => Ok(abbreviation.clone()),
                None => Err(NamingError::Token {
                    token: self.name.clone(),
                    reason: "no default option is configured".to_string(),
                }),
            },
        }
    }

    /// Recover the full name behind a captured name part. Required tokens
    /// round-trip verbatim; optional tokens reverse-look-up the
    /// abbreviation.
    pub fn parse(&self, value: &str) -> Result<String> {
        if self.required() {
            return Ok(value.to_string());
        }
        for (fullname, abbreviation) in &self.options {
            if abbreviation == value {
                return Ok(fullname.clone());
            }
        }
        Err(NamingError::Token {
            token: self.name.clone(),
            reason: format!(
                "'{value}' does not match any abbreviation; abbreviations: {}",
                self.options.values().cloned().collect::<Vec<_>>().join(", ")
            ),
        })
    }

    fn option_keys(&self) -> String {
        self.options.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// A numeric field: zero-padded digits between optional literal affixes.
///
/// Always required — solving needs a number. Affixes must not be pure
/// digit strings, which would make the digit run ambiguous; setters reject
/// that instead of silently ignoring it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenNumber {
    name: String,
    prefix: String,
    suffix: String,
    padding: usize,
}

impl TokenNumber {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        padding: usize,
    ) -> Result<Self> {
        let name = name.into();
        let prefix = prefix.into();
        let suffix = suffix.into();
        check_affix(&name, "prefix", &prefix)?;
        check_affix(&name, "suffix", &suffix)?;
        Ok(TokenNumber { name, prefix, suffix, padding: padding.max(1) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        check_affix(&self.name, "prefix", &prefix)?;
        self.prefix = prefix;
        Ok(())
    }

    pub fn set_suffix(&mut self, suffix: impl Into<String>) -> Result<()> {
        let suffix = suffix.into();
        check_affix(&self.name, "suffix", &suffix)?;
        self.suffix = suffix;
        Ok(())
    }

    /// Zero-padded width, clamped to at least 1.
    pub fn set_padding(&mut self, padding: usize) {
        self.padding = padding.max(1);
    }

    /// Render `prefix + zero_pad(number, padding) + suffix`.
    pub fn solve(&self, number: u64) -> String {
        format!("{}{:0width$}{}", self.prefix, number, self.suffix, width = self.padding)
    }

    /// Invert [`TokenNumber::solve`] with a digit-boundary scan: the run of
    /// non-digit characters at the front is taken as the prefix, the run at
    /// the back as the suffix, and the slice between them as the numeral.
    ///
    /// This is a best-effort inverse of string concatenation. When the
    /// stripped affixes differ from the configured ones the scan warns and
    /// proceeds, since the digit run itself is still unambiguous.
    pub fn parse(&self, value: &str) -> Result<u64> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            return self.to_number(value);
        }
        let Some(start) = value.char_indices().find(|(_, c)| c.is_ascii_digit()).map(|(i, _)| i) else {
            return Err(NamingError::Token {
                token: self.name.clone(),
                reason: format!("no digits found in '{value}'"),
            });
        };
        let end = value
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(value.len());
        let (head, rest) = value.split_at(start);
        let (core, tail) = rest.split_at(end - start);
        if head != self.prefix || tail != self.suffix {
            tracing::warn!(
                token = %self.name,
                value,
                "stripped affixes '{head}'/'{tail}' differ from configured '{}'/'{}', digit-boundary scan is approximate",
                self.prefix,
                self.suffix,
            );
        }
        self.to_number(core)
    }

    fn to_number(&self, digits: &str) -> Result<u64> {
        digits.parse::<u64>().map_err(|_| NamingError::Token {
            token: self.name.clone(),
            reason: format!("digit run '{digits}' is not a valid number"),
        })
    }
}

fn check_affix(token: &str, kind: &str, value: &str) -> Result<()> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NamingError::Token {
            token: token.to_string(),
            reason: format!("{kind} '{value}' must not be a pure digit string"),
        });
    }
    Ok(())
}

/// Closed set of token types a registry can hold. Serialized internally
/// tagged, so the blob carries the `classname` discriminator the loader
/// validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classname")]
pub enum TokenKind {
    Token(Token),
    TokenNumber(TokenNumber),
}

impl TokenKind {
    pub fn name(&self) -> &str {
        match self {
            TokenKind::Token(t) => t.name(),
            TokenKind::TokenNumber(t) => t.name(),
        }
    }

    pub fn required(&self) -> bool {
        match self {
            TokenKind::Token(t) => t.required(),
            TokenKind::TokenNumber(_) => true,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            TokenKind::Token(t) => Some(t),
            TokenKind::TokenNumber(_) => None,
        }
    }

    pub fn as_token_number(&self) -> Option<&TokenNumber> {
        match self {
            TokenKind::TokenNumber(t) => Some(t),
            TokenKind::Token(_) => None,
        }
    }

    /// Decode one captured name part into its reported value.
    pub(crate) fn parse_value(&self, raw: &str) -> Result<Value> {
        match self {
            TokenKind::Token(t) => t.parse(raw).map(Value::Text),
            TokenKind::TokenNumber(t) => t.parse(raw).map(Value::Number),
        }
    }
}
