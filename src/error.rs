//! Error taxonomy.
//!
//! Registry lookups (`has_*`, `get_*`) never error — absence is a normal
//! `bool`/`Option` result. The typed errors below are reserved for malformed
//! input to solve/parse/validate, invalid definitions, and repository I/O.
//! They carry the offending field and, where useful, the valid options, and
//! propagate to the caller uncaught.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NamingError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NamingError {
    /// A value does not match any configured option for a token, or a
    /// required token was not supplied.
    #[error("token '{token}': {reason}")]
    Token { token: String, reason: String },

    /// The supplied values are insufficient or mismatched against the
    /// active rule's fields.
    #[error("cannot solve rule '{rule}': {reason}")]
    Solving { rule: String, reason: String },

    /// A name's separator/segment structure is structurally incompatible
    /// with the rule's expected shape.
    #[error("cannot parse '{name}': {reason}")]
    Parsing { name: String, reason: String },

    /// A rule definition is invalid: empty name or pattern, a bad
    /// placeholder identifier, an unresolved or circular `{@reference}`,
    /// or a pattern that compiles to an invalid expression.
    #[error("invalid rule '{rule}': {reason}")]
    Rule { rule: String, reason: String },

    /// A session repository could not be read or written.
    #[error("repository '{}': {reason}", path.display())]
    Repo { path: PathBuf, reason: String },
}
