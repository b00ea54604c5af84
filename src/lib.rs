//! nomen — a naming-convention engine.
//!
//! Production pipelines want names that are short for humans and decodable
//! by machines. This crate takes a declarative pattern built from named
//! placeholders (*tokens*), renders concrete strings from supplied values
//! (*solve*), and recovers structured metadata from existing strings
//! (*parse* / *validate*):
//!
//! ```
//! use nomen::{Anchor, Args, Session};
//!
//! let mut session = Session::new();
//! session
//!     .add_token("side", &[("center", "C"), ("left", "L"), ("right", "R")], Some("center"))
//!     .unwrap();
//! session.add_token("region", &[("frontal", "FRONT"), ("orbital", "ORBI")], Some("frontal")).unwrap();
//! session.add_rule("areas", "{side}-{region}", Anchor::BOTH).unwrap();
//!
//! let name = session.solve(&Args::new().with("side", "left").with("region", "orbital")).unwrap();
//! assert_eq!(name, "L-ORBI");
//!
//! let decoded = session.parse("R-FRONT").unwrap().unwrap();
//! assert_eq!(decoded["side"].to_string(), "right");
//! assert_eq!(decoded["region"].to_string(), "frontal");
//! ```
//!
//! Patterns may repeat a placeholder (`{side}-{region}_{side}-{region}`),
//! embed hardcoded text, and reference other rules with `{@name}`. A
//! [`Session`] owns the token and rule registries plus the active-rule
//! pointer; [`save_session`]/[`load_session`] persist it as a directory of
//! small versioned JSON files.

use std::fmt;

#[macro_use]
mod macros;

mod api;
mod engine;
mod error;
mod repo;
mod tokens;

pub use api::{Args, Session};
pub use engine::{Anchor, Rule};
pub use error::{NamingError, Result};
pub use repo::{
    NAMING_REPO_ENV, load_rule, load_session, load_token, repo_path, save_rule, save_session, save_token,
};
pub use tokens::{Token, TokenKind, TokenNumber};

// --- Shared value type -------------------------------------------------------

/// A field value crossing the API boundary: plain text for word tokens, a
/// non-negative integer for numeric tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Text(String),
    Number(u64),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value.into())
    }
}
