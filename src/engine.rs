//! Pattern compilation and matching engine.
//!
//! This is the core of the crate: everything between a registered template
//! string and the solve/parse/validate operations exposed on a [`Rule`].
//!
//! ## How the parts work together
//!
//! ```text
//! "{side}-{region}_{@tail}"          raw pattern
//!          │
//!          │  template::expand        splice {@rule} references
//!          │  template::segments      literals | placeholders
//!          ▼
//!   Rule::compile (rule.rs)
//!     - occurrence::attach            side → side000, side001, …
//!     - build_matcher                 escaped literals + named groups
//!          │
//!          ▼
//!   Rule::solve      values → name    (1-based keys for repeats)
//!   Rule::parse      name → values    (suffixes stripped, tokens decode)
//!   Rule::validate   name → bool      (options, numeric format, strict)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `template.rs`: textual scanning — placeholder grammar, literal
//!   segmentation, recursive reference expansion with a cycle guard.
//! - `occurrence.rs`: the synthetic suffix that keeps capture-group names
//!   unique for repeated placeholders, and the clean 1-based result keys.
//! - `rule.rs`: [`Rule`] and [`Anchor`] — eager compilation and the three
//!   matching operations.
//!
//! Registries and the argument-resolution façade live one level up in
//! `api.rs`; persistence in `repo.rs`.

#[path = "engine/occurrence.rs"]
mod occurrence;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/template.rs"]
mod template;


pub use rule::{Anchor, Rule};

pub(crate) use template::references;
