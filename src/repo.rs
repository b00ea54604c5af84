//! Session persistence.
//!
//! A session serializes to a directory of small versioned JSON blobs: one
//! `<name>.token` per token, one `<name>.rule` per rule, plus a
//! `naming.conf` marker recording the active rule. A directory without the
//! marker is not a session repository and loading fails fast.
//!
//! Every blob carries two bookkeeping keys next to the object's own
//! fields: a `classname` discriminator and a `version` string. Token files
//! dispatch on the discriminator through the tagged [`TokenKind`] sum;
//! rule files are validated against the single `Rule` classname.
//!
//! Rules are reloaded with a fixpoint pass: a rule whose `{@references}`
//! point at files not yet loaded is deferred until its targets exist, so
//! directory order never matters. A pass that defers everything means the
//! remaining rules are circular or dangling, which is reported instead of
//! retrying forever.

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::Session;
use crate::engine::{Anchor, Rule, references};
use crate::error::{NamingError, Result};
use crate::tokens::TokenKind;

/// Environment variable overriding the default repository location.
pub const NAMING_REPO_ENV: &str = "NAMING_REPO";

const SESSION_CONF: &str = "naming.conf";
const BLOB_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct RuleFile {
    classname: String,
    version: String,
    name: String,
    pattern: String,
    anchor: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionConf {
    set_active_rule: Option<String>,
}

/// A rule definition read back from disk, not yet compiled.
#[derive(Debug)]
struct RuleDef {
    name: String,
    pattern: String,
    anchor: Anchor,
}

/// Repository location: the `NAMING_REPO` environment variable when set,
/// otherwise `~/.nomen/naming_repo`.
pub fn repo_path() -> PathBuf {
    match env::var(NAMING_REPO_ENV) {
        Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".nomen").join("naming_repo"),
    }
}

/// Serialize one token into `<name>.token` under `directory`.
pub fn save_token(token: &TokenKind, directory: &Path) -> Result<PathBuf> {
    let path = directory.join(format!("{}.token", token.name()));
    let mut blob = serde_json::to_value(token).map_err(|err| repo_error(&path, err))?;
    if let Some(map) = blob.as_object_mut() {
        map.insert("version".to_string(), BLOB_VERSION.into());
    }
    write_blob(&path, &blob)?;
    Ok(path)
}

/// Read one token file back, dispatching on its `classname`.
pub fn load_token(path: &Path) -> Result<TokenKind> {
    let blob = read_blob(path)?;
    let classname = blob.get("classname").and_then(|v| v.as_str()).unwrap_or_default();
    if classname != "Token" && classname != "TokenNumber" {
        return Err(repo_error(path, format!("unexpected classname '{classname}' for a token file")));
    }
    serde_json::from_value(blob).map_err(|err| repo_error(path, err))
}

/// Serialize one rule into `<name>.rule` under `directory`. The raw
/// pattern is stored, references unexpanded.
pub fn save_rule(rule: &Rule, directory: &Path) -> Result<PathBuf> {
    let path = directory.join(format!("{}.rule", rule.name()));
    let file = RuleFile {
        classname: "Rule".to_string(),
        version: BLOB_VERSION.to_string(),
        name: rule.name().to_string(),
        pattern: rule.pattern().to_string(),
        anchor: rule.anchor().as_str().to_string(),
    };
    let blob = serde_json::to_value(&file).map_err(|err| repo_error(&path, err))?;
    write_blob(&path, &blob)?;
    Ok(path)
}

/// Read one rule file and register it with `session`, compiling it
/// against the rules already present there.
pub fn load_rule(path: &Path, session: &mut Session) -> Result<()> {
    let def = read_rule_def(path)?;
    session.add_rule(&def.name, &def.pattern, def.anchor)
}

/// Write every token, every rule and the active-rule marker of `session`
/// into `directory`, creating it when missing.
pub fn save_session(session: &Session, directory: &Path) -> Result<()> {
    fs::create_dir_all(directory).map_err(|err| repo_error(directory, err))?;
    for token in session.tokens().values() {
        tracing::debug!(token = token.name(), "saving token");
        save_token(token, directory)?;
    }
    for rule in session.rules().values() {
        tracing::debug!(rule = rule.name(), "saving rule");
        save_rule(rule, directory)?;
    }
    let conf = SessionConf { set_active_rule: session.active_rule().map(|r| r.name().to_string()) };
    let path = directory.join(SESSION_CONF);
    let blob = serde_json::to_value(&conf).map_err(|err| repo_error(&path, err))?;
    write_blob(&path, &blob)
}

/// Rebuild a session from a repository directory.
///
/// Fails fast when the directory or its `naming.conf` marker is missing.
/// Tokens load first, then rules in dependency order.
pub fn load_session(directory: &Path) -> Result<Session> {
    if !directory.is_dir() {
        return Err(repo_error(directory, "directory does not exist"));
    }
    let conf_path = directory.join(SESSION_CONF);
    if !conf_path.is_file() {
        return Err(repo_error(directory, "not a session repository (naming.conf is missing)"));
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(directory)
        .map_err(|err| repo_error(directory, err))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut session = Session::new();
    let mut pending: Vec<RuleDef> = Vec::new();
    for path in &entries {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("token") => {
                tracing::debug!(path = %path.display(), "loading token");
                let token = load_token(path)?;
                session.insert_token(token);
            }
            Some("rule") => {
                tracing::debug!(path = %path.display(), "loading rule");
                pending.push(read_rule_def(path)?);
            }
            _ => {}
        }
    }
    resolve_pending(directory, &mut session, pending)?;

    let conf: SessionConf =
        serde_json::from_value(read_blob(&conf_path)?).map_err(|err| repo_error(&conf_path, err))?;
    if let Some(active) = conf.set_active_rule {
        if !session.set_active_rule(&active) {
            tracing::warn!(rule = %active, "configured active rule is not part of the loaded session");
        }
    }
    Ok(session)
}

/// Register pending rule definitions, deferring any whose direct
/// references still point at other pending rules.
fn resolve_pending(directory: &Path, session: &mut Session, mut pending: Vec<RuleDef>) -> Result<()> {
    while !pending.is_empty() {
        let names: Vec<String> = pending.iter().map(|def| def.name.clone()).collect();
        let (ready, deferred): (Vec<RuleDef>, Vec<RuleDef>) = pending
            .into_iter()
            .partition(|def| references(&def.pattern).iter().all(|reference| !names.contains(reference)));
        if ready.is_empty() {
            return Err(repo_error(
                directory,
                format!("unresolved or circular rule references among: {}", names.join(", ")),
            ));
        }
        for def in ready {
            session.add_rule(&def.name, &def.pattern, def.anchor)?;
        }
        pending = deferred;
    }
    Ok(())
}

fn read_rule_def(path: &Path) -> Result<RuleDef> {
    let file: RuleFile = serde_json::from_value(read_blob(path)?).map_err(|err| repo_error(path, err))?;
    if file.classname != "Rule" {
        return Err(repo_error(path, format!("unexpected classname '{}' for a rule file", file.classname)));
    }
    let anchor = Anchor::parse_name(&file.anchor)
        .ok_or_else(|| repo_error(path, format!("unknown anchor '{}'", file.anchor)))?;
    Ok(RuleDef { name: file.name, pattern: file.pattern, anchor })
}

fn read_blob(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path).map_err(|err| repo_error(path, err))?;
    serde_json::from_str(&text).map_err(|err| repo_error(path, err))
}

fn write_blob(path: &Path, blob: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(blob).map_err(|err| repo_error(path, err))?;
    fs::write(path, text).map_err(|err| repo_error(path, err))
}

fn repo_error(path: &Path, reason: impl Display) -> NamingError {
    NamingError::Repo { path: path.to_path_buf(), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Args, Value};

    fn sample_session() -> Session {
        let mut session = Session::new();
        session
            .add_token("side", &[("center", "C"), ("left", "L"), ("right", "R")], Some("center"))
            .unwrap();
        session
            .add_token("region", &[("frontal", "FRONT"), ("orbital", "ORBI")], Some("frontal"))
            .unwrap();
        session.add_token_number("digits", "v", "", 3).unwrap();
        session.add_rule("z_base", "{side}-{region}", Anchor::START).unwrap();
        session.add_rule("a_stack", "{@z_base}_{digits}", Anchor::BOTH).unwrap();
        session.set_active_rule("a_stack");
        session
    }

    #[test]
    fn session_round_trips_through_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        save_session(&session, dir.path()).unwrap();

        let loaded = load_session(dir.path()).unwrap();
        assert_eq!(loaded.active_rule().map(|r| r.name()), Some("a_stack"));
        assert!(loaded.has_token("side"));
        assert!(loaded.has_rule("z_base"));

        let name =
            loaded.solve(&Args::new().with("side", "left").with("region", "orbital").with("digits", 7u32)).unwrap();
        assert_eq!(name, "L-ORBI_v007");
        let parsed = loaded.parse("R-FRONT_v012").unwrap().unwrap();
        assert_eq!(parsed["side"], Value::Text("right".into()));
        assert_eq!(parsed["digits"], Value::Number(12));
    }

    #[test]
    fn referencing_rules_load_regardless_of_file_order() {
        // "a_stack" sorts before "z_base", so the loader must defer it
        // until its reference target exists.
        let dir = tempfile::tempdir().unwrap();
        save_session(&sample_session(), dir.path()).unwrap();
        let loaded = load_session(dir.path()).unwrap();
        assert_eq!(loaded.get_rule("a_stack").map(|r| r.expanded_pattern()), Some("{side}-{region}_{digits}"));
    }

    #[test]
    fn blobs_carry_classname_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        save_session(&session, dir.path()).unwrap();

        let token_blob = read_blob(&dir.path().join("digits.token")).unwrap();
        assert_eq!(token_blob["classname"], "TokenNumber");
        assert_eq!(token_blob["version"], "1.0");
        let rule_blob = read_blob(&dir.path().join("a_stack.rule")).unwrap();
        assert_eq!(rule_blob["classname"], "Rule");
        assert_eq!(rule_blob["pattern"], "{@z_base}_{digits}");
        assert_eq!(rule_blob["anchor"], "both");
    }

    #[test]
    fn token_loading_rejects_foreign_classnames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weird.token");
        fs::write(&path, r#"{"classname": "Rule", "version": "1.0", "name": "weird"}"#).unwrap();
        assert!(load_token(&path).is_err());
    }

    #[test]
    fn rule_loading_rejects_foreign_classnames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weird.rule");
        fs::write(
            &path,
            r#"{"classname": "Token", "version": "1.0", "name": "weird", "pattern": "{x}", "anchor": "start"}"#,
        )
        .unwrap();
        let mut session = Session::new();
        assert!(load_rule(&path, &mut session).is_err());
    }

    #[test]
    fn loading_requires_the_conf_marker() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(dir.path()).unwrap_err();
        assert!(err.to_string().contains("naming.conf"));
    }

    #[test]
    fn loading_a_missing_directory_fails_fast() {
        assert!(load_session(Path::new("/definitely/not/a/repo")).is_err());
    }

    #[test]
    fn circular_references_on_disk_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SESSION_CONF), r#"{"set_active_rule": null}"#).unwrap();
        fs::write(
            dir.path().join("a.rule"),
            r#"{"classname": "Rule", "version": "1.0", "name": "a", "pattern": "{@b}_{x}", "anchor": "both"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.rule"),
            r#"{"classname": "Rule", "version": "1.0", "name": "b", "pattern": "{@a}_{y}", "anchor": "both"}"#,
        )
        .unwrap();
        let err = load_session(dir.path()).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }
}
