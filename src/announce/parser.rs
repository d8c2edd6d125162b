//! Announce line parsing.
//!
//! Turns an indexer-specific announce line into a structured release
//! using the definition's regex rules, variable bindings, mappings, and
//! URL template. Stateless for single-line formats; multi-line formats
//! accumulate bindings in a bounded buffer keyed by the join key.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use crate::db::Release;
use crate::indexer::{DefinitionError, IndexerDefinition, ParseKind};

use super::multi::MultiLineBuffer;
use super::template;

/// Result of handing one line to the parser.
#[derive(Debug)]
pub enum ParseOutcome {
    /// The line (or line sequence) produced a complete release.
    Parsed(Release),
    /// The line belongs to a multi-line announce that is still incomplete.
    Buffered,
    /// The line is not this indexer's announce format. Not an error:
    /// other indexers on the same channel get their turn.
    NotApplicable,
    /// The line matched but the release is unusable (empty URL, missing name).
    Invalid(String),
}

/// A parser bound to one indexer definition and its user settings.
pub struct AnnounceParser {
    def: Arc<IndexerDefinition>,
    settings: HashMap<String, String>,
    patterns: Vec<Regex>,
    multi: Mutex<MultiLineBuffer>,
}

impl AnnounceParser {
    /// Compile a parser for a definition.
    ///
    /// `settings` are the user-supplied values (passkey, authkey, ...)
    /// merged into the variable dictionary; captured vars win collisions.
    pub fn new(
        def: Arc<IndexerDefinition>,
        settings: HashMap<String, String>,
    ) -> Result<Self, DefinitionError> {
        let patterns = def
            .parse
            .lines
            .iter()
            .map(|line| {
                Regex::new(&line.pattern).map_err(|source| DefinitionError::Pattern {
                    identifier: def.identifier.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            def,
            settings,
            patterns,
            multi: Mutex::new(MultiLineBuffer::default()),
        })
    }

    /// The definition this parser is bound to.
    pub fn definition(&self) -> &Arc<IndexerDefinition> {
        &self.def
    }

    /// Parse one announce line.
    pub fn parse(&self, line: &str) -> ParseOutcome {
        match self.def.parse.kind {
            ParseKind::Single => self.parse_single(line),
            ParseKind::Multi => self.parse_multi(line),
        }
    }

    fn parse_single(&self, line: &str) -> ParseOutcome {
        for idx in 0..self.patterns.len() {
            if let Some(vars) = self.capture(idx, line) {
                return self.finalize(vars);
            }
        }
        ParseOutcome::NotApplicable
    }

    fn parse_multi(&self, line: &str) -> ParseOutcome {
        let Some((idx, vars)) = (0..self.patterns.len())
            .find_map(|idx| self.capture(idx, line).map(|vars| (idx, vars)))
        else {
            return ParseOutcome::NotApplicable;
        };

        let Some(key) = self.join_key(&vars) else {
            return ParseOutcome::NotApplicable;
        };
        let last = self.patterns.len() - 1;

        let mut buffer = self.multi.lock();
        if idx == 0 {
            if last == 0 {
                drop(buffer);
                return self.finalize(vars);
            }
            buffer.start(key, vars);
            return ParseOutcome::Buffered;
        }

        if !buffer.merge(&key, vars) {
            debug!(
                indexer = %self.def.identifier,
                "dropping continuation line with no buffered announce"
            );
            return ParseOutcome::NotApplicable;
        }

        if idx == last {
            match buffer.take(&key) {
                Some(merged) => {
                    drop(buffer);
                    self.finalize(merged)
                }
                None => ParseOutcome::NotApplicable,
            }
        } else {
            ParseOutcome::Buffered
        }
    }

    /// Bind a line's capture groups to the rule's variable names.
    fn capture(&self, idx: usize, line: &str) -> Option<HashMap<String, String>> {
        let caps = self.patterns[idx].captures(line)?;
        let names = &self.def.parse.lines[idx].vars;

        let mut vars = HashMap::with_capacity(names.len());
        for (name, group) in names.iter().zip(caps.iter().skip(1)) {
            let value = group.map(|m| m.as_str()).unwrap_or_default();
            vars.insert(name.clone(), value.to_string());
        }
        Some(vars)
    }

    /// The accumulation key for a multi-line announce, if all join vars bound.
    fn join_key(&self, vars: &HashMap<String, String>) -> Option<String> {
        let mut parts = Vec::with_capacity(self.def.parse.joinkey.len());
        for name in &self.def.parse.joinkey {
            match vars.get(name) {
                Some(value) if !value.is_empty() => parts.push(value.as_str()),
                _ => return None,
            }
        }
        Some(parts.join("|"))
    }

    /// Apply mappings, render the URL, and assemble the release record.
    fn finalize(&self, captured: HashMap<String, String>) -> ParseOutcome {
        // Union of user settings and captured vars; captures win.
        let mut vars = self.settings.clone();
        vars.extend(captured);

        for line in &self.def.parse.lines {
            for (name, mapping) in &line.mappings {
                if let Some(value) = vars.get_mut(name) {
                    *value = mapping.get(value).cloned().unwrap_or_default();
                }
            }
        }

        let url = template::render(&self.def.parse.matchers.torrenturl, &vars);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ParseOutcome::Invalid(format!("download url has no scheme: {:?}", url));
        }

        let name = vars.get("torrentName").cloned().unwrap_or_default();
        if name.is_empty() {
            return ParseOutcome::Invalid("missing torrentName".to_string());
        }

        let get = |key: &str| vars.get(key).cloned().unwrap_or_default();
        let release = Release {
            id: 0,
            indexer: self.def.identifier.clone(),
            name,
            category: get("category"),
            year: get("year"),
            tags: get("tags"),
            size: vars.get("size").and_then(|s| parse_bytes(s)),
            freeleech: is_truthy(&get("freeleech")),
            download_url: url,
            timestamp: Utc::now(),
            vars,
        };
        ParseOutcome::Parsed(release)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse a human-readable size ("1.2 GB", "700 MiB", "1234") into bytes.
pub fn parse_bytes(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let split = raw
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.trim().parse().ok()?;

    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0 * 1024.0,
        "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((value * multiplier) as i64)
}
