//! Indexer definition registry.
//!
//! Declarative per-indexer metadata: which IRC server and channels the
//! tracker announces on, which bot nicknames post the announces, how to
//! parse them, and which user-supplied secrets the download URL needs.
//! Definitions are bundled into the binary and loaded once at startup;
//! they are immutable at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

/// Bundled indexer definitions, embedded at compile time.
const BUNDLED_DEFINITIONS: &[(&str, &str)] = &[
    ("digitalcore", include_str!("../../definitions/digitalcore.toml")),
    ("morethantv", include_str!("../../definitions/morethantv.toml")),
    ("redacted", include_str!("../../definitions/redacted.toml")),
];

/// Errors loading or validating indexer definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("definition {identifier}: {source}")]
    Parse {
        identifier: String,
        source: toml::de::Error,
    },
    #[error("definition {identifier}: invalid pattern: {source}")]
    Pattern {
        identifier: String,
        source: regex::Error,
    },
    #[error("definition {identifier}: {reason}")]
    Invalid { identifier: String, reason: String },
}

/// A complete indexer definition.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerDefinition {
    pub identifier: String,
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub irc: IrcDefinition,
    pub parse: ParseDefinition,
}

fn default_protocol() -> String {
    "torrent".to_string()
}

/// Where the indexer announces.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcDefinition {
    pub network: String,
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub channels: Vec<String>,
    pub announcers: Vec<String>,
    #[serde(default)]
    pub settings: Vec<SettingDescriptor>,
}

/// Setting kind, controls UI rendering and redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    #[default]
    Text,
    Secret,
}

/// A typed descriptor for one user-supplied setting.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SettingKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// Announce format: single line or multi line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseKind {
    #[default]
    Single,
    Multi,
}

/// Parse rules for an indexer's announce format.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseDefinition {
    #[serde(rename = "type", default)]
    pub kind: ParseKind,
    /// Variables whose captured values key multi-line accumulation.
    #[serde(default)]
    pub joinkey: Vec<String>,
    pub lines: Vec<ParseLine>,
    #[serde(rename = "match")]
    pub matchers: ParseMatch,
}

/// One line rule: a pattern and the variables its captures bind to.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseLine {
    pub pattern: String,
    pub vars: Vec<String>,
    /// Per-variable value translations applied after binding.
    #[serde(default)]
    pub mappings: HashMap<String, HashMap<String, String>>,
}

/// Output composition.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseMatch {
    /// Template producing the final download URL.
    pub torrenturl: String,
}

/// Registry of loaded definitions.
#[derive(Debug)]
pub struct IndexerRegistry {
    definitions: Vec<Arc<IndexerDefinition>>,
}

impl IndexerRegistry {
    /// Load and validate the bundled definitions.
    pub fn load_bundled() -> Result<Self, DefinitionError> {
        let mut definitions = Vec::with_capacity(BUNDLED_DEFINITIONS.len());
        for (identifier, raw) in BUNDLED_DEFINITIONS {
            let def: IndexerDefinition =
                toml::from_str(raw).map_err(|source| DefinitionError::Parse {
                    identifier: identifier.to_string(),
                    source,
                })?;
            definitions.push(def);
        }
        Self::from_definitions(definitions)
    }

    /// Build a registry from already-parsed definitions, validating each.
    pub fn from_definitions(
        definitions: Vec<IndexerDefinition>,
    ) -> Result<Self, DefinitionError> {
        for def in &definitions {
            validate_definition(def)?;
        }
        Ok(Self {
            definitions: definitions.into_iter().map(Arc::new).collect(),
        })
    }

    /// Look up a definition by identifier.
    pub fn get(&self, identifier: &str) -> Option<Arc<IndexerDefinition>> {
        self.definitions
            .iter()
            .find(|d| d.identifier == identifier)
            .cloned()
    }

    /// Definitions announcing on the given IRC server.
    pub fn for_server(&self, server: &str) -> Vec<Arc<IndexerDefinition>> {
        self.definitions
            .iter()
            .filter(|d| d.irc.server.eq_ignore_ascii_case(server))
            .cloned()
            .collect()
    }

    /// All loaded definitions.
    pub fn all(&self) -> &[Arc<IndexerDefinition>] {
        &self.definitions
    }

    /// Check user-supplied settings against the definitions they target.
    ///
    /// Returns one message per unknown indexer or unknown setting name.
    pub fn validate_user_settings(
        &self,
        user_settings: &HashMap<String, HashMap<String, String>>,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        for (identifier, settings) in user_settings {
            let Some(def) = self.get(identifier) else {
                errors.push(format!("indexers.{}: unknown indexer", identifier));
                continue;
            };
            for name in settings.keys() {
                if !def.irc.settings.iter().any(|s| &s.name == name) {
                    errors.push(format!(
                        "indexers.{}.{}: unknown setting (expected one of: {})",
                        identifier,
                        name,
                        def.irc
                            .settings
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
            }
        }
        errors
    }
}

fn validate_definition(def: &IndexerDefinition) -> Result<(), DefinitionError> {
    let invalid = |reason: String| DefinitionError::Invalid {
        identifier: def.identifier.clone(),
        reason,
    };

    if def.irc.server.is_empty() {
        return Err(invalid("irc.server must not be empty".to_string()));
    }
    if def.irc.channels.is_empty() {
        return Err(invalid("irc.channels must not be empty".to_string()));
    }
    if def.irc.announcers.is_empty() {
        return Err(invalid("irc.announcers must not be empty".to_string()));
    }
    if def.parse.lines.is_empty() {
        return Err(invalid("parse.lines must not be empty".to_string()));
    }
    if def.parse.matchers.torrenturl.is_empty() {
        return Err(invalid("match.torrenturl must not be empty".to_string()));
    }

    for line in &def.parse.lines {
        let regex = regex::Regex::new(&line.pattern).map_err(|source| DefinitionError::Pattern {
            identifier: def.identifier.clone(),
            source,
        })?;
        let captures = regex.captures_len() - 1;
        if captures != line.vars.len() {
            return Err(invalid(format!(
                "pattern has {} capture groups but {} vars: {}",
                captures,
                line.vars.len(),
                line.pattern
            )));
        }
    }

    if def.parse.kind == ParseKind::Multi {
        if def.parse.joinkey.is_empty() {
            return Err(invalid(
                "multi-line parse requires a joinkey".to_string(),
            ));
        }
        for key in &def.parse.joinkey {
            for line in &def.parse.lines {
                if !line.vars.contains(key) {
                    return Err(invalid(format!(
                        "joinkey var {:?} missing from a line's vars",
                        key
                    )));
                }
            }
        }
    }

    Ok(())
}
