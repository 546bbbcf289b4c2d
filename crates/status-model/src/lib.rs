//! Status catalog shared by the publisher and its configuration.
//!
//! A catalog is a closed, ordered set of named statuses, each bound to the
//! exact string written to the state file.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{Result, ensure};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// One `{name, value}` entry as written in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusDefinition {
    pub name: String,
    pub value: String,
}

impl StatusDefinition {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A status taken from a [`StatusCatalog`].
///
/// Ordered by position in the catalog, then by name and serialized value.
/// Cloning only bumps reference counts.
#[derive(Debug, Clone)]
pub struct Status {
    ordinal: usize,
    name: Arc<str>,
    value: Arc<str>,
}

impl Status {
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialized form persisted verbatim to the state file.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl PartialEq for Status {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal && self.name == other.name && self.value == other.value
    }
}

impl Eq for Status {}

impl Hash for Status {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordinal.hash(state);
        self.name.hash(state);
        self.value.hash(state);
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal
            .cmp(&other.ordinal)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCatalog {
    statuses: Vec<Status>,
}

impl StatusCatalog {
    const AGENT: [(&'static str, &'static str); 5] = [
        ("shutdown", "0|shutdown"),
        ("starting", "1|starting"),
        ("idle", "2|idle"),
        ("preparing", "3|preparing"),
        ("working", "4|working"),
    ];

    /// Builds a catalog, assigning ordinals in definition order.
    pub fn new<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = StatusDefinition>,
    {
        let mut statuses: Vec<Status> = Vec::new();
        for (ordinal, definition) in definitions.into_iter().enumerate() {
            let name = definition.name.trim();
            ensure!(
                !name.is_empty(),
                "statuses[{}].name must not be blank",
                ordinal
            );
            ensure!(
                !statuses
                    .iter()
                    .any(|existing| existing.name.eq_ignore_ascii_case(name)),
                "status '{}' is defined more than once",
                name
            );
            statuses.push(Status {
                ordinal,
                name: Arc::from(name),
                value: Arc::from(definition.value.as_str()),
            });
        }
        ensure!(!statuses.is_empty(), "statuses must not be empty");
        Ok(Self { statuses })
    }

    /// The build agent catalog: shutdown, starting, idle, preparing, working.
    pub fn agent() -> Self {
        let statuses = Self::AGENT
            .iter()
            .enumerate()
            .map(|(ordinal, (name, value))| Status {
                ordinal,
                name: Arc::from(*name),
                value: Arc::from(*value),
            })
            .collect();
        Self { statuses }
    }

    /// Looks a status up by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<Status> {
        let name = name.trim();
        self.statuses
            .iter()
            .find(|status| status.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Status> {
        self.statuses.iter()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl Default for StatusCatalog {
    fn default() -> Self {
        Self::agent()
    }
}

impl<'de> Deserialize<'de> for StatusCatalog {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let definitions = Vec::<StatusDefinition>::deserialize(deserializer)?;
        StatusCatalog::new(definitions).map_err(|err| de::Error::custom(format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_catalog_keeps_definition_order() {
        let catalog = StatusCatalog::agent();
        let names: Vec<&str> = catalog.iter().map(Status::name).collect();
        assert_eq!(
            names,
            ["shutdown", "starting", "idle", "preparing", "working"]
        );

        let starting = catalog.get("starting").expect("starting");
        let working = catalog.get("working").expect("working");
        assert!(starting < working);
        assert_eq!(starting.value(), "1|starting");
        assert_eq!(working.to_string(), "working");
    }

    #[test]
    fn lookup_ignores_case_and_surrounding_whitespace() {
        let catalog = StatusCatalog::agent();
        assert_eq!(catalog.get(" IDLE ").expect("idle").value(), "2|idle");
        assert!(catalog.get("sleeping").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = StatusCatalog::new([
            StatusDefinition::new("up", "1"),
            StatusDefinition::new("Up", "2"),
        ])
        .expect_err("duplicate");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn blank_names_and_empty_lists_are_rejected() {
        assert!(StatusCatalog::new([StatusDefinition::new("  ", "x")]).is_err());
        assert!(StatusCatalog::new(Vec::<StatusDefinition>::new()).is_err());
    }

    #[test]
    fn deserializes_from_yaml_sequence() {
        let catalog: StatusCatalog = serde_yaml::from_str(
            r#"
- name: offline
  value: "0|offline"
- name: online
  value: "1|online"
"#,
        )
        .expect("valid catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("online").expect("online").ordinal(), 1);
    }

    #[test]
    fn invalid_yaml_catalog_reports_reason() {
        let err = serde_yaml::from_str::<StatusCatalog>("[]").expect_err("empty");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn statuses_from_different_catalogs_are_distinct() {
        let agent = StatusCatalog::agent();
        let custom =
            StatusCatalog::new([StatusDefinition::new("booting", "0|boot")]).expect("catalog");
        assert_ne!(agent.get("shutdown"), custom.get("booting"));
    }

    #[test]
    fn same_name_with_different_value_is_a_different_status() {
        let agent = StatusCatalog::agent();
        let renumbered = StatusCatalog::new([StatusDefinition::new("shutdown", "9|shutdown")])
            .expect("catalog");
        let original = agent.get("shutdown").expect("shutdown");
        let other = renumbered.get("shutdown").expect("shutdown");

        assert_eq!(original.ordinal(), other.ordinal());
        assert_ne!(original, other);
        assert!(original < other);
        assert_eq!(original, StatusCatalog::agent().get("shutdown").expect("shutdown"));
    }
}
