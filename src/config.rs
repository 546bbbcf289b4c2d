use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::ensure;
use serde::Deserialize;
use status_model::{Status, StatusCatalog};

use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::publisher::DEFAULT_RETRY_INTERVAL;

/// Lifecycle event to status name map. Agent shutdown is not listed here; it
/// always publishes [`Configuration::shutdown_status`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Transitions {
    pub agent_started: String,
    pub build_started: String,
    pub preparation_finished: String,
    pub build_finished: String,
}

impl Default for Transitions {
    fn default() -> Self {
        Self {
            agent_started: "idle".to_string(),
            build_started: "preparing".to_string(),
            preparation_finished: "working".to_string(),
            build_finished: "idle".to_string(),
        }
    }
}

impl Transitions {
    pub fn status_name_for(&self, event: LifecycleEvent) -> Option<&str> {
        match event {
            LifecycleEvent::AgentStarted => Some(self.agent_started.as_str()),
            LifecycleEvent::BuildStarted => Some(self.build_started.as_str()),
            LifecycleEvent::PreparationFinished => Some(self.preparation_finished.as_str()),
            LifecycleEvent::BuildFinished => Some(self.build_finished.as_str()),
            LifecycleEvent::AgentShutdown => None,
        }
    }

    fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("agent-started", self.agent_started.as_str()),
            ("build-started", self.build_started.as_str()),
            ("preparation-finished", self.preparation_finished.as_str()),
            ("build-finished", self.build_finished.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory holding the state file; created on first write.
    pub state_dir: PathBuf,
    pub file_name: String,
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    pub initial_status: String,
    pub shutdown_status: String,
    pub statuses: StatusCatalog,
    pub transitions: Transitions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("agent-state"),
            file_name: "current-state".to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            initial_status: "starting".to_string(),
            shutdown_status: "shutdown".to_string(),
            statuses: StatusCatalog::agent(),
            transitions: Transitions::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.check().map_err(Error::Invalid)?;
        Ok(self)
    }

    fn check(&self) -> anyhow::Result<()> {
        let file_name = self.file_name.trim();
        ensure!(!file_name.is_empty(), "file-name must not be blank");
        ensure!(
            matches!(
                Path::new(file_name).components().collect::<Vec<_>>().as_slice(),
                [Component::Normal(_)]
            ),
            "file-name must be a single path component, got '{}'",
            self.file_name
        );
        ensure!(
            !self.retry_interval.is_zero(),
            "retry-interval must be positive"
        );
        for (field, name) in [
            ("initial-status", self.initial_status.as_str()),
            ("shutdown-status", self.shutdown_status.as_str()),
        ] {
            ensure!(
                self.statuses.contains(name),
                "{} '{}' is not a configured status",
                field,
                name
            );
        }
        for (event, name) in self.transitions.entries() {
            ensure!(
                self.statuses.contains(name),
                "transitions.{} '{}' is not a configured status",
                event,
                name
            );
        }
        Ok(())
    }

    pub fn target_path(&self) -> PathBuf {
        self.state_dir.join(self.file_name.trim())
    }

    /// Looks a status up in the configured catalog.
    pub fn status(&self, name: &str) -> Result<Status> {
        self.statuses
            .get(name)
            .ok_or_else(|| Error::UnknownStatus(name.to_string()))
    }
}
