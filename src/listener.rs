//! Translates agent lifecycle callbacks into publisher requests.

use status_model::Status;
use tracing::{debug, info_span};

use crate::config::{Configuration, Transitions};
use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::publisher::{PublisherOptions, StatusPublisher};

pub struct AgentStateListener {
    publisher: StatusPublisher,
    transitions: Transitions,
    shutdown_status: Status,
    config: Configuration,
}

impl AgentStateListener {
    /// Starts publishing the configured initial status to the configured file.
    pub fn start(config: Configuration) -> Result<Self> {
        let config = config.validated()?;
        let target = config.target_path();
        let options = PublisherOptions::default()
            .with_retry_interval(config.retry_interval)
            .with_span(info_span!("agent_state", path = %target.display()));
        let publisher =
            StatusPublisher::with_options(config.status(&config.initial_status)?, target, options)?;
        Self::assemble(config, publisher)
    }

    /// Wraps an already running publisher, e.g. one writing to a custom sink.
    pub fn with_publisher(config: Configuration, publisher: StatusPublisher) -> Result<Self> {
        Self::assemble(config.validated()?, publisher)
    }

    /// `config` must already be validated.
    fn assemble(config: Configuration, publisher: StatusPublisher) -> Result<Self> {
        Ok(Self {
            shutdown_status: config.status(&config.shutdown_status)?,
            transitions: config.transitions.clone(),
            publisher,
            config,
        })
    }

    pub fn on_start(&self) -> Result<()> {
        self.handle(LifecycleEvent::AgentStarted)
    }

    pub fn on_status_change(&self, status: Status) {
        self.publisher.set_status(status);
    }

    /// Publishes the shutdown status and waits for it to be flushed.
    pub fn on_stop(&self) {
        self.publisher.set_status(self.shutdown_status.clone());
        self.publisher.shutdown();
    }

    pub fn handle(&self, event: LifecycleEvent) -> Result<()> {
        debug!(%event, "lifecycle event received");
        match self.transitions.status_name_for(event) {
            Some(name) => {
                let status = self.config.status(name)?;
                self.on_status_change(status);
            }
            None => self.on_stop(),
        }
        Ok(())
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::AgentStateListener;
    use crate::config::Configuration;
    use crate::events::LifecycleEvent;
    use std::fs;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> Configuration {
        Configuration {
            state_dir: dir.to_path_buf(),
            ..Configuration::default()
        }
    }

    #[test]
    fn build_events_map_to_agent_statuses() {
        let tmp = tempdir().expect("tempdir");
        let listener = AgentStateListener::start(config_in(tmp.path())).expect("listener");

        listener.on_start().expect("start");
        assert_eq!(listener.publisher().desired().name(), "idle");
        listener.handle(LifecycleEvent::BuildStarted).expect("build");
        assert_eq!(listener.publisher().desired().name(), "preparing");
        listener
            .handle(LifecycleEvent::PreparationFinished)
            .expect("prepared");
        assert_eq!(listener.publisher().desired().name(), "working");
        listener.handle(LifecycleEvent::BuildFinished).expect("done");
        assert_eq!(listener.publisher().desired().name(), "idle");

        listener.on_stop();
        assert!(!listener.publisher().is_running());
        assert_eq!(
            fs::read_to_string(tmp.path().join("current-state")).expect("state file"),
            "0|shutdown"
        );
    }

    #[test]
    fn agent_shutdown_event_stops_the_publisher() {
        let tmp = tempdir().expect("tempdir");
        let listener = AgentStateListener::start(config_in(tmp.path())).expect("listener");

        listener
            .handle(LifecycleEvent::AgentShutdown)
            .expect("shutdown");
        assert!(!listener.publisher().is_running());
        assert_eq!(
            fs::read_to_string(tmp.path().join("current-state")).expect("state file"),
            "0|shutdown"
        );
    }

    #[test]
    fn invalid_configuration_is_rejected_before_starting() {
        let tmp = tempdir().expect("tempdir");
        let cfg = Configuration {
            initial_status: "booting".to_string(),
            ..config_in(tmp.path())
        };
        assert!(AgentStateListener::start(cfg).is_err());
        assert!(!tmp.path().join("current-state").exists());
    }

    #[test]
    fn invalid_file_name_never_reaches_the_filesystem() {
        let tmp = tempdir().expect("tempdir");
        let state_dir = tmp.path().join("agent-state");
        let cfg = Configuration {
            file_name: "../escaped-state".to_string(),
            ..config_in(&state_dir)
        };
        assert!(AgentStateListener::start(cfg).is_err());
        assert!(!state_dir.exists());
        assert!(!tmp.path().join("escaped-state").exists());
    }

    #[test]
    fn with_publisher_rejects_invalid_configuration() {
        let tmp = tempdir().expect("tempdir");
        let cfg = config_in(tmp.path());
        let publisher = crate::publisher::StatusPublisher::new(
            cfg.status("starting").expect("starting"),
            cfg.target_path(),
        )
        .expect("publisher");
        let cfg = Configuration {
            shutdown_status: "halted".to_string(),
            ..cfg
        };
        assert!(AgentStateListener::with_publisher(cfg, publisher).is_err());
    }
}
