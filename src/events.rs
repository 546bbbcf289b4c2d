use std::fmt;
use std::str::FromStr;

/// Agent lifecycle notifications that drive status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    AgentStarted,
    BuildStarted,
    PreparationFinished,
    BuildFinished,
    AgentShutdown,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 5] = [
        LifecycleEvent::AgentStarted,
        LifecycleEvent::BuildStarted,
        LifecycleEvent::PreparationFinished,
        LifecycleEvent::BuildFinished,
        LifecycleEvent::AgentShutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::AgentStarted => "agent-started",
            LifecycleEvent::BuildStarted => "build-started",
            LifecycleEvent::PreparationFinished => "preparation-finished",
            LifecycleEvent::BuildFinished => "build-finished",
            LifecycleEvent::AgentShutdown => "agent-shutdown",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle event '{0}'")]
pub struct UnknownEvent(pub String);

impl FromStr for LifecycleEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|event| event.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownEvent(trimmed.to_string()))
    }
}
