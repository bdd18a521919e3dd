//! Shared view of every chain's supervisor state.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of one chain's seed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Provisioning and binding
    Starting,
    /// Transport bound, switch not started yet
    Listening,
    /// Accepting, dialing and crawling
    Running,
    /// Gave up before reaching `Running`
    Failed,
    /// Left `Running` on shutdown
    Stopped,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SupervisorState::Failed | SupervisorState::Stopped)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Listening => "listening",
            SupervisorState::Running => "running",
            SupervisorState::Failed => "failed",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Chain id to state. Each supervisor only writes its own key.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    states: Arc<DashMap<String, SupervisorState>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, chain_id: &str, state: SupervisorState) {
        self.states.insert(chain_id.to_string(), state);
    }

    pub fn get(&self, chain_id: &str) -> Option<SupervisorState> {
        self.states.get(chain_id).map(|entry| *entry)
    }

    /// Number of chains currently in `state`
    pub fn count(&self, state: SupervisorState) -> usize {
        self.states.iter().filter(|entry| *entry.value() == state).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Sorted copy of the board
    pub fn snapshot(&self) -> BTreeMap<String, SupervisorState> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
