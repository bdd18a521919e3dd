//! Launches one seed node per chain listed by the chain directory.
//!
//! The chain list is fetched once. Every chain then gets its own task that
//! fetches the chain's descriptor, provisions its home directory and runs its
//! [`SeedNode`] until shutdown. Launches are spaced out by the configured
//! stagger; the stagger only delays spawning, so a slow chain never holds up
//! the next one. A chain that fails is reported and the others keep going.

use crate::error::SeedError;
use crate::peers::validate_and_format;
use crate::provision::ChainProvisioner;
use crate::shutdown::Shutdown;
use crate::status::{StatusBoard, SupervisorState};
use crate::supervisor::{SeedNode, SupervisorSettings};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tinyseed_config::BaseSettings;
use tinyseed_registry::{ChainDirectory, RegistryError};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Final result of one chain
#[derive(Debug)]
pub struct ChainOutcome {
    pub chain_id: String,
    pub result: Result<SupervisorState, SeedError>,
}

/// What happened to every launched chain
#[derive(Debug, Default)]
pub struct OrchestratorReport {
    pub outcomes: Vec<ChainOutcome>,
}

impl OrchestratorReport {
    pub fn launched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SeedError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn outcome(&self, chain_id: &str) -> Option<&ChainOutcome> {
        self.outcomes.iter().find(|o| o.chain_id == chain_id)
    }
}

/// Runs seed nodes for every chain of a directory
pub struct Orchestrator {
    settings: Arc<BaseSettings>,
    directory: Arc<dyn ChainDirectory>,
    shutdown: Shutdown,
    board: StatusBoard,
    chain_filter: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        settings: BaseSettings,
        directory: Arc<dyn ChainDirectory>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            directory,
            shutdown,
            board: StatusBoard::new(),
            chain_filter: Vec::new(),
        }
    }

    /// Restricts seeding to the given chain ids. Empty means every chain.
    pub fn with_chain_filter(mut self, chains: Vec<String>) -> Self {
        self.chain_filter = chains;
        self
    }

    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Chains to launch, in directory order: empty and duplicate ids are
    /// dropped and the filter applied. Chain `i` of the result listens on
    /// `base_port + i`.
    pub fn select_chains(&self, listed: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        listed
            .into_iter()
            .filter(|chain_id| {
                if chain_id.trim().is_empty() {
                    warn!("skipping empty chain id");
                    return false;
                }
                if !seen.insert(chain_id.clone()) {
                    warn!(chain = %chain_id, "skipping duplicate chain id");
                    return false;
                }
                self.chain_filter.is_empty() || self.chain_filter.contains(chain_id)
            })
            .collect()
    }

    /// Fetches the chain list, launches every chain and waits for all of
    /// them. Blocks until shutdown even when no chain could be started.
    pub async fn run(&self) -> Result<OrchestratorReport, RegistryError> {
        let listed = self.directory.fetch_chain_list().await?;
        let total = listed.len();
        let chains = self.select_chains(listed);
        info!(listed = total, selected = chains.len(), "🌐 seeding chains");

        let mut tasks = JoinSet::new();
        let mut task_chains = HashMap::new();
        for (index, chain_id) in chains.into_iter().enumerate() {
            if index > 0 && !self.settings.launch_stagger().is_zero() {
                tokio::select! {
                    _ = self.shutdown.wait() => break,
                    _ = sleep(self.settings.launch_stagger()) => {}
                }
            }
            if self.shutdown.is_triggered() {
                break;
            }

            self.board.set(&chain_id, SupervisorState::Starting);
            let launch = ChainLaunch {
                index,
                chain_id: chain_id.clone(),
                settings: self.settings.clone(),
                directory: self.directory.clone(),
                shutdown: self.shutdown.clone(),
                board: self.board.clone(),
            };
            let handle = tasks.spawn(launch.run());
            task_chains.insert(handle.id(), chain_id);
        }

        let mut report = OrchestratorReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, joined) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(chain_id) = task_chains.remove(&id) else {
                continue;
            };
            let result = joined.unwrap_or_else(|e| {
                Err(SeedError::Aborted {
                    chain_id: chain_id.clone(),
                    reason: e.to_string(),
                })
            });

            match &result {
                Ok(state) => info!(chain = %chain_id, %state, "chain finished"),
                Err(e) => {
                    self.board.set(&chain_id, SupervisorState::Failed);
                    error!(chain = %chain_id, "chain failed: {}", e);
                }
            }
            report.outcomes.push(ChainOutcome { chain_id, result });
        }

        if !self.shutdown.is_triggered() {
            warn!(
                failed = report.failed(),
                "no seed node left running, waiting for shutdown"
            );
            self.shutdown.wait().await;
        }

        info!(
            launched = report.launched(),
            failed = report.failed(),
            "all chains stopped"
        );
        Ok(report)
    }
}

/// Everything one chain's task needs
struct ChainLaunch {
    index: usize,
    chain_id: String,
    settings: Arc<BaseSettings>,
    directory: Arc<dyn ChainDirectory>,
    shutdown: Shutdown,
    board: StatusBoard,
}

impl ChainLaunch {
    async fn run(self) -> Result<SupervisorState, SeedError> {
        let chain_id = self.chain_id;
        let descriptor = self
            .directory
            .fetch_chain(&chain_id)
            .await
            .map_err(|source| SeedError::Registry {
                chain_id: chain_id.clone(),
                source,
            })?;
        if !descriptor.chain_id.is_empty() && descriptor.chain_id != chain_id {
            warn!(
                chain = %chain_id,
                descriptor = %descriptor.chain_id,
                "descriptor names a different chain"
            );
        }

        let seeds = validate_and_format(descriptor.raw_peers());
        if seeds.len() < descriptor.raw_peers().len() {
            info!(
                chain = %chain_id,
                kept = seeds.len(),
                listed = descriptor.raw_peers().len(),
                "dropped malformed peers"
            );
        }

        let config = self
            .settings
            .seed_config(&chain_id, self.index, seeds)
            .map_err(|source| SeedError::Config {
                chain_id: chain_id.clone(),
                source,
            })?;
        let provisioned = ChainProvisioner::from_settings(&self.settings)
            .provision(&config)
            .map_err(|source| SeedError::Provisioning {
                chain_id: chain_id.clone(),
                source,
            })?;

        SeedNode::new(
            config,
            provisioned.node_key,
            provisioned.addr_book_file,
            SupervisorSettings::from(self.settings.as_ref()),
        )
        .with_status_board(self.board)
        .run(self.shutdown)
        .await
    }
}
