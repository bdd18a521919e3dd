//! Seed node supervisor.
//!
//! One [`SeedNode`] runs per chain and owns that chain's listening socket,
//! node key, address book and switch. It walks
//! `Starting → Listening → Running`, reports peer counts on a fixed interval
//! while running and ends in `Stopped` on shutdown. Anything that goes wrong
//! before `Running` leaves it in `Failed` and comes back as a [`SeedError`]
//! for that chain alone.

use crate::error::SeedError;
use crate::shutdown::Shutdown;
use crate::status::{StatusBoard, SupervisorState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tinyseed_config::{BaseSettings, SeedConfig};
use tinyseed_network::p2p::DIAL_TIMEOUT_SECS;
use tinyseed_network::{
    AddrBook, NodeInfo, NodeKey, PexConfig, PexReactor, Switch, SwitchConfig, Transport,
    NODE_VERSION, PEX_CHANNEL, PROTOCOL_VERSION,
};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Timings of a supervisor and its switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Interval between two peer count reports
    pub health_interval: Duration,
    /// How long the seed keeps a crawled peer
    pub seed_disconnect_wait: Duration,
    pub handshake_timeout: Duration,
    pub dial_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&BaseSettings::default())
    }
}

impl From<&BaseSettings> for SupervisorSettings {
    fn from(settings: &BaseSettings) -> Self {
        Self {
            health_interval: settings.health_interval(),
            seed_disconnect_wait: settings.seed_disconnect_wait(),
            handshake_timeout: settings.handshake_timeout(),
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
        }
    }
}

/// Peer counts of one chain at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub chain_id: String,
    pub outbound: usize,
    pub inbound: usize,
    pub dialing: usize,
}

/// Seed node of one chain
pub struct SeedNode {
    config: SeedConfig,
    node_key: NodeKey,
    addr_book_path: PathBuf,
    settings: SupervisorSettings,
    board: StatusBoard,
    state: SupervisorState,
    switch: Option<Switch>,
    span: Span,
}

impl SeedNode {
    pub fn new(
        config: SeedConfig,
        node_key: NodeKey,
        addr_book_path: PathBuf,
        settings: SupervisorSettings,
    ) -> Self {
        let span = info_span!("seed", chain = %config.chain_id);
        Self {
            config,
            node_key,
            addr_book_path,
            settings,
            board: StatusBoard::new(),
            state: SupervisorState::Starting,
            switch: None,
            span,
        }
    }

    /// Publishes state changes on `board`
    pub fn with_status_board(self, board: StatusBoard) -> Self {
        board.set(&self.config.chain_id, self.state);
        Self { board, ..self }
    }

    pub fn chain_id(&self) -> &str {
        &self.config.chain_id
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Address actually bound, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.switch.as_ref().map(|switch| switch.local_addr())
    }

    /// What this node announces in every handshake
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            protocol_version: PROTOCOL_VERSION,
            id: self.node_key.id(),
            listen_addr: self.config.listen_address.clone(),
            network: self.config.chain_id.clone(),
            version: NODE_VERSION.to_string(),
            channels: vec![PEX_CHANNEL],
            moniker: format!("{}-seed", self.config.chain_id),
        }
    }

    /// Current peer counts; all zero until running
    pub fn health(&self) -> HealthReport {
        let counts = self
            .switch
            .as_ref()
            .map(|switch| switch.num_peers())
            .unwrap_or_default();
        HealthReport {
            chain_id: self.config.chain_id.clone(),
            outbound: counts.outbound,
            inbound: counts.inbound,
            dialing: counts.dialing,
        }
    }

    /// Brings the node to `Running`
    pub async fn start(&mut self) -> Result<(), SeedError> {
        let span = self.span.clone();
        self.start_inner().instrument(span).await
    }

    /// Starts the node, reports health until `shutdown` fires, then stops.
    /// Returns the final state, or the error that kept the node from
    /// running.
    pub async fn run(mut self, shutdown: Shutdown) -> Result<SupervisorState, SeedError> {
        let span = self.span.clone();
        async move {
            self.start_inner().await?;
            self.report_until(&shutdown).await;
            self.stop_inner().await;
            Ok(self.state)
        }
        .instrument(span)
        .await
    }

    /// Stops the switch and saves the address book
    pub async fn stop(&mut self) {
        let span = self.span.clone();
        self.stop_inner().instrument(span).await
    }

    async fn start_inner(&mut self) -> Result<(), SeedError> {
        match self.bring_up().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.transition(SupervisorState::Failed);
                error!("❌ seed node failed: {}", e);
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self) -> Result<(), SeedError> {
        let chain_id = self.config.chain_id.clone();
        let listen = self
            .config
            .listen_addr()
            .map_err(|source| SeedError::Config {
                chain_id: chain_id.clone(),
                source,
            })?;
        let node_info = self.node_info();

        info!(
            node_id = %node_info.id,
            listen = %listen,
            max_inbound = self.config.max_num_inbound_peers,
            max_outbound = self.config.max_num_outbound_peers,
            seeds = self.config.seeds.len(),
            "🚀 starting seed node {}@{}",
            node_info.id,
            listen.socket_string()
        );

        let transport = Transport::listen(&listen.socket_string(), node_info)
            .await
            .map_err(|e| SeedError::from_listen(&chain_id, e))?
            .with_timeouts(self.settings.handshake_timeout, self.settings.dial_timeout);
        self.transition(SupervisorState::Listening);

        let book = AddrBook::open(&self.addr_book_path, self.config.addr_book_strict).map_err(
            |source| SeedError::AddrBook {
                chain_id: chain_id.clone(),
                source,
            },
        )?;
        let pex = PexReactor::new(
            Arc::new(book),
            PexConfig {
                seed_mode: true,
                seeds: self.config.seeds.clone(),
                seed_disconnect_wait_period: self.settings.seed_disconnect_wait,
                persistent_peers_max_dial_period: Duration::ZERO,
            },
        );

        let switch_config = SwitchConfig::new()
            .with_peer_limits(
                self.config.max_num_inbound_peers,
                self.config.max_num_outbound_peers,
            )
            .with_handshake_timeout(self.settings.handshake_timeout)
            .with_dial_timeout(self.settings.dial_timeout);
        let switch = Switch::new(switch_config, transport, pex);
        switch
            .start()
            .await
            .map_err(|source| SeedError::Switch { chain_id, source })?;

        info!(listen = %switch.local_addr(), "✅ seed node running");
        self.switch = Some(switch);
        self.transition(SupervisorState::Running);
        Ok(())
    }

    async fn report_until(&self, shutdown: &Shutdown) {
        let period = self.settings.health_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    let report = self.health();
                    info!(
                        outbound = report.outbound,
                        inbound = report.inbound,
                        dialing = report.dialing,
                        "📊 {} outbound, {} inbound, {} dialing",
                        report.outbound,
                        report.inbound,
                        report.dialing
                    );
                }
            }
        }
    }

    async fn stop_inner(&mut self) {
        if let Some(switch) = self.switch.take() {
            if let Err(e) = switch.stop().await {
                warn!("switch did not stop cleanly: {}", e);
            }
        }
        if self.state == SupervisorState::Running {
            self.transition(SupervisorState::Stopped);
            info!("🛑 seed node stopped");
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!(from = %self.state, to = %next, "state change");
        self.state = next;
        self.board.set(&self.config.chain_id, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(dir: &TempDir, chain_id: &str, listen: &str) -> SeedNode {
        let mut config = BaseSettings::default()
            .seed_config(chain_id, 0, Vec::new())
            .unwrap();
        config.listen_address = listen.to_string();
        config.addr_book_strict = false;
        SeedNode::new(
            config,
            NodeKey::generate(),
            dir.path().join("addrbook.json"),
            SupervisorSettings::default(),
        )
    }

    #[test]
    fn test_node_info_describes_chain() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, "cosmoshub-4", "tcp://0.0.0.0:9000");
        let info = node.node_info();
        assert_eq!(info.network, "cosmoshub-4");
        assert_eq!(info.moniker, "cosmoshub-4-seed");
        assert_eq!(info.channels, vec![PEX_CHANNEL]);
        assert_eq!(info.listen_addr, "tcp://0.0.0.0:9000");
        assert_eq!(info.version, NODE_VERSION);
    }

    #[tokio::test]
    async fn test_health_is_zero_before_and_after_start() {
        let dir = TempDir::new().unwrap();
        let mut node = node(&dir, "lonely-1", "tcp://127.0.0.1:0");
        assert_eq!(node.health().outbound + node.health().inbound, 0);

        node.start().await.unwrap();
        assert_eq!(node.state(), SupervisorState::Running);
        let report = node.health();
        assert_eq!(
            (report.outbound, report.inbound, report.dialing),
            (0, 0, 0)
        );

        node.stop().await;
        assert_eq!(node.state(), SupervisorState::Stopped);
        assert!(dir.path().join("addrbook.json").exists());
    }

    #[tokio::test]
    async fn test_bad_listen_address_fails_the_chain() {
        let dir = TempDir::new().unwrap();
        let board = StatusBoard::new();
        let mut node = node(&dir, "broken-1", "tcp://nowhere").with_status_board(board.clone());

        let err = node.start().await.unwrap_err();
        assert_eq!(err.chain_id(), "broken-1");
        assert_eq!(node.state(), SupervisorState::Failed);
        assert_eq!(board.get("broken-1"), Some(SupervisorState::Failed));
    }
}
