//! The switch owns the transport and every live peer.
//!
//! Background tasks started by [`Switch::start`]:
//! - accept loop: takes inbound connections up to the inbound limit
//! - seed dialer: dials the configured seeds with exponential back-off until
//!   one answers
//! - crawler: periodically dials addresses from the book up to the outbound
//!   limit
//! - book flusher: periodically saves the address book
//!
//! Every peer gets its own task that asks for addresses, answers requests
//! and hangs up once the reactor's peer lifetime is over.

use super::{Connection, PexReactor, SwitchConfig, Transport};
use crate::{AddrBook, NetAddress, NetworkError, NetworkResult, NodeId, NodeInfo};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use rand::seq::SliceRandom;
use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore},
    task::JoinSet,
    time::{interval, sleep, sleep_until, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Live connection counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerCounts {
    pub outbound: usize,
    pub inbound: usize,
    pub dialing: usize,
}

#[derive(Debug)]
struct PeerEntry {
    outbound: bool,
}

struct Shared {
    config: SwitchConfig,
    transport: Transport,
    pex: PexReactor,
    peers: DashMap<NodeId, PeerEntry>,
    dialing: DashSet<NodeId>,
    /// One permit per inbound connection, held from accept until hang-up
    inbound_slots: Arc<Semaphore>,
    stop_tx: watch::Sender<bool>,
}

/// Connection manager of one node
pub struct Switch {
    shared: Arc<Shared>,
    tasks: Mutex<JoinSet<()>>,
}

impl Switch {
    /// Assembles a switch. Nothing runs until [`Switch::start`].
    pub fn new(config: SwitchConfig, transport: Transport, pex: PexReactor) -> Self {
        let own = NetAddress::from_socket(transport.node_info().id.clone(), transport.local_addr());
        pex.book().add_our_address(&own);

        let (stop_tx, _) = watch::channel(false);
        let inbound_slots = Arc::new(Semaphore::new(
            config.max_num_inbound_peers.min(Semaphore::MAX_PERMITS),
        ));
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                pex,
                peers: DashMap::new(),
                dialing: DashSet::new(),
                inbound_slots,
                stop_tx,
            }),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn node_info(&self) -> &NodeInfo {
        self.shared.transport.node_info()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.transport.local_addr()
    }

    pub fn addr_book(&self) -> &Arc<AddrBook> {
        self.shared.pex.book()
    }

    /// Current outbound, inbound and in-flight dial counts
    pub fn num_peers(&self) -> PeerCounts {
        self.shared.counts()
    }

    /// Whether [`Switch::stop`] has been called
    pub fn is_stopped(&self) -> bool {
        *self.shared.stop_tx.borrow()
    }

    /// Starts accepting and dialing
    pub async fn start(&self) -> NetworkResult<()> {
        self.shared
            .config
            .validate()
            .map_err(NetworkError::Incompatible)?;
        let listener = self
            .shared
            .transport
            .take_listener()
            .ok_or(NetworkError::AlreadyStarted)?;

        let book = self.shared.pex.book();
        for seed in self.shared.pex.seeds() {
            if let Err(e) = book.add_address(seed.clone(), "seed") {
                debug!(%seed, "seed not added to address book: {}", e);
            }
        }

        let mut tasks = self.tasks.lock().await;
        tasks.spawn(accept_loop(self.shared.clone(), listener));
        if !self.shared.pex.seeds().is_empty() {
            tasks.spawn(dial_seeds(self.shared.clone()));
        }
        tasks.spawn(crawl_loop(self.shared.clone()));
        tasks.spawn(flush_loop(self.shared.clone()));

        info!(
            id = %self.node_info().id,
            listen = %self.local_addr(),
            seed_mode = self.shared.pex.is_seed_mode(),
            seeds = self.shared.pex.seeds().len(),
            book_size = book.size(),
            "switch started"
        );
        Ok(())
    }

    /// Resolves once the switch has been stopped
    pub async fn wait(&self) {
        let mut stop = self.shared.stop_tx.subscribe();
        stopped(&mut stop).await;
    }

    /// Closes the listener, disconnects every peer and saves the address book
    pub async fn stop(&self) -> NetworkResult<()> {
        if self.shared.stop_tx.send_replace(true) {
            return Ok(());
        }

        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!("switch task panicked: {}", e);
                }
            }
        }

        let book = self.shared.pex.book();
        book.save()?;
        info!(id = %self.node_info().id, book_size = book.size(), "switch stopped");
        Ok(())
    }
}

impl Shared {
    fn counts(&self) -> PeerCounts {
        let mut counts = PeerCounts {
            dialing: self.dialing.len(),
            ..Default::default()
        };
        for peer in self.peers.iter() {
            if peer.outbound {
                counts.outbound += 1;
            } else {
                counts.inbound += 1;
            }
        }
        counts
    }

    fn connected_or_dialing(&self) -> HashSet<NodeId> {
        self.peers
            .iter()
            .map(|p| p.key().clone())
            .chain(self.dialing.iter().map(|id| id.clone()))
            .collect()
    }

    /// Dials `addr` and performs the handshake
    async fn connect(&self, addr: &NetAddress) -> NetworkResult<(Connection, NodeInfo)> {
        if !self.dialing.insert(addr.id.clone()) {
            return Err(NetworkError::InvalidAddress {
                address: addr.to_string(),
                reason: "dial already in progress".to_string(),
            });
        }
        let book = self.pex.book();
        book.mark_attempt(&addr.id);

        let result = async {
            let mut conn = self.transport.dial(addr).await?;
            let theirs = self.transport.handshake(&mut conn).await?;
            if theirs.id != addr.id {
                return Err(NetworkError::Handshake {
                    address: conn.remote_addr(),
                    reason: format!("expected id {}, peer announced {}", addr.id, theirs.id),
                });
            }
            Ok((conn, theirs))
        }
        .await;
        self.dialing.remove(&addr.id);

        match &result {
            Ok(_) => book.mark_good(&addr.id),
            Err(NetworkError::Handshake { .. }) | Err(NetworkError::Incompatible(_)) => {
                book.mark_bad(&addr.id)
            }
            Err(_) => {}
        }
        result
    }

    async fn handle_inbound(self: Arc<Self>, stream: TcpStream, _slot: OwnedSemaphorePermit) {
        let mut conn = match Connection::new(stream, false) {
            Ok(conn) => conn,
            Err(e) => {
                debug!("dropping inbound connection: {}", e);
                return;
            }
        };
        let remote = conn.remote_addr();
        let theirs = match self.transport.handshake(&mut conn).await {
            Ok(info) => info,
            Err(e) => {
                debug!(%remote, "inbound handshake failed: {}", e);
                return;
            }
        };

        if let Some(port) = theirs.listen_port() {
            let announced = NetAddress::new(theirs.id.clone(), remote.ip().to_string(), port);
            match self.pex.book().add_address(announced, &remote.to_string()) {
                Ok(true) => debug!(%remote, id = %theirs.id, "learned inbound peer address"),
                Ok(false) => {}
                Err(e) => debug!(%remote, "inbound peer address not stored: {}", e),
            }
        }

        self.run_peer(conn, theirs).await;
    }

    /// Serves one peer until it leaves, its lifetime runs out or the switch
    /// stops
    async fn run_peer(self: Arc<Self>, mut conn: Connection, theirs: NodeInfo) {
        let id = theirs.id.clone();
        let remote = conn.remote_addr();
        let outbound = conn.is_outbound();

        match self.peers.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!(%remote, %id, "already connected, dropping duplicate");
                conn.shutdown().await;
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(PeerEntry { outbound });
            }
        }
        debug!(%remote, %id, outbound, moniker = %theirs.moniker, "peer connected");

        let src = NetAddress::from_socket(id.clone(), remote);
        let deadline = self.pex.peer_lifetime().map(|d| Instant::now() + d);
        let mut stop = self.stop_tx.subscribe();

        let session = async {
            conn.send(&self.pex.request()).await?;
            loop {
                tokio::select! {
                    _ = stopped(&mut stop) => break,
                    _ = sleep_until_opt(deadline) => {
                        debug!(%remote, %id, "peer lifetime over, disconnecting");
                        break;
                    }
                    received = conn.recv() => match received? {
                        None => break,
                        Some(message) => {
                            if let Some(reply) = self.pex.receive(&src, message) {
                                conn.send(&reply).await?;
                            }
                        }
                    }
                }
            }
            Ok::<(), NetworkError>(())
        }
        .await;

        conn.shutdown().await;
        self.peers.remove(&id);
        match session {
            Ok(()) => debug!(%remote, %id, "peer disconnected"),
            Err(e) => debug!(%remote, %id, "peer session ended: {}", e),
        }
    }

    /// Dials book addresses until the outbound budget is used up
    fn ensure_peers(self: &Arc<Self>) {
        let counts = self.counts();
        let budget = self
            .config
            .max_num_outbound_peers
            .saturating_sub(counts.outbound + counts.dialing);
        if budget == 0 {
            return;
        }

        let retry_after = chrono::Duration::from_std(self.config.recrawl_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let picked = self
            .pex
            .book()
            .pick_to_dial(&self.connected_or_dialing(), retry_after, budget);
        if picked.is_empty() {
            return;
        }
        debug!(count = picked.len(), ?counts, "crawling addresses");

        for addr in picked {
            let shared = self.clone();
            tokio::spawn(async move {
                match shared.connect(&addr).await {
                    Ok((conn, theirs)) => shared.run_peer(conn, theirs).await,
                    Err(e) => debug!(%addr, "dial failed: {}", e),
                }
            });
        }
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    let mut stop = shared.stop_tx.subscribe();
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => match shared.inbound_slots.clone().try_acquire_owned() {
                    Ok(slot) => {
                        tokio::spawn(shared.clone().handle_inbound(stream, slot));
                    }
                    Err(_) => debug!(%remote, "inbound limit reached, refusing connection"),
                },
                Err(e) => {
                    warn!("failed to accept connection: {}", e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
    debug!("accept loop stopped");
}

async fn dial_seeds(shared: Arc<Shared>) {
    let mut stop = shared.stop_tx.subscribe();
    let mut attempt = 0u32;
    loop {
        let mut seeds = shared.pex.seeds().to_vec();
        seeds.shuffle(&mut rand::thread_rng());

        let mut reached = 0usize;
        for seed in seeds {
            if *stop.borrow() {
                return;
            }
            match shared.connect(&seed).await {
                Ok((conn, theirs)) => {
                    reached += 1;
                    tokio::spawn(shared.clone().run_peer(conn, theirs));
                }
                Err(e) => debug!(%seed, "seed dial failed: {}", e),
            }
        }
        if reached > 0 {
            info!(reached, "connected to seeds");
            return;
        }

        let delay = shared.pex.dial_backoff(attempt);
        attempt = attempt.saturating_add(1);
        warn!(attempt, retry_in = ?delay, "no seed reachable");
        tokio::select! {
            _ = stopped(&mut stop) => return,
            _ = sleep(delay) => {}
        }
    }
}

async fn crawl_loop(shared: Arc<Shared>) {
    let mut stop = shared.stop_tx.subscribe();
    let mut ticker = interval(shared.config.ensure_peers_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            _ = ticker.tick() => shared.ensure_peers(),
        }
    }
}

async fn flush_loop(shared: Arc<Shared>) {
    let mut stop = shared.stop_tx.subscribe();
    let mut ticker = interval(shared.config.addr_book_save_period);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            _ = ticker.tick() => {
                if let Err(e) = shared.pex.book().save() {
                    warn!("failed to save address book: {}", e);
                }
            }
        }
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
