//! Address book.
//!
//! Persisted set of known peer addresses with dial statistics. The book is
//! loaded from disk on open and written back by [`AddrBook::save`].

use crate::{NetAddress, NetworkError, NetworkResult, NodeId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on stored addresses
pub const MAX_ADDR_BOOK_SIZE: usize = 10_000;

/// Addresses that never answered are dropped after this many attempts
pub const MAX_FAILED_ATTEMPTS: u32 = 10;

/// A known address and its dial history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAddress {
    pub addr: NetAddress,
    /// Who told us about the address
    pub src: String,
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl KnownAddress {
    fn new(addr: NetAddress, src: &str) -> Self {
        Self {
            addr,
            src: src.to_string(),
            attempts: 0,
            last_attempt: None,
            last_success: None,
        }
    }

    fn is_bad(&self) -> bool {
        self.last_success.is_none() && self.attempts >= MAX_FAILED_ATTEMPTS
    }
}

#[derive(Serialize, Deserialize)]
struct AddrBookFile {
    key: String,
    addrs: Vec<KnownAddress>,
}

struct BookState {
    key: String,
    addrs: HashMap<NodeId, KnownAddress>,
    our_ids: HashSet<NodeId>,
}

/// Known peer addresses of one chain
pub struct AddrBook {
    path: PathBuf,
    strict: bool,
    state: Mutex<BookState>,
}

impl AddrBook {
    /// Opens the book at `path`, creating an empty one if the file is
    /// missing. With `strict` set, non-routable addresses are refused and
    /// dropped from a loaded file.
    pub fn open(path: &Path, strict: bool) -> NetworkResult<Self> {
        let book_error = |reason: String| NetworkError::AddrBook {
            path: path.to_path_buf(),
            reason,
        };

        let (key, addrs) = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| book_error(e.to_string()))?;
            let file: AddrBookFile =
                serde_json::from_str(&content).map_err(|e| book_error(format!("malformed: {e}")))?;
            let total = file.addrs.len();
            let addrs: HashMap<_, _> = file
                .addrs
                .into_iter()
                .filter(|known| !strict || known.addr.is_routable())
                .map(|known| (known.addr.id.clone(), known))
                .collect();
            debug!(path = %path.display(), loaded = addrs.len(), total, "loaded address book");
            (file.key, addrs)
        } else {
            let mut key = [0u8; 12];
            rand::thread_rng().fill_bytes(&mut key);
            (hex::encode(key), HashMap::new())
        };

        Ok(Self {
            path: path.to_path_buf(),
            strict,
            state: Mutex::new(BookState {
                key,
                addrs,
                our_ids: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Marks an id as our own so it is never stored or dialed
    pub fn add_our_address(&self, addr: &NetAddress) {
        let mut state = self.state.lock();
        state.addrs.remove(&addr.id);
        state.our_ids.insert(addr.id.clone());
    }

    /// Adds an address learned from `src`. Returns `Ok(false)` when the id is
    /// already known, is ours or the book is full.
    pub fn add_address(&self, addr: NetAddress, src: &str) -> NetworkResult<bool> {
        if self.strict && !addr.is_routable() {
            return Err(NetworkError::NonRoutable(addr.to_string()));
        }

        let mut state = self.state.lock();
        if state.our_ids.contains(&addr.id) || state.addrs.contains_key(&addr.id) {
            return Ok(false);
        }
        if state.addrs.len() >= MAX_ADDR_BOOK_SIZE {
            warn!(path = %self.path.display(), "address book full, dropping {}", addr);
            return Ok(false);
        }
        state.addrs.insert(addr.id.clone(), KnownAddress::new(addr, src));
        Ok(true)
    }

    pub fn has(&self, id: &NodeId) -> bool {
        self.state.lock().addrs.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<KnownAddress> {
        self.state.lock().addrs.get(id).cloned()
    }

    pub fn size(&self) -> usize {
        self.state.lock().addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Records a dial attempt, dropping addresses that keep failing
    pub fn mark_attempt(&self, id: &NodeId) {
        let mut state = self.state.lock();
        let bad = match state.addrs.get_mut(id) {
            Some(known) => {
                known.attempts += 1;
                known.last_attempt = Some(Utc::now());
                known.is_bad()
            }
            None => false,
        };
        if bad {
            debug!(%id, "dropping address after {} failed attempts", MAX_FAILED_ATTEMPTS);
            state.addrs.remove(id);
        }
    }

    /// Records a successful connection
    pub fn mark_good(&self, id: &NodeId) {
        if let Some(known) = self.state.lock().addrs.get_mut(id) {
            known.attempts = 0;
            known.last_success = Some(Utc::now());
        }
    }

    /// Forgets an address
    pub fn mark_bad(&self, id: &NodeId) {
        self.state.lock().addrs.remove(id);
    }

    /// Random sample of up to `max` addresses to share with a peer
    pub fn selection(&self, max: usize) -> Vec<NetAddress> {
        let state = self.state.lock();
        let mut addrs: Vec<NetAddress> = state.addrs.values().map(|k| k.addr.clone()).collect();
        addrs.shuffle(&mut rand::thread_rng());
        addrs.truncate(max);
        addrs
    }

    /// Up to `max` addresses worth dialing: not in `exclude` and not tried
    /// within `retry_after`. Fewer past attempts come first.
    pub fn pick_to_dial(
        &self,
        exclude: &HashSet<NodeId>,
        retry_after: chrono::Duration,
        max: usize,
    ) -> Vec<NetAddress> {
        let now = Utc::now();
        let state = self.state.lock();
        let mut candidates: Vec<&KnownAddress> = state
            .addrs
            .values()
            .filter(|k| !exclude.contains(&k.addr.id))
            .filter(|k| k.last_attempt.map_or(true, |t| now - t >= retry_after))
            .collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates.sort_by_key(|k| k.attempts);
        candidates
            .into_iter()
            .take(max)
            .map(|k| k.addr.clone())
            .collect()
    }

    /// Writes the book to disk atomically
    pub fn save(&self) -> NetworkResult<()> {
        let book_error = |reason: String| NetworkError::AddrBook {
            path: self.path.clone(),
            reason,
        };

        let file = {
            let state = self.state.lock();
            let mut addrs: Vec<KnownAddress> = state.addrs.values().cloned().collect();
            addrs.sort_by(|a, b| a.addr.id.cmp(&b.addr.id));
            AddrBookFile {
                key: state.key.clone(),
                addrs,
            }
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| book_error(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| book_error(e.to_string()))?;
        debug!(path = %self.path.display(), size = file.addrs.len(), "saved address book");
        Ok(())
    }
}

impl std::fmt::Debug for AddrBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddrBook")
            .field("path", &self.path)
            .field("strict", &self.strict)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKey;
    use tempfile::TempDir;

    fn addr(host: &str) -> NetAddress {
        NetAddress::new(NodeKey::generate().id(), host, 26656)
    }

    #[test]
    fn test_open_creates_empty_book() {
        let dir = TempDir::new().unwrap();
        let book = AddrBook::open(&dir.path().join("addrbook.json"), true).unwrap();
        assert!(book.is_empty());
        assert!(book.is_strict());
        assert_eq!(book.state.lock().key.len(), 24);
    }

    #[test]
    fn test_strict_mode_refuses_private_addresses() {
        let dir = TempDir::new().unwrap();
        let strict = AddrBook::open(&dir.path().join("strict.json"), true).unwrap();
        let lax = AddrBook::open(&dir.path().join("lax.json"), false).unwrap();

        let private = addr("192.168.0.2");
        assert!(matches!(
            strict.add_address(private.clone(), "test"),
            Err(NetworkError::NonRoutable(_))
        ));
        assert!(lax.add_address(private, "test").unwrap());

        assert!(strict.add_address(addr("8.8.8.8"), "test").unwrap());
    }

    #[test]
    fn test_duplicates_and_own_address() {
        let dir = TempDir::new().unwrap();
        let book = AddrBook::open(&dir.path().join("addrbook.json"), false).unwrap();
        let peer = addr("1.1.1.1");
        assert!(book.add_address(peer.clone(), "a").unwrap());
        assert!(!book.add_address(peer.clone(), "b").unwrap());
        assert_eq!(book.get(&peer.id).unwrap().src, "a");

        let ours = addr("127.0.0.1");
        book.add_our_address(&ours);
        assert!(!book.add_address(ours.clone(), "c").unwrap());
        assert!(!book.has(&ours.id));
    }

    #[test]
    fn test_failed_addresses_are_dropped() {
        let dir = TempDir::new().unwrap();
        let book = AddrBook::open(&dir.path().join("addrbook.json"), false).unwrap();
        let flaky = addr("1.1.1.1");
        let dead = addr("2.2.2.2");
        book.add_address(flaky.clone(), "t").unwrap();
        book.add_address(dead.clone(), "t").unwrap();

        book.mark_good(&flaky.id);
        for _ in 0..MAX_FAILED_ATTEMPTS {
            book.mark_attempt(&flaky.id);
            book.mark_attempt(&dead.id);
        }
        assert!(book.has(&flaky.id));
        assert!(!book.has(&dead.id));
    }

    #[test]
    fn test_pick_to_dial_skips_excluded_and_recent() {
        let dir = TempDir::new().unwrap();
        let book = AddrBook::open(&dir.path().join("addrbook.json"), false).unwrap();
        let a = addr("1.1.1.1");
        let b = addr("2.2.2.2");
        let c = addr("3.3.3.3");
        for peer in [&a, &b, &c] {
            book.add_address(peer.clone(), "t").unwrap();
        }
        book.mark_attempt(&b.id);

        let exclude: HashSet<NodeId> = [a.id.clone()].into_iter().collect();
        let picked = book.pick_to_dial(&exclude, chrono::Duration::minutes(1), 10);
        assert_eq!(picked, vec![c.clone()]);

        let picked = book.pick_to_dial(&HashSet::new(), chrono::Duration::zero(), 10);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked.last(), Some(&b));

        assert_eq!(book.selection(2).len(), 2);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addrbook.json");
        let book = AddrBook::open(&path, false).unwrap();
        let public = addr("9.9.9.9");
        let private = addr("10.1.1.1");
        book.add_address(public.clone(), "t").unwrap();
        book.add_address(private.clone(), "t").unwrap();
        book.mark_good(&public.id);
        book.save().unwrap();

        let reopened = AddrBook::open(&path, false).unwrap();
        assert_eq!(reopened.size(), 2);
        assert_eq!(reopened.state.lock().key, book.state.lock().key);
        assert!(reopened.get(&public.id).unwrap().last_success.is_some());

        let strict = AddrBook::open(&path, true).unwrap();
        assert_eq!(strict.size(), 1);
        assert!(strict.has(&public.id));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("addrbook.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AddrBook::open(&path, true),
            Err(NetworkError::AddrBook { .. })
        ));
    }
}
