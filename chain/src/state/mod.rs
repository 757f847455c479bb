//! Versioned world state: accounts, identities, and the global epoch
//! counter, committed one block at a time.
//!
//! [`Snapshot`] is an owned working copy of the state a block applier
//! mutates in place while executing a block's transactions. It never
//! shares storage with the committed state behind it — a block that
//! fails partway through is discarded by simply dropping its snapshot,
//! with no rollback bookkeeping required.

use std::collections::BTreeMap;

use crate::error::{ChainError, ChainResult};
use crate::types::{Account, Address, Global, Hash256, Identity};

/// An owned, mutable working copy of world state for one block.
///
/// Taken from a [`StateDB`] via [`StateDB::new_for_check`], mutated by
/// the executor and block applier, then either discarded or committed
/// back with [`StateDB::commit`].
#[derive(Clone, Debug)]
pub struct Snapshot {
    base_version: u64,
    accounts: BTreeMap<Address, Account>,
    identities: BTreeMap<Address, Identity>,
    global: Global,
}

impl Snapshot {
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn account(&self, addr: &Address) -> Account {
        self.accounts.get(addr).cloned().unwrap_or_default()
    }

    pub fn set_account(&mut self, addr: Address, account: Account) {
        self.accounts.insert(addr, account);
    }

    pub fn identity(&self, addr: &Address) -> Identity {
        self.identities.get(addr).cloned().unwrap_or_default()
    }

    pub fn set_identity(&mut self, addr: Address, identity: Identity) {
        self.identities.insert(addr, identity);
    }

    pub fn global(&self) -> Global {
        self.global
    }

    pub fn set_global(&mut self, global: Global) {
        self.global = global;
    }

    /// Iterates identities currently alive (used by the validators cache
    /// and sortition to build the committee pool).
    pub fn alive_identities(&self) -> impl Iterator<Item = (&Address, &Identity)> {
        self.identities.iter().filter(|(_, id)| id.is_alive())
    }

    /// Promotes every `Candidate` identity to `Verified`. Run once per
    /// epoch advance; calling it again with no new candidates is a no-op.
    pub fn promote_candidates(&mut self) {
        for identity in self.identities.values_mut() {
            if identity.state == crate::types::IdentityState::Candidate {
                identity.state = crate::types::IdentityState::Verified;
            }
        }
    }

    /// Deterministic commitment root over the full state: a Merkle-style
    /// binary hash tree would be the production choice, but a single
    /// Keccak-256 over the sorted, RLP-encoded entries gives the same
    /// determinism and collision properties at prototype scale.
    pub fn commitment_root(&self) -> Hash256 {
        let mut buf = Vec::new();
        for (addr, account) in &self.accounts {
            buf.extend_from_slice(addr.as_bytes());
            buf.extend_from_slice(&rlp::encode(account));
        }
        for (addr, identity) in &self.identities {
            buf.extend_from_slice(addr.as_bytes());
            buf.extend_from_slice(&rlp::encode(identity));
        }
        buf.extend_from_slice(&rlp::encode(&self.global));
        Hash256::compute(&buf)
    }
}

/// Versioned state storage. Each successfully committed block advances
/// the version by one; [`StateDB::reset`] rewinds to a prior version
/// (used when a fork-choice switch discards blocks).
pub trait StateDB: Send + Sync {
    fn version(&self) -> u64;

    fn account(&self, addr: &Address) -> Account;
    fn identity(&self, addr: &Address) -> Identity;
    fn global(&self) -> Global;

    /// Returns the root of the state currently committed.
    fn root(&self) -> Hash256;

    /// Opens a fresh, owned [`Snapshot`] seeded from the current
    /// committed state.
    fn new_for_check(&self) -> Snapshot;

    /// Computes the root a snapshot would have without committing it.
    fn precommit(&self, snapshot: &Snapshot) -> Hash256 {
        snapshot.commitment_root()
    }

    /// Persists `snapshot` as the new committed state, advancing the
    /// version by one. Fails if `snapshot` was not derived from the
    /// current version (a stale check-state, e.g. after a concurrent
    /// commit).
    fn commit(&mut self, snapshot: Snapshot) -> ChainResult<Hash256>;

    /// Rewinds committed state back to `version`, discarding history
    /// after it. `version` must not exceed the current version.
    fn reset(&mut self, version: u64) -> ChainResult<()>;
}

/// In-memory, versioned [`StateDB`] backed by a history of committed
/// snapshots. Sufficient for tests and for the engine's check-state
/// workflow; a production node would back this with the repository's
/// column families instead of keeping every version resident.
pub struct InMemoryStateDB {
    history: Vec<Snapshot>,
}

impl InMemoryStateDB {
    pub fn new() -> Self {
        Self {
            history: vec![Snapshot {
                base_version: 0,
                accounts: BTreeMap::new(),
                identities: BTreeMap::new(),
                global: Global::default(),
            }],
        }
    }

    fn current(&self) -> &Snapshot {
        self.history.last().expect("history always has genesis entry")
    }
}

impl Default for InMemoryStateDB {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDB for InMemoryStateDB {
    fn version(&self) -> u64 {
        (self.history.len() - 1) as u64
    }

    fn account(&self, addr: &Address) -> Account {
        self.current().account(addr)
    }

    fn identity(&self, addr: &Address) -> Identity {
        self.current().identity(addr)
    }

    fn global(&self) -> Global {
        self.current().global()
    }

    fn root(&self) -> Hash256 {
        self.current().commitment_root()
    }

    fn new_for_check(&self) -> Snapshot {
        let mut snap = self.current().clone();
        snap.base_version = self.version();
        snap
    }

    fn commit(&mut self, snapshot: Snapshot) -> ChainResult<Hash256> {
        if snapshot.base_version != self.version() {
            return Err(ChainError::Repository(format!(
                "stale snapshot: based on version {}, current version is {}",
                snapshot.base_version,
                self.version()
            )));
        }
        let root = snapshot.commitment_root();
        self.history.push(snapshot);
        Ok(root)
    }

    fn reset(&mut self, version: u64) -> ChainResult<()> {
        if version > self.version() {
            return Err(ChainError::Repository(format!(
                "cannot reset to future version {} from {}",
                version,
                self.version()
            )));
        }
        self.history.truncate((version + 1) as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn addr(byte: u8) -> Address {
        Address([byte; crate::types::ADDRESS_LEN])
    }

    #[test]
    fn fresh_db_has_default_account() {
        let db = InMemoryStateDB::new();
        assert_eq!(db.account(&addr(1)), Account::default());
        assert_eq!(db.version(), 0);
    }

    #[test]
    fn commit_advances_version_and_root() {
        let mut db = InMemoryStateDB::new();
        let root0 = db.root();

        let mut snap = db.new_for_check();
        snap.set_account(
            addr(1),
            Account {
                balance: BigUint::from(100u32),
                nonce: 0,
                epoch: 0,
            },
        );
        let root1 = db.commit(snap).expect("commit");

        assert_ne!(root0, root1);
        assert_eq!(db.version(), 1);
        assert_eq!(db.account(&addr(1)).balance, BigUint::from(100u32));
    }

    #[test]
    fn commit_rejects_stale_snapshot() {
        let mut db = InMemoryStateDB::new();
        let stale = db.new_for_check();

        let fresh = db.new_for_check();
        db.commit(fresh).expect("first commit");

        assert!(db.commit(stale).is_err());
    }

    #[test]
    fn reset_rewinds_to_prior_version() {
        let mut db = InMemoryStateDB::new();
        let snap = db.new_for_check();
        db.commit(snap).expect("commit");
        assert_eq!(db.version(), 1);

        db.reset(0).expect("reset");
        assert_eq!(db.version(), 0);
    }

    #[test]
    fn snapshot_alive_identities_filters_undefined_and_killed() {
        let db = InMemoryStateDB::new();
        let mut snap = db.new_for_check();
        snap.set_identity(
            addr(1),
            Identity {
                state: crate::types::IdentityState::Verified,
                stake: BigUint::from(10u32),
                invites_remaining: 2,
            },
        );
        snap.set_identity(addr(2), Identity::default());

        let alive: Vec<_> = snap.alive_identities().map(|(a, _)| *a).collect();
        assert_eq!(alive, vec![addr(1)]);
    }
}
