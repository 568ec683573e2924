//! Materialized favorites for the current viewer, plus the ledger of
//! in-flight optimistic mutations used to roll them back.
//!
//! Confirmed remote writes are remembered until a read issued after them is
//! applied, so membership stays right even when the follow-up read fails or
//! an older read lands late.

use super::{EntityId, EntityRecord};
use crate::identity::UserId;
use std::collections::{HashMap, HashSet};

/// Receipt for an optimistic mutation; settle or roll back with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationToken {
    entity_id: EntityId,
    token: u64,
    was_member: bool,
}

impl MutationToken {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Whether the entity was a member before the mutation started
    pub fn was_member(&self) -> bool {
        self.was_member
    }
}

#[derive(Debug, Clone)]
struct PendingMutation {
    token: u64,
    /// Position and record removed optimistically, if the entity was cached
    snapshot: Option<(usize, EntityRecord)>,
    /// Confirmed write this mutation superseded, restored on rollback
    confirmed: Option<ConfirmedWrite>,
}

/// A remote write that reads with a ticket up to `floor` may not reflect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConfirmedWrite {
    liked: bool,
    floor: u64,
}

#[derive(Debug)]
pub struct FavoritesCache {
    owner: Option<UserId>,
    records: Vec<EntityRecord>,
    pending: HashMap<EntityId, PendingMutation>,
    confirmed: HashMap<EntityId, ConfirmedWrite>,
    stale: bool,
    version: u64,
    next_token: u64,
    applied_refresh: u64,
}

impl Default for FavoritesCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FavoritesCache {
    /// An empty cache that has never been loaded (stale).
    pub fn new() -> Self {
        Self {
            owner: None,
            records: Vec::new(),
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            stale: true,
            version: 0,
            next_token: 1,
            applied_refresh: 0,
        }
    }

    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Membership, including confirmed additions whose record is not loaded yet
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.position(entity_id).is_some() || self.confirmed_addition(entity_id)
    }

    pub fn ids(&self) -> HashSet<EntityId> {
        self.records
            .iter()
            .map(|r| r.id.clone())
            .chain(
                self.confirmed
                    .iter()
                    .filter(|(_, write)| write.liked)
                    .map(|(id, _)| id.clone()),
            )
            .collect()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_pending(&self, entity_id: &EntityId) -> bool {
        self.pending.contains_key(entity_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Bumped on every visible change and on invalidation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Start an optimistic mutation.
    ///
    /// A cached entity is removed right away (its record is kept for
    /// rollback). An uncached entity is left alone: its record is only known
    /// once the remote store returns it.
    pub fn begin_mutation(&mut self, entity_id: &EntityId) -> MutationToken {
        let snapshot = self
            .position(entity_id)
            .map(|idx| (idx, self.records.remove(idx)));
        let confirmed = self.confirmed.remove(entity_id);
        let was_member = snapshot.is_some() || confirmed.map_or(false, |write| write.liked);
        let token = self.next_token;
        self.next_token += 1;
        self.pending.insert(
            entity_id.clone(),
            PendingMutation {
                token,
                snapshot,
                confirmed,
            },
        );
        if was_member {
            self.bump();
        }
        MutationToken {
            entity_id: entity_id.clone(),
            token,
            was_member,
        }
    }

    /// The remote write succeeded; `liked` is the membership it produced.
    ///
    /// `floor` is the highest read ticket issued so far: those reads may
    /// predate the write, so the write outranks them when they land.
    pub fn settle(&mut self, mutation: &MutationToken, liked: bool, floor: u64) {
        if self.take_pending(mutation).is_none() {
            return;
        }
        let was_member = self.contains(&mutation.entity_id);
        if !liked {
            if let Some(idx) = self.position(&mutation.entity_id) {
                self.records.remove(idx);
            }
        }
        self.confirmed
            .insert(mutation.entity_id.clone(), ConfirmedWrite { liked, floor });
        if was_member != liked {
            self.bump();
        }
    }

    /// The remote write failed: restore this entity's pre-mutation membership.
    ///
    /// Only the mutated entity is restored, so concurrent mutations of other
    /// entities keep their optimistic state.
    pub fn rollback(&mut self, mutation: &MutationToken) {
        let Some(pending) = self.take_pending(mutation) else {
            return;
        };
        if let Some(write) = pending.confirmed {
            self.confirmed.insert(mutation.entity_id.clone(), write);
            if write.liked {
                self.bump();
            }
        }
        let current = self.position(&mutation.entity_id);
        match (pending.snapshot, current) {
            (Some((idx, record)), None) => {
                let idx = idx.min(self.records.len());
                self.records.insert(idx, record);
                self.bump();
            }
            (None, Some(idx)) => {
                self.records.remove(idx);
                self.bump();
            }
            _ => {}
        }
        self.stale = true;
    }

    /// Replace the contents with a remote read.
    ///
    /// Returns false (and changes nothing) when the read belongs to another
    /// owner or is older than the last applied read. Pending optimistic
    /// removals stay hidden until their mutation settles, and confirmed
    /// writes the read may predate still apply on top of it.
    pub fn replace(&mut self, owner: &UserId, records: Vec<EntityRecord>, ticket: u64) -> bool {
        if self.owner.as_ref() != Some(owner) || ticket <= self.applied_refresh {
            return false;
        }
        self.applied_refresh = ticket;
        self.confirmed.retain(|_, write| write.floor >= ticket);

        let hidden: HashSet<&EntityId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.snapshot.is_some())
            .map(|(id, _)| id)
            .chain(
                self.confirmed
                    .iter()
                    .filter(|(_, write)| !write.liked)
                    .map(|(id, _)| id),
            )
            .collect();
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| !hidden.contains(&r.id) && seen.insert(r.id.clone()))
            .collect();

        self.records = records;
        self.stale = false;
        self.bump();
        true
    }

    /// Drop everything and scope the cache to `owner`.
    pub fn reset(&mut self, owner: Option<UserId>) {
        self.owner = owner;
        self.records.clear();
        self.pending.clear();
        self.confirmed.clear();
        self.stale = true;
        self.bump();
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
        self.bump();
    }

    fn take_pending(&mut self, mutation: &MutationToken) -> Option<PendingMutation> {
        match self.pending.get(&mutation.entity_id) {
            Some(pending) if pending.token == mutation.token => {
                self.pending.remove(&mutation.entity_id)
            }
            _ => None,
        }
    }

    fn confirmed_addition(&self, entity_id: &EntityId) -> bool {
        self.confirmed
            .get(entity_id)
            .map_or(false, |write| write.liked)
    }

    fn position(&self, entity_id: &EntityId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == entity_id)
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}
