//! Routing table: which initiator each broadcast group belongs to.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::{AlreadyClaimed, GroupKey, UserId};

/// Group → initiator claims, shared between the dispatcher (writes) and the
/// reply router (reads).
///
/// At most one initiator per group. Cloning is cheap; all clones observe the
/// same table.
#[derive(Clone, Default)]
pub struct RoutingTable {
    entries: Arc<DashMap<GroupKey, UserId>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a group for an initiator.
    ///
    /// Succeeds if the group is unclaimed or already claimed by the same
    /// initiator; fails without mutating anything otherwise.
    pub fn claim(&self, group: GroupKey, initiator: UserId) -> Result<(), AlreadyClaimed> {
        match self.entries.entry(group) {
            Entry::Occupied(entry) if *entry.get() == initiator => Ok(()),
            Entry::Occupied(entry) => Err(AlreadyClaimed {
                group,
                by: *entry.get(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(initiator);
                debug!(%group, %initiator, "group claimed");
                Ok(())
            }
        }
    }

    /// Drop the claim on a group. Returns the previous initiator, if any.
    pub fn release(&self, group: GroupKey) -> Option<UserId> {
        let released = self.entries.remove(&group).map(|(_, initiator)| initiator);
        if let Some(initiator) = released {
            debug!(%group, %initiator, "group released");
        }
        released
    }

    pub fn initiator_for(&self, group: GroupKey) -> Option<UserId> {
        self.entries.get(&group).map(|entry| *entry.value())
    }

    /// Reverse lookup by scan. The table holds one entry per active
    /// broadcast, so this stays small.
    pub fn group_for(&self, initiator: UserId) -> Option<GroupKey> {
        self.entries
            .iter()
            .find(|entry| *entry.value() == initiator)
            .map(|entry| *entry.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
