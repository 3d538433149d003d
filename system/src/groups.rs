use crate::{ConnectionId, GroupName};
use dashmap::DashMap;
use std::collections::HashSet;

/// Named broadcast groups. A group exists while it has at least one member.
#[derive(Default)]
pub struct GroupMembership {
    groups: DashMap<GroupName, HashSet<ConnectionId>>,
}

impl GroupMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the connection was already a member.
    pub fn join(&self, group: GroupName, connection_id: ConnectionId) -> bool {
        self.groups.entry(group).or_default().insert(connection_id)
    }

    /// Returns false if the connection was not a member.
    pub fn leave(&self, group: &str, connection_id: &ConnectionId) -> bool {
        let left = match self.groups.get_mut(group) {
            Some(mut members) => members.remove(connection_id),
            None => return false,
        };
        self.groups.remove_if(group, |_, members| members.is_empty());
        left
    }

    /// Removes the connection from every group it belongs to and returns those groups.
    pub fn leave_all(&self, connection_id: &ConnectionId) -> Vec<GroupName> {
        // collected first: mutating while iterating would deadlock on the shard lock
        let joined = self
            .groups
            .iter()
            .filter(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        joined
            .into_iter()
            .filter(|group| self.leave(group, connection_id))
            .collect()
    }

    pub fn members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, group: &str, connection_id: &ConnectionId) -> bool {
        self.groups
            .get(group)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
