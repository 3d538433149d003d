use crate::config::DEFAULT_PALETTE;
use crate::{now_millis, Connection, ConnectionId, HubError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Registration {
    arrival: u64,
    connection: Connection,
}

/// Live connections and the identity each one was given at connect time.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Registration>,
    arrivals: AtomicU64,
    palette: Vec<String>,
}

impl ConnectionRegistry {
    pub fn new(palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            palette
        };
        Self {
            connections: DashMap::new(),
            arrivals: AtomicU64::new(0),
            palette,
        }
    }

    pub fn register(&self, connection_id: ConnectionId) -> Result<Connection, HubError> {
        match self.connections.entry(connection_id) {
            Entry::Occupied(_) => Err(HubError::DuplicateConnection(connection_id)),
            Entry::Vacant(vacant) => {
                // counted under the shard lock so a rejected duplicate never consumes a slot
                let arrival = self.arrivals.fetch_add(1, Ordering::SeqCst);
                let connection = Connection {
                    connection_id,
                    user_name: format!("User{}", arrival + 1),
                    color: self.color_for(arrival),
                    connected_at: now_millis(),
                };
                vacant.insert(Registration {
                    arrival,
                    connection: connection.clone(),
                });
                Ok(connection)
            }
        }
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections
            .get(connection_id)
            .map(|registration| registration.connection.clone())
    }

    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections
            .remove(connection_id)
            .map(|(_, registration)| registration.connection)
    }

    /// Owned copy of the roster in arrival order.
    pub fn snapshot(&self) -> Vec<Connection> {
        let mut registrations = self
            .connections
            .iter()
            .map(|entry| (entry.arrival, entry.connection.clone()))
            .collect::<Vec<_>>();
        registrations.sort_by_key(|(arrival, _)| *arrival);
        registrations
            .into_iter()
            .map(|(_, connection)| connection)
            .collect()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn color_for(&self, arrival: u64) -> String {
        let index = (arrival % self.palette.len() as u64) as usize;
        self.palette[index].clone()
    }
}
