use dashmap::DashMap;
use presence_system::{ConnectionId, DeliveryError, SystemEvent, Transport};
use tokio::sync::mpsc::UnboundedSender;

pub type ConnectionTx = UnboundedSender<SystemEvent>;

pub struct ConnectionTxStorage {
    connection_txs: DashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: DashMap::new(),
        }
    }

    pub fn insert(&self, connection_id: ConnectionId, tx: ConnectionTx) {
        if self.connection_txs.insert(connection_id, tx).is_some() {
            log::warn!("Replaced egress channel of {}", connection_id);
        }
    }

    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs
            .remove(connection_id)
            .map(|(_, tx)| tx)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connection_txs.is_empty()
    }
}

impl Default for ConnectionTxStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionTxStorage {
    fn send_to(&self, to: &ConnectionId, event: SystemEvent) -> Result<(), DeliveryError> {
        let tx = self
            .connection_txs
            .get(to)
            .ok_or(DeliveryError::UnknownRecipient(*to))?;
        tx.send(event).map_err(|_| DeliveryError::Closed(*to))
    }
}
