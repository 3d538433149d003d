use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use presence_system::{ConnectionId, Hub, HubConfig};

use crate::connection::ConnectionCommand;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::session::Session;

pub type ServerHub = Hub<ConnectionTxStorage>;
pub type SessionTx = UnboundedSender<ConnectionCommand>;

#[derive(Clone)]
pub struct Server {
    hub: Arc<ServerHub>,
}

impl Server {
    pub fn new(config: HubConfig) -> Self {
        let connections = Arc::new(ConnectionTxStorage::new());
        Self {
            hub: Arc::new(Hub::new(connections, config)),
        }
    }

    pub fn hub(&self) -> &Arc<ServerHub> {
        &self.hub
    }

    /// Registers the egress channel of a new connection and spawns the task
    /// that feeds its commands to the hub one at a time.
    pub fn spawn_session(&self, connection_id: ConnectionId, tx: ConnectionTx) -> SessionTx {
        self.hub.transport().insert(connection_id, tx);

        let (session_tx, session_rx) = unbounded_channel::<ConnectionCommand>();
        let session = Session::new(connection_id, self.hub.clone());
        tokio::spawn(session.run(session_rx));

        session_tx
    }
}
