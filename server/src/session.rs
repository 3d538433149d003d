use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use presence_system::ConnectionId;

use crate::connection::ConnectionCommand;
use crate::server::ServerHub;

pub struct Session {
    connection_id: ConnectionId,
    hub: Arc<ServerHub>,
}

impl Session {
    pub fn new(connection_id: ConnectionId, hub: Arc<ServerHub>) -> Self {
        Self { connection_id, hub }
    }

    /// Processes the connection's commands in arrival order. Cleanup runs when
    /// a disconnect arrives or the command channel closes, and the egress
    /// channel is dropped only after the hub has finished it.
    pub async fn run(self, mut rx: UnboundedReceiver<ConnectionCommand>) {
        let mut cause = Some("session channel closed".to_string());

        while let Some(command) = rx.recv().await {
            match command {
                ConnectionCommand::Connect => {
                    if let Err(error) = self.hub.connect(self.connection_id) {
                        log::warn!("{}", error);
                        cause = Some(error.to_string());
                        break;
                    }
                }
                ConnectionCommand::Client(command) => {
                    if let Err(error) = self.hub.handle_command(&self.connection_id, command) {
                        log::warn!("Rejected command: {}", error);
                    }
                }
                ConnectionCommand::Disconnect { cause: reason } => {
                    cause = reason;
                    break;
                }
            }
        }

        self.hub
            .disconnect(&self.connection_id, cause.as_deref())
            .await;
        self.hub.transport().remove(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;
    use presence_system::uuid::Uuid;
    use presence_system::{ClientCommand, HubConfig, SystemEvent};
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn server() -> Server {
        Server::new(HubConfig::default().with_tick_interval(Duration::from_secs(3600)))
    }

    async fn drain(rx: &mut UnboundedReceiver<SystemEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            if !matches!(event, SystemEvent::PeriodicUpdate(_)) {
                names.push(event.name());
            }
        }
        names
    }

    #[tokio::test]
    async fn it_processes_commands_in_order_and_cleans_up() {
        let server = server();
        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = unbounded_channel();

        let session_tx = server.spawn_session(connection_id, tx);
        session_tx.send(ConnectionCommand::Connect).expect("");
        session_tx
            .send(ConnectionCommand::Client(ClientCommand::SelectCell {
                cell_id: "r1c1".into(),
            }))
            .expect("");
        session_tx
            .send(ConnectionCommand::Client(ClientCommand::SelectCell {
                cell_id: "r1c2".into(),
            }))
            .expect("");
        session_tx
            .send(ConnectionCommand::Disconnect {
                cause: Some("bye".into()),
            })
            .expect("");

        // the egress channel closes once cleanup has finished
        assert_eq!(
            drain(&mut rx).await,
            vec![
                "selfInfo",
                "currentRoster",
                "currentCellState",
                "currentRoster",
                "cellSelected",
                "cellDeselected",
                "cellSelected",
                "cellDeselected",
            ]
        );
        assert!(server.hub().roster().is_empty());
        assert!(server.hub().cell_state().is_empty());
        assert!(server.hub().transport().is_empty());
    }

    #[tokio::test]
    async fn it_cleans_up_when_the_connection_drops_without_disconnect() {
        let server = server();
        let (a_tx, mut a_rx) = unbounded_channel();
        let (b_tx, mut b_rx) = unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let a_session = server.spawn_session(a, a_tx);
        a_session.send(ConnectionCommand::Connect).expect("");
        assert!(matches!(a_rx.recv().await, Some(SystemEvent::SelfInfo(_))));

        let b_session = server.spawn_session(b, b_tx);
        b_session.send(ConnectionCommand::Connect).expect("");
        b_session
            .send(ConnectionCommand::Client(ClientCommand::SelectCell {
                cell_id: "x".into(),
            }))
            .expect("");

        drop(b_session);
        drain(&mut b_rx).await;

        assert_eq!(server.hub().roster().len(), 1);
        assert!(server.hub().cell_state().is_empty());

        drop(a_session);
        let seen_by_a = drain(&mut a_rx).await;
        assert!(seen_by_a.contains(&"userJoined"));
        assert!(seen_by_a.contains(&"userLeft"));
        assert!(server.hub().roster().is_empty());
    }
}
