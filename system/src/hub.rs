use crate::{
    now_millis, BroadcastGateway, CellId, CellOwnershipTable, CellSelection, ChatMessage,
    ClientCommand, Connection, ConnectionId, ConnectionRegistry, EchoReply, GroupMembership,
    GroupMessage, GroupName, GroupNotice, HubConfig, HubError, PeriodicTaskManager, SystemEvent,
    Transport,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Active,
    Disconnecting,
    Gone,
}

/// Session lifecycle controller.
///
/// Owns the registry, the cell table, the groups and the periodic tasks, and emits the
/// notifications each mutation implies. Events of a single connection are
/// expected one at a time; different connections may call in concurrently.
pub struct Hub<T> {
    registry: ConnectionRegistry,
    cells: CellOwnershipTable,
    groups: GroupMembership,
    tasks: PeriodicTaskManager<T>,
    gateway: BroadcastGateway<T>,
    phases: DashMap<ConnectionId, SessionPhase>,
}

impl<T: Transport> Hub<T> {
    pub fn new(transport: Arc<T>, config: HubConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.palette),
            cells: CellOwnershipTable::new(),
            groups: GroupMembership::new(),
            tasks: PeriodicTaskManager::new(transport.clone(), config.tick_interval),
            gateway: BroadcastGateway::new(transport),
            phases: DashMap::new(),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        self.gateway.transport()
    }

    pub fn phase(&self, connection_id: &ConnectionId) -> SessionPhase {
        self.phases
            .get(connection_id)
            .map(|phase| *phase)
            .unwrap_or(SessionPhase::Gone)
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.registry.lookup(connection_id)
    }

    pub fn roster(&self) -> Vec<Connection> {
        self.registry.snapshot()
    }

    pub fn cell_state(&self) -> Vec<CellSelection> {
        self.cells.snapshot()
    }

    pub fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups.members(group)
    }

    pub fn is_pushing(&self, connection_id: &ConnectionId) -> bool {
        self.tasks.is_running(connection_id)
    }

    /// Must be called from within a tokio runtime; starts the connection's push loop.
    pub fn connect(&self, connection_id: ConnectionId) -> Result<Connection, HubError> {
        match self.phases.entry(connection_id) {
            Entry::Occupied(_) => {
                log::warn!("Rejecting second connect for {}", connection_id);
                return Err(HubError::DuplicateConnection(connection_id));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SessionPhase::Connecting);
            }
        }

        let connection = match self.registry.register(connection_id) {
            Ok(connection) => connection,
            Err(error) => {
                self.phases.remove(&connection_id);
                log::warn!("Connect failed: {}", error);
                return Err(error);
            }
        };

        let roster = self.registry.snapshot();
        let recipients = ids_of(&roster);
        log::info!(
            "{} connected with color {} ({} online)",
            connection.user_name,
            connection.color,
            roster.len()
        );

        self.gateway
            .to_one(&connection_id, SystemEvent::SelfInfo(connection.clone()));
        self.gateway
            .to_one(&connection_id, SystemEvent::CurrentRoster(roster.clone()));
        self.gateway.to_one(
            &connection_id,
            SystemEvent::CurrentCellState(self.cells.snapshot()),
        );
        self.gateway.to_others(
            &recipients,
            &connection_id,
            &SystemEvent::UserJoined(connection.clone()),
        );
        self.gateway
            .to_all(&recipients, &SystemEvent::CurrentRoster(roster));

        if let Err(error) = self.tasks.start(connection_id) {
            log::warn!("{}", error);
        }
        self.phases.insert(connection_id, SessionPhase::Active);
        Ok(connection)
    }

    /// Runs the whole cleanup sequence before returning. Each step runs even if
    /// an earlier one failed. Returns the removed connection, or `None` if the
    /// connection was not active.
    pub async fn disconnect(
        &self,
        connection_id: &ConnectionId,
        cause: Option<&str>,
    ) -> Option<Connection> {
        let accepted = match self.phases.get_mut(connection_id) {
            Some(mut phase) if *phase == SessionPhase::Active => {
                *phase = SessionPhase::Disconnecting;
                true
            }
            _ => false,
        };
        if !accepted {
            log::warn!("Ignoring disconnect of inactive connection {}", connection_id);
            return None;
        }
        if let Some(cause) = cause {
            log::info!("Connection {} closing: {}", connection_id, cause);
        }

        if !self.tasks.stop(connection_id).await {
            log::warn!("No periodic task was tracked for {}", connection_id);
        }

        if let Some(cell_id) = self.cells.deselect(connection_id) {
            log::debug!("Releasing cell {} held by {}", cell_id, connection_id);
            let recipients = self.registry.connection_ids();
            self.gateway
                .to_all(&recipients, &SystemEvent::CellDeselected(cell_id));
        }

        let departing = self.registry.lookup(connection_id);
        for group in self.groups.leave_all(connection_id) {
            log::debug!("Dropping {} from group {}", connection_id, group);
            if let Some(connection) = &departing {
                let members = self.groups.members(&group);
                self.gateway.to_all(
                    &members,
                    &SystemEvent::GroupLeft(GroupNotice {
                        group,
                        connection: connection.clone(),
                    }),
                );
            }
        }

        let removed = self.registry.remove(connection_id);
        match &removed {
            Some(connection) => {
                let roster = self.registry.snapshot();
                let recipients = ids_of(&roster);
                log::info!(
                    "{} disconnected ({} online)",
                    connection.user_name,
                    roster.len()
                );
                self.gateway
                    .to_all(&recipients, &SystemEvent::UserLeft(connection.clone()));
                self.gateway
                    .to_all(&recipients, &SystemEvent::CurrentRoster(roster));
            }
            None => log::warn!("Connection {} vanished from the registry", connection_id),
        }

        self.phases.remove(connection_id);
        removed
    }

    pub fn handle_command(
        &self,
        connection_id: &ConnectionId,
        command: ClientCommand,
    ) -> Result<(), HubError> {
        match command {
            ClientCommand::SelectCell { cell_id } => {
                self.select_cell(connection_id, cell_id).map(|_| ())
            }
            ClientCommand::DeselectCell => self.deselect_cell(connection_id).map(|_| ()),
            ClientCommand::ReleaseCell { cell_id } => {
                self.release_cell(connection_id, &cell_id).map(|_| ())
            }
            ClientCommand::SendMessage { text } => {
                self.send_message(connection_id, text).map(|_| ())
            }
            ClientCommand::JoinGroup { group } => {
                self.join_group(connection_id, group).map(|_| ())
            }
            ClientCommand::LeaveGroup { group } => {
                self.leave_group(connection_id, group).map(|_| ())
            }
            ClientCommand::SendToGroup { group, text } => self
                .send_to_group(connection_id, group, text)
                .map(|_| ()),
            ClientCommand::Echo { data } => self.echo(connection_id, data).map(|_| ()),
        }
    }

    pub fn select_cell(
        &self,
        connection_id: &ConnectionId,
        cell_id: CellId,
    ) -> Result<CellSelection, HubError> {
        let connection = self.active_connection(connection_id)?;
        let outcome = self.cells.select(cell_id, &connection);
        log::debug!(
            "{} selected cell {}",
            connection.user_name,
            outcome.selection.cell_id
        );

        let recipients = self.registry.connection_ids();
        if let Some(released) = outcome.released {
            self.gateway
                .to_all(&recipients, &SystemEvent::CellDeselected(released));
        }
        self.gateway.to_all(
            &recipients,
            &SystemEvent::CellSelected(outcome.selection.clone()),
        );
        Ok(outcome.selection)
    }

    pub fn deselect_cell(&self, connection_id: &ConnectionId) -> Result<Option<CellId>, HubError> {
        let connection = self.active_connection(connection_id)?;
        let released = self.cells.deselect(connection_id);
        if let Some(cell_id) = &released {
            log::debug!("{} deselected cell {}", connection.user_name, cell_id);
            let recipients = self.registry.connection_ids();
            self.gateway
                .to_all(&recipients, &SystemEvent::CellDeselected(cell_id.clone()));
        }
        Ok(released)
    }

    /// Releases `cell_id` only if the caller still owns it.
    pub fn release_cell(
        &self,
        connection_id: &ConnectionId,
        cell_id: &CellId,
    ) -> Result<bool, HubError> {
        let connection = self.active_connection(connection_id)?;
        match self.cells.release_cell(cell_id, connection_id) {
            Some(selection) => {
                log::debug!("{} released cell {}", connection.user_name, cell_id);
                let recipients = self.registry.connection_ids();
                self.gateway
                    .to_all(&recipients, &SystemEvent::CellDeselected(selection.cell_id));
                Ok(true)
            }
            None => {
                log::debug!(
                    "{} tried to release cell {} it does not hold",
                    connection.user_name,
                    cell_id
                );
                Ok(false)
            }
        }
    }

    pub fn send_message(
        &self,
        connection_id: &ConnectionId,
        text: String,
    ) -> Result<ChatMessage, HubError> {
        let connection = self.active_connection(connection_id)?;
        let message = chat_message(connection, text);
        let recipients = self.registry.connection_ids();
        self.gateway
            .to_all(&recipients, &SystemEvent::MessageReceived(message.clone()));
        Ok(message)
    }

    /// Adds the caller to `group` and announces it to every member, the caller
    /// included. Returns false, without notifying, if it was already a member.
    pub fn join_group(
        &self,
        connection_id: &ConnectionId,
        group: GroupName,
    ) -> Result<bool, HubError> {
        let connection = self.active_connection(connection_id)?;
        if !self.groups.join(group.clone(), *connection_id) {
            log::debug!("{} is already in group {}", connection.user_name, group);
            return Ok(false);
        }
        log::debug!("{} joined group {}", connection.user_name, group);
        let members = self.groups.members(&group);
        self.gateway
            .to_all(&members, &SystemEvent::GroupJoined(GroupNotice { group, connection }));
        Ok(true)
    }

    /// Removes the caller from `group` and tells the remaining members.
    pub fn leave_group(
        &self,
        connection_id: &ConnectionId,
        group: GroupName,
    ) -> Result<bool, HubError> {
        let connection = self.active_connection(connection_id)?;
        if !self.groups.leave(&group, connection_id) {
            log::debug!("{} is not in group {}", connection.user_name, group);
            return Ok(false);
        }
        log::debug!("{} left group {}", connection.user_name, group);
        let members = self.groups.members(&group);
        self.gateway
            .to_all(&members, &SystemEvent::GroupLeft(GroupNotice { group, connection }));
        Ok(true)
    }

    /// Chat broadcast to the members of `group` only. The sender need not be a
    /// member; an unknown group has no recipients.
    pub fn send_to_group(
        &self,
        connection_id: &ConnectionId,
        group: GroupName,
        text: String,
    ) -> Result<usize, HubError> {
        let connection = self.active_connection(connection_id)?;
        let members = self.groups.members(&group);
        if members.is_empty() {
            log::debug!("Group {} has no members", group);
        }
        let event = SystemEvent::GroupMessageReceived(GroupMessage {
            group,
            message: chat_message(connection, text),
        });
        Ok(self.gateway.to_all(&members, &event))
    }

    pub fn echo(&self, connection_id: &ConnectionId, data: String) -> Result<(), HubError> {
        self.active_connection(connection_id)?;
        self.gateway.to_one(
            connection_id,
            SystemEvent::EchoReply(EchoReply {
                data,
                processed_at: now_millis(),
            }),
        );
        Ok(())
    }

    fn active_connection(&self, connection_id: &ConnectionId) -> Result<Connection, HubError> {
        match self.phase(connection_id) {
            SessionPhase::Active => self
                .registry
                .lookup(connection_id)
                .ok_or(HubError::UnknownConnection(*connection_id)),
            SessionPhase::Gone => Err(HubError::UnknownConnection(*connection_id)),
            _ => Err(HubError::NotActive(*connection_id)),
        }
    }
}

fn chat_message(sender: Connection, text: String) -> ChatMessage {
    ChatMessage {
        user_id: sender.connection_id,
        user_name: sender.user_name,
        color: sender.color,
        text,
        sent_at: now_millis(),
    }
}

fn ids_of(roster: &[Connection]) -> Vec<ConnectionId> {
    roster
        .iter()
        .map(|connection| connection.connection_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeliveryError;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(ConnectionId, SystemEvent)>>,
    }

    impl Transport for Outbox {
        fn send_to(&self, to: &ConnectionId, event: SystemEvent) -> Result<(), DeliveryError> {
            if !matches!(event, SystemEvent::PeriodicUpdate(_)) {
                self.sent.lock().expect("").push((*to, event));
            }
            Ok(())
        }
    }

    fn hub() -> (Hub<Outbox>, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let config = HubConfig::default().with_tick_interval(Duration::from_secs(3600));
        (Hub::new(outbox.clone(), config), outbox)
    }

    #[tokio::test]
    async fn it_moves_through_phases() {
        let (hub, _) = hub();
        let id = Uuid::new_v4();
        assert_eq!(hub.phase(&id), SessionPhase::Gone);

        hub.connect(id).expect("");
        assert_eq!(hub.phase(&id), SessionPhase::Active);
        assert!(hub.is_pushing(&id));

        hub.disconnect(&id, None).await.expect("");
        assert_eq!(hub.phase(&id), SessionPhase::Gone);
        assert!(!hub.is_pushing(&id));
        assert!(hub.connection(&id).is_none());
    }

    #[tokio::test]
    async fn it_rejects_duplicate_connect_and_commands_after_leaving() {
        let (hub, outbox) = hub();
        let id = Uuid::new_v4();
        hub.connect(id).expect("");
        let sent_before = outbox.sent.lock().expect("").len();

        assert_eq!(hub.connect(id), Err(HubError::DuplicateConnection(id)));
        assert_eq!(outbox.sent.lock().expect("").len(), sent_before);

        hub.disconnect(&id, Some("closed by client")).await.expect("");
        assert!(hub.disconnect(&id, None).await.is_none());
        assert_eq!(
            hub.select_cell(&id, "r1c1".into()),
            Err(HubError::UnknownConnection(id))
        );
        assert!(hub.cell_state().is_empty());
    }

    #[tokio::test]
    async fn it_broadcasts_chat_messages_with_sender_identity() {
        let (hub, outbox) = hub();
        let a = hub.connect(Uuid::new_v4()).expect("");
        let b = hub.connect(Uuid::new_v4()).expect("");
        outbox.sent.lock().expect("").clear();

        hub.handle_command(
            &b.connection_id,
            ClientCommand::SendMessage {
                text: "hello".into(),
            },
        )
        .expect("");

        let sent = outbox.sent.lock().expect("");
        assert_eq!(sent.len(), 2);
        for (to, event) in sent.iter() {
            assert!(*to == a.connection_id || *to == b.connection_id);
            match event {
                SystemEvent::MessageReceived(message) => {
                    assert_eq!(message.user_name, b.user_name);
                    assert_eq!(message.text, "hello");
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn it_releases_only_owned_cells() {
        let (hub, outbox) = hub();
        let a = hub.connect(Uuid::new_v4()).expect("");
        let b = hub.connect(Uuid::new_v4()).expect("");
        hub.select_cell(&a.connection_id, "r1c1".into()).expect("");
        outbox.sent.lock().expect("").clear();

        assert_eq!(hub.release_cell(&b.connection_id, &"r1c1".to_string()), Ok(false));
        assert!(outbox.sent.lock().expect("").is_empty());

        assert_eq!(hub.release_cell(&a.connection_id, &"r1c1".to_string()), Ok(true));
        let sent = outbox.sent.lock().expect("");
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|(_, event)| *event == SystemEvent::CellDeselected("r1c1".into())));
    }

    #[tokio::test]
    async fn it_rejects_commands_while_not_active() {
        let (hub, outbox) = hub();
        let id = Uuid::new_v4();
        hub.connect(id).expect("");
        outbox.sent.lock().expect("").clear();

        for phase in [SessionPhase::Connecting, SessionPhase::Disconnecting].iter() {
            hub.phases.insert(id, *phase);
            assert_eq!(
                hub.select_cell(&id, "r1c1".into()),
                Err(HubError::NotActive(id))
            );
            assert_eq!(
                hub.handle_command(
                    &id,
                    ClientCommand::JoinGroup {
                        group: "team".into()
                    }
                ),
                Err(HubError::NotActive(id))
            );
            // a disconnect already in flight is not started twice
            assert!(hub.disconnect(&id, None).await.is_none());
        }
        assert!(hub.cell_state().is_empty());
        assert!(hub.group_members("team").is_empty());
        assert!(outbox.sent.lock().expect("").is_empty());

        hub.phases.insert(id, SessionPhase::Active);
        hub.disconnect(&id, None).await.expect("");
    }

    #[tokio::test]
    async fn it_echoes_to_the_caller_only() {
        let (hub, outbox) = hub();
        let a = hub.connect(Uuid::new_v4()).expect("");
        hub.connect(Uuid::new_v4()).expect("");
        outbox.sent.lock().expect("").clear();

        hub.handle_command(
            &a.connection_id,
            ClientCommand::Echo {
                data: "ping".into(),
            },
        )
        .expect("");

        let sent = outbox.sent.lock().expect("");
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            (to, SystemEvent::EchoReply(reply)) => {
                assert_eq!(*to, a.connection_id);
                assert_eq!(reply.data, "ping");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_ignores_repeated_group_joins_and_stray_leaves() {
        let (hub, outbox) = hub();
        let a = hub.connect(Uuid::new_v4()).expect("");
        outbox.sent.lock().expect("").clear();

        assert_eq!(hub.join_group(&a.connection_id, "team".into()), Ok(true));
        assert_eq!(hub.join_group(&a.connection_id, "team".into()), Ok(false));
        assert_eq!(hub.leave_group(&a.connection_id, "other".into()), Ok(false));
        assert_eq!(outbox.sent.lock().expect("").len(), 1);

        assert_eq!(hub.leave_group(&a.connection_id, "team".into()), Ok(true));
        assert!(hub.group_members("team").is_empty());
        // the leaver is no longer a member, so nobody is told
        assert_eq!(outbox.sent.lock().expect("").len(), 1);
    }
}
