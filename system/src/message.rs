use crate::{CellId, ConnectionId, GroupName, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: ConnectionId,
    pub user_name: String,
    pub color: String,
    pub connected_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSelection {
    pub cell_id: CellId,
    pub user_id: ConnectionId,
    /// Snapshot of the owner's name at selection time.
    pub user_name: String,
    pub color: String,
    pub selected_at: Timestamp,
}

impl CellSelection {
    pub fn new(cell_id: CellId, owner: &Connection, selected_at: Timestamp) -> Self {
        Self {
            cell_id,
            user_id: owner.connection_id,
            user_name: owner.user_name.clone(),
            color: owner.color.clone(),
            selected_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicUpdate {
    pub counter: u64,
    pub sent_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: ConnectionId,
    pub user_name: String,
    pub color: String,
    pub text: String,
    pub sent_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNotice {
    pub group: GroupName,
    pub connection: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub group: GroupName,
    #[serde(flatten)]
    pub message: ChatMessage,
}

/// Reply to an `echo` command, sent to the caller only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoReply {
    pub data: String,
    pub processed_at: Timestamp,
}

/// Ingress: commands a client issues over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ClientCommand {
    SelectCell {
        #[serde(rename = "cellId")]
        cell_id: CellId,
    },
    DeselectCell,
    /// Releases a specific cell, only if the caller still owns it.
    ReleaseCell {
        #[serde(rename = "cellId")]
        cell_id: CellId,
    },
    SendMessage {
        text: String,
    },
    JoinGroup {
        group: GroupName,
    },
    LeaveGroup {
        group: GroupName,
    },
    SendToGroup {
        group: GroupName,
        text: String,
    },
    Echo {
        data: String,
    },
}

/// Egress: notifications pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum SystemEvent {
    SelfInfo(Connection),
    CurrentRoster(Vec<Connection>),
    CurrentCellState(Vec<CellSelection>),
    UserJoined(Connection),
    UserLeft(Connection),
    CellSelected(CellSelection),
    CellDeselected(CellId),
    PeriodicUpdate(PeriodicUpdate),
    MessageReceived(ChatMessage),
    GroupJoined(GroupNotice),
    GroupLeft(GroupNotice),
    GroupMessageReceived(GroupMessage),
    EchoReply(EchoReply),
}

impl SystemEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelfInfo(_) => "selfInfo",
            Self::CurrentRoster(_) => "currentRoster",
            Self::CurrentCellState(_) => "currentCellState",
            Self::UserJoined(_) => "userJoined",
            Self::UserLeft(_) => "userLeft",
            Self::CellSelected(_) => "cellSelected",
            Self::CellDeselected(_) => "cellDeselected",
            Self::PeriodicUpdate(_) => "periodicUpdate",
            Self::MessageReceived(_) => "messageReceived",
            Self::GroupJoined(_) => "groupJoined",
            Self::GroupLeft(_) => "groupLeft",
            Self::GroupMessageReceived(_) => "groupMessageReceived",
            Self::EchoReply(_) => "echoReply",
        }
    }
}
