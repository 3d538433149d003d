use crate::ConnectionId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} is not active")]
    NotActive(ConnectionId),
    #[error("periodic task for connection {0} is already running")]
    TaskAlreadyRunning(ConnectionId),
}

/// Failure to hand an event to a single recipient.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no transport channel for connection {0}")]
    UnknownRecipient(ConnectionId),
    #[error("transport channel for connection {0} is closed")]
    Closed(ConnectionId),
}
