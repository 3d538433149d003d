use crate::{ConnectionId, DeliveryError, SystemEvent};
use std::sync::Arc;

/// Per-connection delivery implemented by the transport.
///
/// `send_to` must not block: implementations queue the event and return.
pub trait Transport: Send + Sync + 'static {
    fn send_to(&self, to: &ConnectionId, event: SystemEvent) -> Result<(), DeliveryError>;
}

/// Fan-out over a recipient list copied out of the registry beforehand.
/// Every send is independent; failures are logged and skipped.
pub struct BroadcastGateway<T> {
    transport: Arc<T>,
}

impl<T> Clone for BroadcastGateway<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> BroadcastGateway<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn to_one(&self, to: &ConnectionId, event: SystemEvent) -> bool {
        log::debug!("Egress {} -> {}", event.name(), to);
        match self.transport.send_to(to, event) {
            Ok(()) => true,
            Err(error) => {
                log::warn!("Dropping event for unreachable recipient: {}", error);
                false
            }
        }
    }

    /// Returns how many recipients accepted the event.
    pub fn to_others(
        &self,
        recipients: &[ConnectionId],
        except: &ConnectionId,
        event: &SystemEvent,
    ) -> usize {
        recipients
            .iter()
            .filter(|recipient| *recipient != except)
            .filter(|recipient| self.to_one(recipient, event.clone()))
            .count()
    }

    pub fn to_all(&self, recipients: &[ConnectionId], event: &SystemEvent) -> usize {
        recipients
            .iter()
            .filter(|recipient| self.to_one(recipient, event.clone()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FlakyTransport {
        unreachable: ConnectionId,
        delivered: Mutex<Vec<ConnectionId>>,
    }

    impl Transport for FlakyTransport {
        fn send_to(&self, to: &ConnectionId, _: SystemEvent) -> Result<(), DeliveryError> {
            if *to == self.unreachable {
                return Err(DeliveryError::Closed(*to));
            }
            self.delivered.lock().expect("").push(*to);
            Ok(())
        }
    }

    #[test]
    fn it_keeps_broadcasting_past_a_failed_recipient() {
        let ids = (0..4).map(|_| Uuid::new_v4()).collect::<Vec<_>>();
        let transport = Arc::new(FlakyTransport {
            unreachable: ids[1],
            delivered: Mutex::new(Vec::new()),
        });
        let gateway = BroadcastGateway::new(transport.clone());

        let event = SystemEvent::CellDeselected("r1c1".into());
        assert_eq!(gateway.to_all(&ids, &event), 3);
        assert_eq!(
            *transport.delivered.lock().expect(""),
            vec![ids[0], ids[2], ids[3]]
        );
    }

    #[test]
    fn it_skips_the_caller_when_sending_to_others() {
        let ids = (0..3).map(|_| Uuid::new_v4()).collect::<Vec<_>>();
        let transport = Arc::new(FlakyTransport {
            unreachable: Uuid::new_v4(),
            delivered: Mutex::new(Vec::new()),
        });
        let gateway = BroadcastGateway::new(transport.clone());

        let event = SystemEvent::CellDeselected("r1c1".into());
        assert_eq!(gateway.to_others(&ids, &ids[0], &event), 2);
        assert!(!transport.delivered.lock().expect("").contains(&ids[0]));
    }
}
