use crate::{now_millis, ConnectionId, HubError, PeriodicUpdate, SystemEvent, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// One push loop per connection, keyed by connection id.
/// `start` inserts a handle exactly once and `stop` removes it exactly once.
pub struct PeriodicTaskManager<T> {
    transport: Arc<T>,
    period: Duration,
    tasks: DashMap<ConnectionId, PeriodicTask>,
}

impl<T: Transport> PeriodicTaskManager<T> {
    pub fn new(transport: Arc<T>, period: Duration) -> Self {
        Self {
            transport,
            period: period.max(MIN_PERIOD),
            tasks: DashMap::new(),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&self, connection_id: ConnectionId) -> Result<(), HubError> {
        match self.tasks.entry(connection_id) {
            Entry::Occupied(_) => Err(HubError::TaskAlreadyRunning(connection_id)),
            Entry::Vacant(vacant) => {
                let token = CancellationToken::new();
                let handle = tokio::spawn(push_loop(
                    connection_id,
                    self.transport.clone(),
                    self.period,
                    token.clone(),
                ));
                vacant.insert(PeriodicTask { token, handle });
                Ok(())
            }
        }
    }

    /// Cancels the loop and waits for it to exit. Returns false if no task was tracked.
    pub async fn stop(&self, connection_id: &ConnectionId) -> bool {
        let task = match self.tasks.remove(connection_id) {
            Some((_, task)) => task,
            None => return false,
        };
        task.token.cancel();
        if let Err(error) = task.handle.await {
            log::warn!("Periodic task for {} did not exit cleanly: {}", connection_id, error);
        }
        true
    }

    pub fn is_running(&self, connection_id: &ConnectionId) -> bool {
        self.tasks
            .get(connection_id)
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

async fn push_loop<T: Transport>(
    connection_id: ConnectionId,
    transport: Arc<T>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut counter: u64 = 1;

    log::debug!("Periodic push started for {}", connection_id);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::debug!("Periodic push cancelled for {}", connection_id);
                break;
            }
            _ = ticker.tick() => {
                let event = SystemEvent::PeriodicUpdate(PeriodicUpdate {
                    counter,
                    sent_at: now_millis(),
                });
                if let Err(error) = transport.send_to(&connection_id, event) {
                    log::warn!("Periodic push for {} stopped: {}", connection_id, error);
                    break;
                }
                log::debug!("Periodic push #{} sent to {}", counter, connection_id);
                counter += 1;
            }
        }
    }
}
