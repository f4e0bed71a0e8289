//! Thread-safe handle to the bridge's outbound queue.

use marinelink_command_ledger::{CommandEnvelope, CommandPublisher, PublishError};
use tokio::sync::{mpsc, watch};
use tracing::warn;
use uuid::Uuid;

use crate::bridge::BridgeState;

/// Work handed to the bridge task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Publish { device_id: Uuid, envelope: CommandEnvelope },
    ClearRetained { device_id: Uuid },
}

/// Cloneable publish handle. Never blocks and never owns the connection.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Outbound>,
    state: watch::Receiver<BridgeState>,
}

impl BridgeHandle {
    pub(crate) fn new(tx: mpsc::Sender<Outbound>, state: watch::Receiver<BridgeState>) -> Self {
        Self { tx, state }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state.clone()
    }

    fn enqueue(&self, item: Outbound) -> Result<(), PublishError> {
        self.tx.try_send(item).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "outbound queue full",
                mpsc::error::TrySendError::Closed(_) => "bridge stopped",
            };
            warn!(reason, "Broker outbound dropped");
            PublishError::Unavailable(reason.to_string())
        })
    }
}

impl CommandPublisher for BridgeHandle {
    fn publish(&self, device_id: Uuid, envelope: &CommandEnvelope) -> Result<(), PublishError> {
        self.enqueue(Outbound::Publish {
            device_id,
            envelope: envelope.clone(),
        })
    }

    fn clear_retained(&self, device_id: Uuid) -> Result<(), PublishError> {
        self.enqueue(Outbound::ClearRetained { device_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marinelink_core::time::from_ms;

    fn envelope(id: i64) -> CommandEnvelope {
        CommandEnvelope {
            id,
            command_type: "channel.set".into(),
            payload_json: "{}".into(),
            created_at: from_ms(0),
            dequeued_at: None,
        }
    }

    #[test]
    fn test_publish_enqueues() {
        let (tx, mut rx) = mpsc::channel(4);
        let (_state_tx, state_rx) = watch::channel(BridgeState::Disconnected);
        let handle = BridgeHandle::new(tx, state_rx);
        let device = Uuid::new_v4();

        handle.publish(device, &envelope(1)).unwrap();
        handle.clear_retained(device).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Publish {
                device_id: device,
                envelope: envelope(1)
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::ClearRetained { device_id: device }
        );
        assert_eq!(handle.state(), BridgeState::Disconnected);
    }

    #[test]
    fn test_full_or_closed_queue_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        let (_state_tx, state_rx) = watch::channel(BridgeState::Disconnected);
        let handle = BridgeHandle::new(tx, state_rx);
        let device = Uuid::new_v4();

        handle.clear_retained(device).unwrap();
        assert!(matches!(
            handle.clear_retained(device),
            Err(PublishError::Unavailable(_))
        ));

        drop(rx);
        assert!(matches!(
            handle.publish(device, &envelope(2)),
            Err(PublishError::Unavailable(_))
        ));
    }
}
