//! Channel-backed `AlertSource` (§6 "a stream of alert records... a realtime
//! INSERT-notification abstraction is sufficient"). The webhook receiver and
//! persistence change-notification mechanism that would feed this are out of
//! scope (§1 Non-goals); this adapter is the boundary shim a concrete
//! notifier pushes into via [`ChannelAlertSource::sender`].

use crate::domain::alert::AlertRecord;
use crate::domain::ports::AlertSource;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};

pub struct ChannelAlertSource {
    tx: Sender<AlertRecord>,
    rx: Mutex<Option<Receiver<AlertRecord>>>,
}

impl ChannelAlertSource {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Handed to whatever process observes new alert rows (webhook receiver,
    /// polling loop over the store's change feed) so it can push records in
    /// creation order.
    pub fn sender(&self) -> Sender<AlertRecord> {
        self.tx.clone()
    }
}

impl Default for ChannelAlertSource {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl AlertSource for ChannelAlertSource {
    fn subscribe(&self) -> Receiver<AlertRecord> {
        self.rx
            .try_lock()
            .expect("subscribe called concurrently")
            .take()
            .expect("subscribe called more than once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::AlertAction;

    fn alert(id: &str) -> AlertRecord {
        AlertRecord {
            id: id.into(),
            timestamp: 0,
            symbol: "ES".into(),
            action: AlertAction::Buy,
            quantity_override: None,
            strategy_tag: None,
            sfx_levels: None,
            vpvr: None,
            confirmation_score: None,
        }
    }

    #[tokio::test]
    async fn alerts_arrive_in_creation_order() {
        let source = ChannelAlertSource::default();
        let mut rx = source.subscribe();
        let tx = source.sender();
        tx.send(alert("a1")).await.unwrap();
        tx.send(alert("a2")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id, "a1");
        assert_eq!(rx.recv().await.unwrap().id, "a2");
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn subscribe_cannot_be_called_twice() {
        let source = ChannelAlertSource::default();
        let _first = source.subscribe();
        let _second = source.subscribe();
    }
}
