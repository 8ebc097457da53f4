//! Notification bus: frames publish typed notifications, collaborators
//! subscribe with a channel each.

use crate::domain::{ChangeKind, Flow, Link, Service};

use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ServicesSet(Vec<Arc<Service>>),
    FlowsAdded(Vec<Arc<Flow>>),
    LinkChanged(Arc<Link>, ChangeKind),
    ServiceChange(Arc<Service>, ChangeKind),
}

pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

#[derive(Debug, Default)]
pub struct NotificationBus {
    subscribers: Vec<mpsc::UnboundedSender<Notification>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Subscribers whose receiver is gone are dropped here.
    pub fn publish(&mut self, notification: Notification) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }
}
