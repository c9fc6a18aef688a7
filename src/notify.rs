use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for booking changes, one channel per product.
#[derive(Default)]
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to notifications for a product. Creates the channel if needed.
    pub fn subscribe(&self, product_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(product_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.product_id()) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn remove(&self, product_id: &Ulid) {
        self.channels.remove(product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductKind;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let pid = Ulid::new();
        let mut rx = hub.subscribe(pid);

        let event = Event::ProductRegistered {
            id: pid,
            kind: ProductKind::DatedCapacity,
        };
        hub.send(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn other_products_not_delivered() {
        let hub = NotifyHub::new();
        let mine = Ulid::new();
        let mut rx = hub.subscribe(mine);
        hub.send(&Event::BookingDeleted {
            id: Ulid::new(),
            product_id: Ulid::new(),
        });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let pid = Ulid::new();
        hub.send(&Event::BookingDeleted {
            id: Ulid::new(),
            product_id: pid,
        });
        hub.remove(&pid);
    }
}
