//! In-process publish/subscribe index for live order updates. A connection
//! (a `/ws/orders` socket, one per client) subscribes under a `(actor_type,
//! actor_id)` key; publishing an order event fans it out to every key the
//! event is addressed to, each recipient getting exactly one copy.

use {
    database::types::{ActorType, OrderStatus},
    dashmap::DashMap,
    serde::Serialize,
    std::sync::Arc,
    tokio::sync::mpsc,
};

/// Market-wide signals broadcast to every merchant subscriber regardless of
/// which party the order belongs to.
const BROADCAST_EVENT_TYPES: &[&str] =
    &["order_created", "status_changed_to_accepted", "status_changed_to_cancelled", "status_changed_to_expired"];

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Subscribed { actor_type: ActorType, actor_id: uuid::Uuid },
    Ping,
    OrderEvent {
        event_type: String,
        order_id: uuid::Uuid,
        status: OrderStatus,
        minimal_status: &'static str,
        order_version: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_status: Option<OrderStatus>,
    },
}

/// Everything the fabric needs to know about an order event to compute its
/// recipient set; deliberately decoupled from `database::orders::Order` so
/// the fabric doesn't need a row, just the addressing fields.
pub struct OrderEventAddress {
    pub event_type: String,
    pub order_id: uuid::Uuid,
    pub status: OrderStatus,
    pub order_version: i64,
    pub previous_status: Option<OrderStatus>,
    pub user_id: uuid::Uuid,
    pub merchant_id: uuid::Uuid,
    pub buyer_merchant_id: Option<uuid::Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SubscriberKey(ActorType, uuid::Uuid);

fn merchant_wildcard(id: uuid::Uuid) -> SubscriberKey {
    SubscriberKey(ActorType::Merchant, id)
}

/// Cheap to clone; all clones share the same subscriber index.
#[derive(Clone, Default)]
pub struct SubscriptionFabric {
    subscribers: Arc<DashMap<SubscriberKey, Vec<mpsc::UnboundedSender<OutboundMessage>>>>,
}

impl SubscriptionFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection under `(actor_type, actor_id)` and returns
    /// the receiving half the caller's websocket write loop should drain.
    pub fn subscribe(
        &self,
        actor_type: ActorType,
        actor_id: uuid::Uuid,
    ) -> mpsc::UnboundedReceiver<OutboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(SubscriberKey(actor_type, actor_id)).or_default().push(tx);
        rx
    }

    /// Publishes an order event to every recipient it addresses. Closed
    /// senders are dropped lazily on next publish rather than eagerly swept,
    /// since send() already tells us when one has gone away.
    pub fn publish(&self, event: &OrderEventAddress) {
        let mut keys = vec![SubscriberKey(ActorType::User, event.user_id), merchant_wildcard(event.merchant_id)];
        if let Some(buyer) = event.buyer_merchant_id {
            keys.push(merchant_wildcard(buyer));
        }
        if BROADCAST_EVENT_TYPES.contains(&event.event_type.as_str()) {
            for entry in self.subscribers.iter() {
                if entry.key().0 == ActorType::Merchant {
                    keys.push(entry.key().clone());
                }
            }
        }
        keys.sort_by_key(|k| (k.0 as u8, k.1));
        keys.dedup();

        let message = OutboundMessage::OrderEvent {
            event_type: event.event_type.clone(),
            order_id: event.order_id,
            status: event.status,
            minimal_status: event.status.as_str(),
            order_version: event.order_version,
            previous_status: event.previous_status,
        };

        for key in keys {
            if let Some(mut senders) = self.subscribers.get_mut(&key) {
                senders.retain(|tx| tx.send(message.clone()).is_ok());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(event_type: &str, merchant_id: uuid::Uuid, buyer_merchant_id: Option<uuid::Uuid>) -> OrderEventAddress {
        OrderEventAddress {
            event_type: event_type.to_string(),
            order_id: uuid::Uuid::new_v4(),
            status: OrderStatus::Escrowed,
            order_version: 2,
            previous_status: Some(OrderStatus::Accepted),
            user_id: uuid::Uuid::new_v4(),
            merchant_id,
            buyer_merchant_id,
        }
    }

    #[test]
    fn delivers_exactly_once_to_each_addressed_party() {
        let fabric = SubscriptionFabric::new();
        let merchant_id = uuid::Uuid::new_v4();
        let mut rx = fabric.subscribe(ActorType::Merchant, merchant_id);

        let event = addr("status_changed_to_escrowed", merchant_id, None);
        fabric.publish(&event);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_event_reaches_every_merchant_subscriber() {
        let fabric = SubscriptionFabric::new();
        let (m1, m2, unrelated) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let mut rx1 = fabric.subscribe(ActorType::Merchant, m1);
        let mut rx2 = fabric.subscribe(ActorType::Merchant, m2);

        fabric.publish(&addr("order_created", unrelated, None));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn non_broadcast_event_does_not_reach_unrelated_merchants() {
        let fabric = SubscriptionFabric::new();
        let (owner, bystander) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let mut rx = fabric.subscribe(ActorType::Merchant, bystander);

        fabric.publish(&addr("status_changed_to_payment_sent", owner, None));

        assert!(rx.try_recv().is_err());
    }
}
