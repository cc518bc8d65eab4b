//! Event broadcasting to connected clients
//!
//! Fan-out is fire-and-forget: a committed ledger or tournament transition
//! broadcasts after the fact and can never be failed by a slow or absent
//! subscriber.

use crate::models::WsEvent;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type EventSender = broadcast::Sender<WsEvent>;
pub type EventReceiver = broadcast::Receiver<WsEvent>;

#[derive(Clone)]
pub struct WsConnection {
    pub id: Uuid,
    /// Authenticated user, when the client identified itself.
    pub user_id: Option<Uuid>,
}

pub struct EventBroadcaster {
    sender: EventSender,
    connections: DashMap<Uuid, WsConnection>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            connections: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn broadcast(&self, event: WsEvent) {
        let _ = self.sender.send(event);
    }

    pub fn add_connection(&self, conn: WsConnection) {
        self.connections.insert(conn.id, conn);
    }

    pub fn remove_connection(&self, id: &Uuid) {
        self.connections.remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connected user ids, for presence queries.
    pub fn online_users(&self) -> Vec<Uuid> {
        self.connections
            .iter()
            .filter_map(|c| c.user_id)
            .collect()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_registry() {
        let broadcaster = EventBroadcaster::new(16);
        assert_eq!(broadcaster.connection_count(), 0);

        let user = Uuid::new_v4();
        let conn_id = Uuid::new_v4();
        broadcaster.add_connection(WsConnection {
            id: conn_id,
            user_id: Some(user),
        });
        broadcaster.add_connection(WsConnection {
            id: Uuid::new_v4(),
            user_id: None,
        });

        assert_eq!(broadcaster.connection_count(), 2);
        assert_eq!(broadcaster.online_users(), vec![user]);

        broadcaster.remove_connection(&conn_id);
        assert_eq!(broadcaster.connection_count(), 1);
        assert!(broadcaster.online_users().is_empty());
    }

    #[test]
    fn test_broadcast_without_subscribers_is_fire_and_forget() {
        let broadcaster = EventBroadcaster::new(16);
        // Must not panic or error with zero receivers.
        broadcaster.broadcast(WsEvent::Ping);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = EventBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        broadcaster.broadcast(WsEvent::Pong);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, WsEvent::Pong));
    }
}
