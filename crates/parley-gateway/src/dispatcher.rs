use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Hard cap on concurrent announced users. An announce past this is dropped
/// without any signal back to the client.
pub const MAX_ONLINE: usize = 4;

/// One broadcast payload. `exclude` names a connection that must not relay
/// the event to its client; typing events skip their sender.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub event: GatewayEvent,
    pub exclude: Option<Uuid>,
}

/// Owns the presence registry and fans events out to every connection.
/// Constructed once in main and cloned into handlers and connection loops.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<Outbound>,

    /// Announced users: username -> owning connection.
    /// Bounded by MAX_ONLINE, so linear scans are fine.
    online: RwLock<HashMap<String, Uuid>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to outbound events. Each connection loop holds one receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Fan an event out to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(Outbound { event, exclude: None });
    }

    fn broadcast_except(&self, conn_id: Uuid, event: GatewayEvent) {
        let _ = self
            .inner
            .broadcast_tx
            .send(Outbound { event, exclude: Some(conn_id) });
    }

    /// Handle a userOnline announce. Returns whether the entry was accepted;
    /// a full registry drops the request and broadcasts nothing.
    pub async fn announce(&self, username: &str, conn_id: Uuid) -> bool {
        let roster = {
            let mut online = self.inner.online.write().await;
            if online.len() >= MAX_ONLINE {
                return false;
            }
            online.insert(username.to_owned(), conn_id);
            sorted_names(&online)
        };
        self.broadcast(GatewayEvent::UpdateOnline(roster));
        true
    }

    /// Relay a typing notice to everyone but the sender. No registry check:
    /// un-announced connections may send these too.
    pub fn typing(&self, conn_id: Uuid, username: String) {
        self.broadcast_except(conn_id, GatewayEvent::UserTyping { username });
    }

    /// Connection went away. Disconnects carry no username, so scan for the
    /// entry owned by this connection; silent if it never announced.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let roster = {
            let mut online = self.inner.online.write().await;
            let owner = online
                .iter()
                .find(|(_, id)| **id == conn_id)
                .map(|(name, _)| name.clone());
            match owner {
                Some(name) => {
                    online.remove(&name);
                    Some(sorted_names(&online))
                }
                None => None,
            }
        };
        if let Some(roster) = roster {
            self.broadcast(GatewayEvent::UpdateOnline(roster));
        }
    }

    /// Current announced usernames, sorted.
    pub async fn online_users(&self) -> Vec<String> {
        sorted_names(&*self.inner.online.read().await)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_names(online: &HashMap<String, Uuid>) -> Vec<String> {
    let mut names: Vec<String> = online.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn announce_broadcasts_full_roster() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        assert!(dispatcher.announce("alice", Uuid::new_v4()).await);
        assert!(dispatcher.announce("bob", Uuid::new_v4()).await);

        let first = rx.recv().await.unwrap();
        match first.event {
            GatewayEvent::UpdateOnline(users) => assert_eq!(users, ["alice"]),
            other => panic!("unexpected event: {:?}", other),
        }
        let second = rx.recv().await.unwrap();
        match second.event {
            GatewayEvent::UpdateOnline(users) => assert_eq!(users, ["alice", "bob"]),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fifth_announce_is_dropped() {
        let dispatcher = Dispatcher::new();
        for i in 0..4 {
            assert!(dispatcher.announce(&format!("user{i}"), Uuid::new_v4()).await);
        }

        let mut rx = dispatcher.subscribe();
        assert!(!dispatcher.announce("latecomer", Uuid::new_v4()).await);

        assert_eq!(dispatcher.online_users().await.len(), 4);
        assert!(!dispatcher.online_users().await.contains(&"latecomer".to_string()));
        // no broadcast confirmed the dropped announce
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn disconnect_of_announced_user_updates_roster() {
        let dispatcher = Dispatcher::new();
        let alice_conn = Uuid::new_v4();
        dispatcher.announce("alice", alice_conn).await;
        dispatcher.announce("bob", Uuid::new_v4()).await;

        let mut rx = dispatcher.subscribe();
        dispatcher.disconnect(alice_conn).await;

        let out = rx.recv().await.unwrap();
        match out.event {
            GatewayEvent::UpdateOnline(users) => assert_eq!(users, ["bob"]),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(dispatcher.online_users().await, ["bob"]);
    }

    #[tokio::test]
    async fn disconnect_of_unannounced_connection_is_silent() {
        let dispatcher = Dispatcher::new();
        dispatcher.announce("alice", Uuid::new_v4()).await;

        let mut rx = dispatcher.subscribe();
        dispatcher.disconnect(Uuid::new_v4()).await;

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(dispatcher.online_users().await, ["alice"]);
    }

    #[tokio::test]
    async fn typing_marks_sender_for_exclusion() {
        let dispatcher = Dispatcher::new();
        let sender_conn = Uuid::new_v4();
        let mut rx = dispatcher.subscribe();

        dispatcher.typing(sender_conn, "alice".into());

        let out = rx.recv().await.unwrap();
        assert_eq!(out.exclude, Some(sender_conn));
        match out.event {
            GatewayEvent::UserTyping { username } => assert_eq!(username, "alice"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn typing_needs_no_announce() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        // connection never announced, event still relays
        dispatcher.typing(Uuid::new_v4(), "ghost".into());
        assert!(matches!(
            rx.recv().await.unwrap().event,
            GatewayEvent::UserTyping { .. }
        ));
    }
}
