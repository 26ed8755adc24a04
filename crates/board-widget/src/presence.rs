use tracing::{debug, info, warn};

use board_gateway::{GatewayError, StoreGateway};
use board_types::models::{KeyRef, PresenceMarker};

use crate::board::{Action, Board, Subscription};

/// Registers this client under the presence location and shows how many
/// clients are there.
#[derive(Clone)]
pub struct PresenceCounter<G> {
    gateway: G,
    board: Board,
    path: String,
    client: String,
}

/// Both presence subscriptions. Dropping it stops them; the marker itself
/// goes away when the gateway connection drops.
#[must_use = "dropping the handle stops presence tracking"]
#[derive(Debug)]
pub struct PresenceHandle {
    pub marker: Subscription,
    pub count: Subscription,
}

impl<G: StoreGateway> PresenceCounter<G> {
    pub fn new(gateway: G, board: Board, path: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            gateway,
            board,
            path: path.into(),
            client: client.into(),
        }
    }

    pub fn start(&self) -> PresenceHandle {
        PresenceHandle {
            marker: self.track_connection(),
            count: self.follow_count(),
        }
    }

    /// One new marker per transition to connected.
    fn track_connection(&self) -> Subscription {
        let mut signal = self.gateway.open_connection_state_signal();
        let gateway = self.gateway.clone();
        let path = self.path.clone();
        let client = self.client.clone();

        Subscription::spawn(async move {
            while let Some(connected) = signal.recv().await {
                if !connected {
                    debug!("Presence connection lost");
                    continue;
                }
                match register_marker(&gateway, &path, &client).await {
                    Ok(key) => info!("Presence marker {} registered", key),
                    Err(e) => warn!("Failed to register presence marker under '{}': {}", path, e),
                }
            }
        })
    }

    /// Independent of marker creation: counts every client at the location.
    fn follow_count(&self) -> Subscription {
        let mut values = self.gateway.open_key_value_subscription(&self.path);
        let board = self.board.clone();

        Subscription::spawn(async move {
            while let Some(snapshot) = values.recv().await {
                board.dispatch(Action::ViewerCount(snapshot.child_count()));
            }
        })
    }
}

/// Cleanup is registered before the marker is written so a marker never
/// exists without its disconnect instruction.
pub async fn register_marker<G: StoreGateway>(
    gateway: &G,
    path: &str,
    client: &str,
) -> Result<KeyRef, GatewayError> {
    let key = gateway.push_new_child_key(path);
    gateway.register_auto_cleanup_on_disconnect(&key).await?;
    gateway
        .write_value(&key, PresenceMarker::new(client).into_fields())
        .await?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use board_gateway::{MemoryGateway, MemoryStore};
    use board_types::models::{FieldValue, presence_fields};

    use crate::test_support::{RecordingSurface, utc_time};

    fn counter(store: &MemoryStore, client: &str) -> (PresenceCounter<MemoryGateway>, Arc<RecordingSurface>, MemoryGateway) {
        let surface = Arc::new(RecordingSurface::default());
        let board = Board::new(surface.clone(), utc_time());
        let gateway = store.open_session();
        (PresenceCounter::new(gateway.clone(), board, "presence", client), surface, gateway)
    }

    #[tokio::test]
    async fn connected_client_creates_one_marker() {
        let store = MemoryStore::new();
        let (counter, surface, _gw) = counter(&store, "test-agent");
        let _handle = counter.start();

        surface.wait_for(|v| v.viewer_count == "1").await;

        let observer = store.open_session();
        let snapshot = observer.open_key_value_subscription("presence").recv().await.unwrap();
        assert_eq!(snapshot.child_count(), 1);
        let marker = snapshot.children.values().next().unwrap();
        assert_eq!(marker.get(presence_fields::CLIENT), Some(&FieldValue::from("test-agent")));
        assert!(matches!(marker.get(presence_fields::CONNECTED_AT), Some(FieldValue::Timestamp(_))));
    }

    #[tokio::test]
    async fn count_tracks_other_clients() {
        let store = MemoryStore::new();
        let (first, first_surface, _first_gw) = counter(&store, "a");
        let _first = first.start();
        first_surface.wait_for(|v| v.viewer_count == "1").await;

        let (second, second_surface, second_gw) = counter(&store, "b");
        let second_handle = second.start();
        first_surface.wait_for(|v| v.viewer_count == "2").await;
        second_surface.wait_for(|v| v.viewer_count == "2").await;

        drop(second_handle);
        drop(second);
        second_gw.disconnect();
        first_surface.wait_for(|v| v.viewer_count == "1").await;
        assert_eq!(store.child_count("presence"), 1);
    }

    #[tokio::test]
    async fn reconnect_creates_fresh_marker() {
        let store = MemoryStore::new();
        let (counter, surface, gw) = counter(&store, "a");
        let _handle = counter.start();
        surface.wait_for(|v| v.viewer_count == "1").await;

        let mut values = store.open_session().open_key_value_subscription("presence");
        let first_key = values.recv().await.unwrap().children.into_keys().next().unwrap();

        gw.disconnect();
        surface.wait_for(|v| v.viewer_count == "0").await;
        gw.reconnect();
        surface.wait_for(|v| v.viewer_count == "1").await;

        let latest = values.latest().unwrap();
        assert_eq!(latest.child_count(), 1);
        assert!(!latest.children.contains_key(&first_key));
    }

    #[tokio::test]
    async fn failed_marker_still_shows_count() {
        let store = MemoryStore::new();
        let other = store.open_session();
        register_marker(&other, "presence", "other").await.unwrap();

        let (counter, surface, gw) = counter(&store, "offline");
        gw.disconnect();
        let _handle = counter.start();

        let view = surface.wait_for(|v| !v.viewer_count.is_empty()).await;
        assert_eq!(view.viewer_count, "1");
    }
}
