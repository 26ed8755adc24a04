use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum_extra::TypedHeader;
use axum_extra::headers::UserAgent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use board_types::api::BoardView;
use board_types::events::{LiveCommand, LiveFrame};
use board_widget::{StaticConfig, Surface, TimeLabel, WidgetOptions};

use crate::routes::AppState;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const UNKNOWN_CLIENT: &str = "unknown";

pub async fn ws_upgrade(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let client = user_agent
        .map(|TypedHeader(ua)| ua.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, client))
}

/// Forwards board output to the socket's send task.
struct SocketSurface {
    tx: mpsc::UnboundedSender<LiveFrame>,
}

impl Surface for SocketSurface {
    fn paint(&self, view: &BoardView) {
        let _ = self.tx.send(LiveFrame::Render(view.clone()));
    }

    fn alert(&self, message: &str) {
        let _ = self.tx.send(LiveFrame::Alert {
            message: message.to_string(),
        });
    }
}

/// One socket is one client session: its own widget, its own presence
/// marker. The marker is removed when the session ends with the socket.
async fn handle_socket(socket: WebSocket, state: AppState, client: String) {
    let (mut sender, mut receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();

    let surface: Arc<dyn Surface> = Arc::new(SocketSurface { tx: frame_tx });
    let options = WidgetOptions {
        client: client.clone(),
        time: TimeLabel::local(state.clock),
    };
    let Some(widget) =
        board_widget::start(&StaticConfig(state.config.clone()), &state.store, surface, options).await
    else {
        return;
    };
    let session = widget.gateway().session_id();
    info!(
        "Live client {} ({}) connected to '{}'",
        session,
        client,
        widget.config().collection
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode live frame: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let feed = widget.feed();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<LiveCommand>(&text) {
                    Ok(LiveCommand::Submit { author, body }) => {
                        let feed = feed.clone();
                        tokio::spawn(async move {
                            let outcome = feed.submit(&author, &body).await;
                            debug!("Live client {} submit: {:?}", session, outcome);
                        });
                    }
                    Err(e) => {
                        warn!(
                            "Live client {} bad command: {} -- raw: {}",
                            session,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    drop(widget);
    info!("Live client {} ({}) disconnected", session, client);
}
