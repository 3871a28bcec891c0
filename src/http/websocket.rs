use super::state::AppState;
use crate::error::{AsrError, Result};
use crate::session::{ConnectionInfo, InboundFrame, MessageSink, OutboundMessage, SessionProtocolHandler};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tracing::{info, warn};

/// Outbound half of a client socket
struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, message: OutboundMessage) -> Result<()> {
        let json = serde_json::to_string(&message)?;
        self.sender
            .send(Message::Text(json))
            .await
            .map_err(|e| AsrError::ConnectionLost(e.to_string()))
    }
}

/// GET / (WebSocket upgrade, subprotocol `binary`)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> impl IntoResponse {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.to_string());
    ws.protocols(["binary"])
        .on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Drive one connection until the client goes away
async fn handle_socket(socket: WebSocket, state: AppState, peer: Option<String>) {
    let session_id = format!("session-{}", uuid::Uuid::new_v4());
    let users = state
        .register(ConnectionInfo::new(session_id.clone(), peer.clone()))
        .await;
    info!(
        "New user connected: {} from {} (total: {})",
        session_id,
        peer.as_deref().unwrap_or("unknown"),
        users
    );

    let (sender, mut receiver) = socket.split();
    let mut sink = WsSink { sender };
    let mut handler =
        SessionProtocolHandler::new(session_id.clone(), state.collaborators.clone(), &state.config);

    while let Some(message) = receiver.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => InboundFrame::Text(text),
            Ok(Message::Binary(data)) => InboundFrame::Binary(data),
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by axum
            Ok(_) => continue,
            Err(e) => {
                warn!("Session {}: receive failed: {}", session_id, e);
                break;
            }
        };

        if let Err(e) = handler.handle_frame(frame, &mut sink).await {
            warn!("Session {}: {}", session_id, e);
            break;
        }
    }

    let stats = handler.finish(&mut sink).await;
    let users = state.deregister(&session_id).await;
    info!(
        "User disconnected: {} ({} bytes received, total: {})",
        session_id, stats.bytes_received, users
    );
}
