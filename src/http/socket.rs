use super::state::AppState;
use crate::error::SessionError;
use crate::observers::Subscription;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::session::CoordinatorHandle;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

/// GET /ws
/// Upgrade to a subscriber connection
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_subscriber(socket, state.coordinator))
}

/// Pump coordinator events out and client commands in until either side
/// goes away, then detach.
async fn handle_subscriber(socket: WebSocket, coordinator: CoordinatorHandle) {
    let Subscription { id, mut events } = match coordinator.attach().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("Rejecting subscriber connection: {}", e);
            return;
        }
    };

    info!("Subscriber {} connected", id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Registry dropped us (coordinator shut down)
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Subscriber {} socket error: {}", id, e);
                        break;
                    }
                };

                let rejection = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => {
                        debug!("Subscriber {} sent {}", id, command.name());
                        coordinator.dispatch(command, Some(id)).err()
                    }
                    Err(e) => Some(SessionError::Protocol(format!("Malformed command: {}", e))),
                };

                if let Some(error) = rejection {
                    warn!("Subscriber {} command rejected: {}", id, error);
                    if send_event(&mut sender, &ServerEvent::error(&error)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = coordinator.detach(id).await {
        debug!("Detach of {} skipped: {}", id, e);
    }
    info!("Subscriber {} disconnected", id);
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}
