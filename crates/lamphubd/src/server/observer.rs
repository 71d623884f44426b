//! Observer WebSocket connections.
//!
//! Operators connect to `/ws` on the HTTP port and receive `device_update`
//! messages. Displays connect to `/ws` on the display port and receive
//! `task_update` messages. Both only ever read from the hub; anything they
//! send is logged and dropped.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::HubEvent;
use crate::hub::Hub;
use crate::observers::ObserverId;

/// `GET /ws` on the operator port.
pub async fn operator_ws(ws: WebSocketUpgrade, State(hub): State<Hub>) -> Response {
    ws.on_upgrade(move |socket| operator_connection(socket, hub))
}

/// Router served on the display port.
pub fn display_router(hub: Hub) -> Router {
    Router::new()
        .route("/ws", get(display_ws))
        .with_state(hub)
}

async fn display_ws(ws: WebSocketUpgrade, State(hub): State<Hub>) -> Response {
    ws.on_upgrade(move |socket| display_connection(socket, hub))
}

async fn operator_connection(socket: WebSocket, hub: Hub) {
    let (id, queue) = hub.operators.add().await;
    info!(observer = %id, "Operator connected");

    let (sender, receiver) = socket.split();
    let writer = tokio::spawn(drain_queue(sender, queue));

    hub.bus.publish(HubEvent::ObserverConnected).await;
    hub.notifier.notify_current(true).await;

    read_until_closed(receiver, "operator", id, &hub.cancel).await;

    hub.operators.remove(id).await;
    writer.abort();
    info!(observer = %id, "Operator disconnected");
}

async fn display_connection(socket: WebSocket, hub: Hub) {
    let (id, queue) = hub.displays.add().await;
    info!(observer = %id, "Display connected");

    let (sender, receiver) = socket.split();
    let writer = tokio::spawn(drain_queue(sender, queue));

    hub.tasks.send_current(id).await;

    read_until_closed(receiver, "display", id, &hub.cancel).await;

    hub.displays.remove(id).await;
    writer.abort();
    info!(observer = %id, "Display disconnected");
}

/// Forwards queued messages to the socket until either side goes away.
async fn drain_queue(mut sender: SplitSink<WebSocket, Message>, mut queue: mpsc::Receiver<Arc<str>>) {
    while let Some(text) = queue.recv().await {
        if let Err(e) = sender.send(Message::Text(text.as_ref().into())).await {
            debug!(error = %e, "Observer write failed");
            break;
        }
    }
    let _ = sender.close().await;
}

async fn read_until_closed(
    mut receiver: SplitStream<WebSocket>,
    kind: &'static str,
    id: ObserverId,
    cancel: &CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(kind, observer = %id, text = %text.as_str(), "Received from observer");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(kind, observer = %id, error = %e, "Observer connection error");
                    break;
                }
            }
        }
    }
}
