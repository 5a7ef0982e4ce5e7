// SPDX-License-Identifier: MIT

//! The dashboard push transport (§4.F, §6 "GET /orchestration"): a
//! WebSocket upgrade per connection, forwarding `Event`s from the Event
//! Bus and relaying `subscribe`/`unsubscribe`/`subscribeProjects` client
//! messages into `EventBus::set_rooms`.
//!
//! Grounded in `goose-server`'s `acp_ide` handler: `WebSocketUpgrade` →
//! `socket.split()` → a spawned forwarder task fed by an mpsc channel,
//! `tokio::select!` over the forwarder and the incoming read half in the
//! same task that owns the connection.

use crate::app::App;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use fleet_core::event::Room;
use fleet_wire::ws::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

async fn upgrade(State(app): State<Arc<App>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, app))
}

async fn handle_connection(socket: WebSocket, app: Arc<App>) {
    let (mut sink, mut stream) = socket.split();
    let subscription = app.event_bus.subscribe(HashSet::new());
    let subscriber_id = subscription.id;
    let mut events = subscription.receiver;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let message = to_server_message(&event);
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if handle_client_message(&app, &mut sink, subscriber_id, &text).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(%err, "orchestration ws: read error");
                        break;
                    }
                }
            }
        }
    }

    app.event_bus.unsubscribe(subscriber_id);
}

async fn handle_client_message(
    app: &App,
    sink: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
    subscriber_id: u64,
    text: &str,
) -> Result<(), axum::Error> {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::Subscribe { workspace_id }) => {
            let room = Room::Workspace(fleet_core::WorkspaceId::new(workspace_id.clone()));
            app.event_bus.set_rooms(subscriber_id, HashSet::from([room]));
            send(sink, &ServerMessage::Subscribed { room: format!("workspace:{workspace_id}") }).await
        }
        Ok(ClientMessage::Unsubscribe) => {
            app.event_bus.set_rooms(subscriber_id, HashSet::new());
            send(sink, &ServerMessage::Unsubscribed { room: String::new() }).await
        }
        Ok(ClientMessage::SubscribeProjects { project_numbers }) => {
            let rooms: HashSet<Room> = project_numbers.iter().map(|n| Room::Project(*n)).collect();
            app.event_bus.set_rooms(subscriber_id, rooms);
            for project_number in &project_numbers {
                for event in app.event_bus.replay(*project_number) {
                    send(sink, &to_server_message(&event)).await?;
                }
            }
            send(sink, &ServerMessage::Subscribed { room: "projects".to_string() }).await
        }
        Err(err) => send(sink, &ServerMessage::Error { message: err.to_string() }).await,
    }
}

/// Maps an internal `Event` onto the wire-level vocabulary — the gateway
/// is a thin relay, not a second place that understands domain event
/// semantics. Orchestration events get their own typed message; anything
/// routed to a project room rides along as `project.event`.
fn to_server_message(event: &fleet_core::Event) -> ServerMessage {
    if let fleet_core::Event::OrchestrationUpdated { orchestration } = event {
        return ServerMessage::OrchestrationWorkspace {
            workspace_id: orchestration.workspace_id.to_string(),
            running: orchestration.running,
            desired: orchestration.desired,
        };
    }
    let project_number = event.rooms().into_iter().find_map(|room| match room {
        Room::Project(n) => Some(n),
        Room::Workspace(_) => None,
    });
    ServerMessage::ProjectEvent {
        project_number: project_number.unwrap_or_default(),
        payload: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    }
}

async fn send(sink: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin), message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_default();
    sink.send(WsMessage::Text(text.into())).await
}

pub fn routes(app: Arc<App>) -> Router {
    Router::new().route("/orchestration", get(upgrade)).with_state(app)
}
