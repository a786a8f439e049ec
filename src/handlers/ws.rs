// WebSocket endpoint: upgrades, authenticates, and ties the connection into
// the realtime hub. Client frames are ignored; closing unregisters.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::auth::bearer_token;
use crate::models::User;
use crate::services::RealtimeHub;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    // Token from the query string, falling back to the Authorization header
    let Some(token) = query.token.or_else(|| bearer_token(&headers)) else {
        return unauthorized("Token required");
    };

    let Ok(claims) = state.jwt_service.validate_token(&token) else {
        return unauthorized("Invalid token");
    };
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return unauthorized("Invalid token");
    };

    let user = {
        let Ok(mut conn) = state.diesel_pool.get().await else {
            return unauthorized("Invalid token");
        };
        match User::find_active_by_id(&mut conn, user_id).await {
            Ok(user) => user,
            Err(_) => return unauthorized("Invalid token"),
        }
    };

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user.id))
}

async fn handle_socket(socket: WebSocket, hub: Arc<RealtimeHub>, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    // Hello frame goes straight to the socket before any hub traffic
    let hello = RealtimeHub::hello_frame(user_id);
    if sink.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = hub.register(user_id, tx);

    let mut forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Drain and discard client frames; an error or close ends the session
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => read_task.abort(),
        _ = &mut read_task => forward_task.abort(),
    }

    hub.unregister(user_id, conn_id);
    debug!(user_id = %user_id, conn_id, "WebSocket session ended");
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": message })),
    )
        .into_response()
}
