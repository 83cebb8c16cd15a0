//! Per-connection websocket loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::warn;

use cursebound_protocol::{ClientMessage, ServerMessage, decode_client_message, encode_server_message};

use crate::directory::ConnId;
use crate::hub::Hub;

const INVALID_PAYLOAD: &str = "Invalid payload.";

/// Drive one client connection until it closes, then clean up.
pub async fn run(hub: Arc<Hub>, stream: TcpStream, conn: ConnId) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (mut sink, mut source) = ws_stream.split();

    let (sender, mut outbound) = mpsc::unbounded_channel::<ServerMessage>();
    hub.connect(conn, sender);

    // Writer task: the only place this connection touches the socket for
    // output, so no handler ever blocks on a slow consumer.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let frame = match encode_server_message(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_client_message(&text) {
                Ok(message) => dispatch(&hub, conn, message).await,
                Err(e) => {
                    warn!(error = %e, "rejecting malformed client message");
                    hub.send(
                        conn,
                        ServerMessage::Error {
                            message: INVALID_PAYLOAD.into(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            // Ping/pong and binary frames are handled by the protocol layer
            // or ignored.
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "websocket error, dropping connection");
                break;
            }
        }
    }

    hub.handle_disconnect(conn).await;
    // All senders are gone now, so the writer drains and exits.
    let _ = writer.await;
    Ok(())
}

async fn dispatch(hub: &Hub, conn: ConnId, message: ClientMessage) {
    match message {
        ClientMessage::Join { username } => hub.handle_join(conn, username).await,
        ClientMessage::Action { technique_id } => hub.handle_action(conn, &technique_id).await,
        ClientMessage::Character { character_id } => hub.handle_character(conn, &character_id),
    }
}
