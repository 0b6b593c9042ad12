//! Streaming chat relay
//!
//! Upstream tokens are forwarded to the HTTP response through a channel
//! while a background task accumulates the full reply. The task owns the
//! upstream stream, so the assistant message is written to the transcript
//! even when the browser goes away mid-reply.

use futures::StreamExt;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use utr_common::db::{Message, Role};

use super::chat_provider::TokenStream;
use crate::db;

/// Channel depth between the relay task and the SSE response
const RELAY_BUFFER: usize = 64;

/// One step of a streamed reply as seen by the browser
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Token(String),
    /// Reply finished and persisted
    Done(Message),
    /// Upstream failed after streaming began; any partial text is persisted
    Error(String),
}

/// Start relaying `tokens` for `session_id`. The receiver yields tokens in
/// arrival order and exactly one terminal event.
pub fn spawn_relay(
    pool: SqlitePool,
    session_id: i64,
    tokens: TokenStream,
) -> mpsc::Receiver<RelayEvent> {
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(run_relay(pool, session_id, tokens, tx));
    rx
}

async fn run_relay(
    pool: SqlitePool,
    session_id: i64,
    mut tokens: TokenStream,
    tx: mpsc::Sender<RelayEvent>,
) {
    let mut reply = String::new();
    let mut client_gone = false;
    let mut failure = None;

    while let Some(item) = tokens.next().await {
        match item {
            Ok(text) => {
                reply.push_str(&text);
                if !client_gone && tx.send(RelayEvent::Token(text)).await.is_err() {
                    debug!(session_id, "Client disconnected; finishing reply in background");
                    client_gone = true;
                }
            }
            Err(e) => {
                failure = Some(e.to_string());
                break;
            }
        }
    }

    if let Some(reason) = failure {
        warn!(session_id, error = %reason, received = reply.len(), "Upstream stream failed");
        if !reply.is_empty() {
            if let Err(e) = db::sessions::insert_message(&pool, session_id, Role::Assistant, &reply).await {
                error!(session_id, error = %e, "Failed to persist partial reply");
            }
        }
        let _ = tx.send(RelayEvent::Error(format!("Model error: {}", reason))).await;
        return;
    }

    match db::sessions::insert_message(&pool, session_id, Role::Assistant, &reply).await {
        Ok(message) => {
            info!(session_id, message_id = message.id, chars = reply.len(), "Streamed reply stored");
            let _ = tx.send(RelayEvent::Done(message)).await;
        }
        Err(e) => {
            error!(session_id, error = %e, "Failed to persist streamed reply");
            let _ = tx.send(RelayEvent::Error("Failed to save response".to_string())).await;
        }
    }
}
