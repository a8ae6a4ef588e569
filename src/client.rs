// Websocket client for the spe_ed game server
//
// The server pushes the full game state every tick over one persistent
// connection and expects `{"action": "<token>"}` back.

use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::bot::Bot;
use crate::debug_logger::DebugLogger;
use crate::handler::{action_body, play_tick, Tick};
use crate::types::{GameState, GameStatus};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("connection closed before the game ended")]
    Closed,
}

/// Server address with the API key appended as query parameter
pub fn endpoint(url: &str, key: &str) -> String {
    format!("{}?key={}", url, key)
}

/// Plays one game on `endpoint` until it is over or our player died.
///
/// States that fail to parse or validate are skipped without an answer.
pub async fn run(
    endpoint: &str,
    bot: Arc<Bot>,
    logger: DebugLogger,
) -> Result<GameStatus, ClientError> {
    let (mut socket, _) = connect_async(endpoint).await?;
    info!("Waiting for initial state...");

    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let state: GameState = match serde_json::from_str(&text) {
            Ok(state) => state,
            Err(e) => {
                warn!("Skipping malformed game state: {}", e);
                continue;
            }
        };

        match play_tick(&bot, &logger, state).await {
            Ok(Tick::Move(command)) => {
                socket
                    .send(Message::Text(action_body(command).to_string()))
                    .await?;
                info!("player still alive after {} moves", bot.move_count());
            }
            Ok(Tick::Finished(status)) => {
                // The server may already be gone, the game is decided either way
                let _ = socket.close(None).await;
                return Ok(status);
            }
            Err(e) => warn!("Skipping invalid game state: {}", e),
        }
    }

    Err(ClientError::Closed)
}
