//! Live cooking tips over a WebSocket.
//!
//! Tips are fire-and-forget: the hub is a bounded broadcast channel and a
//! subscriber that falls behind simply misses the tips it lagged over.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::state::AppState;

const HUB_CAPACITY: usize = 64;

const TIPS: &[&str] = &[
    "Add ingredients gradually for better mixing",
    "Let meat rest a few minutes after cooking so the juices settle",
    "Salt pasta water generously before the pasta goes in",
    "Toast whole spices in a dry pan to wake up their aroma",
    "Pat vegetables dry before roasting so they brown instead of steam",
    "Taste as you go and adjust seasoning at the end",
];

#[derive(Clone)]
pub struct TipHub {
    tx: broadcast::Sender<String>,
}

impl Default for TipHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TipHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Publishes to every connected socket. Returns how many received it.
    pub fn publish(&self, tip: impl Into<String>) -> usize {
        // No subscribers is not an error.
        self.tx.send(tip.into()).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

pub fn random_tip() -> &'static str {
    TIPS.choose(&mut rand::thread_rng()).copied().unwrap_or(TIPS[0])
}

#[derive(Debug, Deserialize)]
struct ClientEvent {
    event: String,
}

#[derive(Debug, Serialize)]
struct TipEvent<'a> {
    event: &'static str,
    tip: &'a str,
}

fn tip_frame(tip: &str) -> Option<Message> {
    serde_json::to_string(&TipEvent {
        event: "cooking-tip",
        tip,
    })
    .ok()
    .map(Message::Text)
}

/// Answer to a client text frame, if it asked for one.
fn reply_to(text: &str) -> Option<Message> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ev) if ev.event == "cooking-assistance" => tip_frame(random_tip()),
        Ok(ev) => {
            debug!(event = %ev.event, "ignored socket event");
            None
        }
        Err(e) => {
            debug!(error = %e, "malformed socket frame");
            None
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/cooking/ws", get(ws_handler))
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.tips.subscribe();
    ws.on_upgrade(move |socket| session(socket, rx))
}

async fn session(mut socket: WebSocket, mut tips: broadcast::Receiver<String>) {
    info!("cooking socket connected");
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "cooking socket error");
                        break;
                    }
                };
                if let Some(reply) = reply_to(&text) {
                    if socket.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            published = tips.recv() => {
                match published {
                    Ok(tip) => {
                        if let Some(frame) = tip_frame(&tip) {
                            if socket.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "cooking socket lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    info!("cooking socket closed");
}
