use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::AppState;

const HEARTBEAT_SECS: u64 = 30;

/// Pushed to every `/ws` subscriber after a status change commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusUpdate {
    pub transaction_id: Uuid,
    pub status: String,
    pub balance_updated: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Only forward updates for this transaction.
    pub transaction_id: Option<Uuid>,
}

impl WsQuery {
    fn wants(&self, update: &TransactionStatusUpdate) -> bool {
        self.transaction_id.map_or(true, |id| id == update.transaction_id)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(filter): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.tx_broadcast.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, filter))
}

async fn handle_socket(socket: WebSocket, mut rx: broadcast::Receiver<TransactionStatusUpdate>, filter: WsQuery) {
    let (mut sender, mut receiver) = socket.split();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!(message = %text, "Ignoring client message");
                }
                Message::Close(_) => {
                    tracing::debug!("Client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(HEARTBEAT_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(update) => {
                            if !filter.wants(&update) {
                                continue;
                            }
                            let json = match serde_json::to_string(&update) {
                                Ok(json) => json,
                                Err(e) => {
                                    tracing::error!(error = %e, "Failed to serialize status update");
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Status feed subscriber lagging");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    tracing::debug!("Status feed connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: Uuid) -> TransactionStatusUpdate {
        TransactionStatusUpdate {
            transaction_id: id,
            status: "completed".to_string(),
            balance_updated: true,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn unfiltered_subscriber_wants_everything() {
        assert!(WsQuery::default().wants(&update(Uuid::new_v4())));
    }

    #[test]
    fn filtered_subscriber_wants_only_its_transaction() {
        let id = Uuid::new_v4();
        let filter = WsQuery { transaction_id: Some(id) };
        assert!(filter.wants(&update(id)));
        assert!(!filter.wants(&update(Uuid::new_v4())));
    }
}
