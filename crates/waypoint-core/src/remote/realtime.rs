//! Realtime change feed over the hosted store's websocket channel.
//!
//! The socket speaks Phoenix channel frames: a `phx_join` on
//! `realtime:<schema>:<table>` opts into `postgres_changes`, a heartbeat on
//! the `phoenix` topic keeps the connection alive, and each committed row
//! change arrives as a `postgres_changes` frame.
//!
//! [`spawn_feed`] runs the socket on a background task and reconnects after
//! a fixed delay until the returned [`ChangeFeed`] is dropped.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::row::RemoteRow;
use super::{ChangeEvent, ChangeFeed, RemoteError};
use crate::model::InitiativeId;

/// Phoenix heartbeat cadence expected by the server.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Connection settings for one table subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Full websocket URL, see [`socket_url`].
    pub url: String,
    pub schema: String,
    pub table: String,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl RealtimeConfig {
    /// Channel topic for the subscribed table.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.schema, self.table)
    }
}

/// Websocket endpoint for a project base URL (`https://x.supabase.co`).
#[must_use]
pub fn socket_url(base_url: &str, anon_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!(
        "{ws}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        urlencoding::encode(anon_key)
    )
}

/// The `phx_join` frame subscribing to every change on the table.
#[must_use]
pub fn join_message(config: &RealtimeConfig, reference: u64) -> String {
    json!({
        "topic": config.topic(),
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": config.schema, "table": config.table }
                ]
            }
        },
        "ref": reference.to_string(),
    })
    .to_string()
}

#[must_use]
pub fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A committed row change.
    Change(ChangeEvent),
    /// Reply to a join or heartbeat.
    Reply { ok: bool, message: Option<String> },
    /// The server closed or errored the channel.
    Closed(String),
    /// Presence, system notices and anything else not consumed here.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: InitiativeId,
}

/// Decode one text frame.
///
/// # Errors
///
/// Returns [`RemoteError::Decode`] when the frame is not JSON or a change
/// frame carries a row that does not match the row shape.
pub fn decode_frame(text: &str) -> Result<Frame, RemoteError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.event.as_str() {
        "postgres_changes" => decode_change(envelope.payload),
        "phx_reply" => {
            let ok = envelope.payload.get("status").and_then(Value::as_str) == Some("ok");
            let message = envelope
                .payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(Frame::Reply { ok, message })
        }
        "phx_close" | "phx_error" => Ok(Frame::Closed(envelope.event)),
        _ => Ok(Frame::Ignored),
    }
}

fn decode_change(mut payload: Value) -> Result<Frame, RemoteError> {
    let Some(data) = payload.get_mut("data").map(Value::take) else {
        return Err(RemoteError::Decode("change frame without data".into()));
    };
    let data: ChangeData = serde_json::from_value(data)?;
    let missing = || RemoteError::Decode(format!("{} frame without a row", data.kind));

    let event = match data.kind.as_str() {
        "INSERT" => {
            let row: RemoteRow = serde_json::from_value(data.record.clone().ok_or_else(missing)?)?;
            ChangeEvent::Insert(row)
        }
        "UPDATE" => {
            let row: RemoteRow = serde_json::from_value(data.record.clone().ok_or_else(missing)?)?;
            ChangeEvent::Update(row)
        }
        "DELETE" => {
            let old: IdOnly = serde_json::from_value(data.old_record.clone().ok_or_else(missing)?)?;
            ChangeEvent::Delete { id: old.id }
        }
        _ => return Ok(Frame::Ignored),
    };
    Ok(Frame::Change(event))
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

/// Start the subscription on a background task.
///
/// Must be called from inside a tokio runtime.
#[must_use]
pub fn spawn_feed(config: RealtimeConfig) -> ChangeFeed {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run(config, tx));
    ChangeFeed::with_worker(rx, worker)
}

async fn run(config: RealtimeConfig, tx: mpsc::UnboundedSender<ChangeEvent>) {
    let mut attempt: u64 = 0;
    loop {
        match connect_once(&config, &tx).await {
            Ok(()) => debug!(topic = %config.topic(), "realtime socket closed"),
            Err(err) => warn!(topic = %config.topic(), error = %err, "realtime connection failed"),
        }
        if tx.is_closed() {
            return;
        }
        attempt += 1;
        info!(
            attempt,
            delay_ms = config.reconnect_delay.as_millis(),
            "reconnecting change feed"
        );
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

fn closed(err: impl std::fmt::Display) -> RemoteError {
    RemoteError::FeedClosed(err.to_string())
}

async fn connect_once(
    config: &RealtimeConfig,
    tx: &mpsc::UnboundedSender<ChangeEvent>,
) -> Result<(), RemoteError> {
    let (socket, _) = tokio_tungstenite::connect_async(config.url.as_str())
        .await
        .map_err(closed)?;
    let (mut write, mut read) = socket.split();

    let mut reference: u64 = 1;
    write
        .send(Message::Text(join_message(config, reference)))
        .await
        .map_err(closed)?;
    info!(topic = %config.topic(), "change feed joined");

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                reference += 1;
                write
                    .send(Message::Text(heartbeat_message(reference)))
                    .await
                    .map_err(closed)?;
            }
            () = tx.closed() => return Ok(()),
            msg = read.next() => {
                let Some(msg) = msg else { return Ok(()) };
                match msg.map_err(closed)? {
                    Message::Text(text) => match decode_frame(&text) {
                        Ok(Frame::Change(event)) => {
                            debug!(kind = event.kind(), id = %event.id(), "change received");
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                        Ok(Frame::Reply { ok: false, message }) => {
                            return Err(RemoteError::FeedClosed(
                                message.unwrap_or_else(|| "join rejected".into()),
                            ));
                        }
                        Ok(Frame::Closed(reason)) => return Err(RemoteError::FeedClosed(reason)),
                        Ok(Frame::Reply { ok: true, .. } | Frame::Ignored) => {}
                        Err(err) => warn!(error = %err, "dropping undecodable realtime frame"),
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}
