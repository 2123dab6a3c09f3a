//! Websocket session runner
//!
//! Drives one [`ClientSession`] from handshake to close. The write side drains
//! the session's mailbox and any queued replies; the read side answers inbound
//! messages. Whichever side stops first ends the session.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::BroadcastHub;
use crate::error::SessionError;
use crate::protocol::{ClientMessage, ConfigData, ServerMessage};
use crate::session::state::ClientSession;

/// Replies waiting to be written, per session
const REPLY_QUEUE_CAPACITY: usize = 8;

/// Serve one connection until either side goes away.
///
/// Returns the session in its final `CLOSED` state.
pub async fn run_session<W, R, E>(
    mut sink: W,
    mut stream: R,
    hub: Arc<BroadcastHub>,
    config: ConfigData,
) -> ClientSession
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut session = ClientSession::new();
    let id = session.id();
    tracing::info!("Session {} connected", id);

    if let Err(e) = handshake(&mut sink, &mut session, &hub, &config).await {
        tracing::warn!("Session {} handshake failed: {}", id, e);
        session.begin_close();
        let _ = sink.send(Message::Close(None)).await;
        let _ = session.finish();
        tracing::info!("Session {} disconnected", id);
        return session;
    }

    let mailbox = hub.subscribe(id);
    let config_text = ServerMessage::Config { data: config }.to_json().ok();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_QUEUE_CAPACITY);

    let writer = async {
        loop {
            let text = tokio::select! {
                biased;
                reply = reply_rx.recv() => match reply {
                    Some(text) => text,
                    None => break,
                },
                frame = mailbox.recv() => match frame {
                    Some(frame) => {
                        session.record_delivery(frame.sequence());
                        // Text frames own their buffer; this is a copy, not a re-render
                        frame.wire_text().to_string()
                    }
                    // Hub closed or session unsubscribed
                    None => break,
                },
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                tracing::debug!("Session {} write failed: {}", id, e);
                break;
            }
        }
    };

    let reader = async {
        while let Some(inbound) = stream.next().await {
            let reply = match inbound {
                Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                    Ok(ClientMessage::Ping) => None,
                    Ok(ClientMessage::GetConfig) => config_text.clone(),
                    Err(reason) => {
                        tracing::debug!("Session {} sent malformed message: {}", id, reason);
                        ServerMessage::error(reason).to_json().ok()
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!("Session {} sent a binary message", id);
                    ServerMessage::error("binary messages are not supported")
                        .to_json()
                        .ok()
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("Session {} read failed: {}", id, e);
                    break;
                }
            };
            if let Some(reply) = reply {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    session.begin_close();
    hub.unsubscribe(id);
    drop(mailbox);
    let _ = sink.send(Message::Close(None)).await;
    let _ = session.finish();

    tracing::info!(
        "Session {} disconnected after {} frames ({:.1?})",
        id,
        session.frames_sent(),
        session.connected_for()
    );
    session
}

/// HANDSHAKING: refuse when there is no camera, otherwise send `config` and
/// go ACTIVE.
async fn handshake<W>(
    sink: &mut W,
    session: &mut ClientSession,
    hub: &BroadcastHub,
    config: &ConfigData,
) -> Result<(), SessionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    if !hub.state().camera_open() || hub.is_closed() {
        let text = ServerMessage::error("camera is not available").to_json()?;
        let _ = sink.send(Message::Text(text)).await;
        return Err(SessionError::Handshake("camera is not available".to_string()));
    }

    let text = ServerMessage::Config {
        data: config.clone(),
    }
    .to_json()?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| SessionError::Transport(e.to_string()))?;

    session.activate()
}
