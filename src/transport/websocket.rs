//! WebSocket chat server
//!
//! Every connection becomes a `ChatStream` subscribed to the shared hub:
//! - a connection must `join` before anything else; the join runs the
//!   stream's activation, which announces it to everyone already connected
//! - `send` is recorded in the history (bounded, oldest dropped first) and
//!   broadcast to all streams
//! - `direct` is delivered only to the named users (and echoed to the sender)
//! - when the socket closes the stream is unsubscribed, which announces the
//!   departure
//!
//! Hub operations block while they fan out, so they run on tokio's blocking
//! pool rather than on the connection task.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::ChatStream;
use crate::config::HubSettings;
use crate::hub::Hub;
use crate::transport::message::{ChatMessage, ClientMessage, ServerMessage};
use crate::utils::error::{BoxError, HubError, TransportError, describe};

/// Number of broadcast messages kept for late joiners by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Shared state of the chat server: the hub of connected streams and the
/// most recent broadcast messages.
#[derive(Debug)]
pub struct ChatServer {
    hub: Arc<Hub<ChatStream>>,
    history: Mutex<VecDeque<ChatMessage>>,
    history_limit: usize,
}

impl ChatServer {
    pub fn new(hub: Hub<ChatStream>) -> Self {
        Self::with_history_limit(hub, DEFAULT_HISTORY_LIMIT)
    }

    /// Keeps at most `limit` broadcast messages; the oldest are dropped first.
    pub fn with_history_limit(hub: Hub<ChatStream>, limit: usize) -> Self {
        Self {
            hub: Arc::new(hub),
            history: Mutex::new(VecDeque::new()),
            history_limit: limit,
        }
    }

    pub fn from_settings(settings: &HubSettings) -> Result<Self, HubError> {
        Ok(Self::new(Hub::from_settings(settings)?))
    }

    pub fn hub(&self) -> &Arc<Hub<ChatStream>> {
        &self.hub
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Subscribes a new stream for `username`.
    ///
    /// Fails when the name is empty or reserved, or when activation rejects
    /// it. When the hub displaces earlier sessions instead of activating, the
    /// join notice is sent here.
    pub async fn join(
        &self,
        username: String,
        sender: UnboundedSender<WsMessage>,
    ) -> Result<Arc<ChatStream>, TransportError> {
        ChatStream::validate_username(&username)?;
        let stream = Arc::new(ChatStream::new(username, sender, &self.hub));
        let hub = self.hub.clone();
        let subscriber = stream.clone();
        task::spawn_blocking(move || -> Result<(), HubError> {
            let displacing = !hub.allows_duplicate_ids();
            hub.subscribe(subscriber.clone())?;
            if displacing {
                subscriber.announce(format!("`{}` joined", subscriber.username));
            }
            Ok(())
        })
        .await??;
        info!(username = %stream.username, conn_id = %stream.conn_id, "joined");
        Ok(stream)
    }

    pub async fn leave(&self, stream: Arc<ChatStream>) -> Result<(), TransportError> {
        let hub = self.hub.clone();
        let subscriber = stream.clone();
        task::spawn_blocking(move || hub.unsubscribe(&subscriber)).await??;
        info!(username = %stream.username, conn_id = %stream.conn_id, "left");
        Ok(())
    }

    /// Records `message` in the history and delivers it to every stream.
    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), TransportError> {
        let frame = ServerMessage::Message {
            message: message.clone(),
        }
        .encode()?;
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(message);
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        let hub = self.hub.clone();
        task::spawn_blocking(move || {
            hub.publish(move |stream| stream.send_raw(frame.clone()).map_err(BoxError::from))
        })
        .await??;
        Ok(())
    }

    /// Delivers `message` to the streams of the named users only, then echoes
    /// it to `from` unless the sender addressed itself. A name listed twice
    /// is delivered to once.
    pub async fn direct(
        &self,
        from: Arc<ChatStream>,
        to: Vec<String>,
        message: ChatMessage,
    ) -> Result<(), TransportError> {
        let frame = ServerMessage::Message { message }.encode()?;
        let mut seen = HashSet::new();
        let to: Vec<String> = to.into_iter().filter(|name| seen.insert(name.clone())).collect();
        let hub = self.hub.clone();
        task::spawn_blocking(move || -> Result<(), TransportError> {
            hub.publish_to(
                |stream| stream.send_raw(frame.clone()).map_err(BoxError::from),
                &to,
            )?;
            if !to.contains(&from.username) {
                from.send_raw(frame)?;
            }
            Ok(())
        })
        .await?
    }

    /// Deactivates every connected stream, closing their connections.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let hub = self.hub.clone();
        task::spawn_blocking(move || hub.terminate()).await??;
        info!("chat server shut down");
        Ok(())
    }
}

/// Binds `addr` and serves chat connections until accepting fails.
pub async fn start_chat_server(addr: &str, server: Arc<ChatServer>) -> Result<(), TransportError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Chat server listening on ws://{}", listener.local_addr()?);
    serve(listener, server).await
}

/// Serves chat connections from an already bound listener.
pub async fn serve(listener: TcpListener, server: Arc<ChatServer>) -> Result<(), TransportError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "connection accepted");
        let server = server.clone();
        tokio::spawn(handle_connection(stream, server));
    }
}

async fn handle_connection(stream: TcpStream, server: Arc<ChatServer>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "WebSocket handshake error");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    // hub -> socket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = msg.is_close();
            if let Err(e) = ws_sender.send(msg).await {
                debug!(error = %e, "send loop failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let mut joined: Option<Arc<ChatStream>> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        let request = match serde_json::from_str::<ClientMessage>(text) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    error = %err,
                    text = %text.chars().take(100).collect::<String>(),
                    "invalid client message"
                );
                reply(&tx, &ServerMessage::error("invalid message"));
                continue;
            }
        };

        match (request, joined.clone()) {
            (ClientMessage::Join { username }, None) => {
                match server.join(username.clone(), tx.clone()).await {
                    Ok(stream) => {
                        reply(
                            &tx,
                            &ServerMessage::Joined {
                                username,
                                history: server.history(),
                            },
                        );
                        joined = Some(stream);
                    }
                    Err(e) => {
                        warn!(%username, error = %describe(&e), "join rejected");
                        reply(
                            &tx,
                            &ServerMessage::error(format!("join rejected: {}", describe(&e))),
                        );
                    }
                }
            }
            (ClientMessage::Join { .. }, Some(_)) => {
                reply(&tx, &ServerMessage::error("already joined"));
            }
            (_, None) => {
                reply(&tx, &ServerMessage::error("must join first"));
                let _ = tx.send(WsMessage::Close(None));
                break;
            }
            (ClientMessage::Send { body }, Some(stream)) => {
                let message = ChatMessage::new(stream.username.clone(), body);
                if let Err(e) = server.broadcast(message).await {
                    warn!(username = %stream.username, error = %describe(&e), "broadcast incomplete");
                }
            }
            (ClientMessage::Direct { to, body }, Some(stream)) => {
                let message = ChatMessage::new(stream.username.clone(), body);
                if let Err(e) = server.direct(stream.clone(), to, message).await {
                    warn!(username = %stream.username, error = %describe(&e), "direct message incomplete");
                }
            }
            (ClientMessage::History, Some(_)) => {
                reply(
                    &tx,
                    &ServerMessage::History {
                        messages: server.history(),
                    },
                );
            }
        }
    }

    if let Some(stream) = joined {
        if let Err(e) = server.leave(stream).await {
            warn!(error = %describe(&e), "failed to leave cleanly");
        }
    }
}

fn reply(tx: &UnboundedSender<WsMessage>, message: &ServerMessage) {
    match message.encode() {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => warn!(error = %e, "failed to encode reply"),
    }
}
