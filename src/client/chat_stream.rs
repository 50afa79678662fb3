//! Chat stream subscriber
//!
//! `ChatStream` is the hub subscriber behind one WebSocket connection. It
//! holds the sending side of the connection's outbound channel; the transport
//! forwards whatever lands there to the socket.
//!
//! Joining and leaving are announced to the other participants from the
//! activation hooks. Those notices are best effort: a participant that cannot
//! be reached is logged and skipped, it does not fail the join or the leave.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::hub::{Hub, Subscriber};
use crate::transport::message::{ChatMessage, SYSTEM_USERNAME, ServerMessage};
use crate::utils::error::{BoxError, TransportError};

#[derive(Debug)]
pub struct ChatStream {
    /// Unique per connection; tells apart streams sharing a username.
    pub conn_id: String,
    pub username: String,
    sender: UnboundedSender<WsMessage>,
    hub: Weak<Hub<ChatStream>>,
}

impl ChatStream {
    pub fn new(
        username: impl Into<String>,
        sender: UnboundedSender<WsMessage>,
        hub: &Arc<Hub<ChatStream>>,
    ) -> Self {
        Self {
            conn_id: Uuid::new_v4().to_string(),
            username: username.into(),
            sender,
            hub: Arc::downgrade(hub),
        }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), TransportError> {
        self.send_raw(message.encode()?)
    }

    /// Pushes an already encoded frame to the connection.
    pub fn send_raw(&self, frame: WsMessage) -> Result<(), TransportError> {
        self.sender
            .send(frame)
            .map_err(|_| TransportError::Disconnected(self.conn_id.clone()))
    }

    /// Rejects names that are empty or impersonate server notices.
    pub fn validate_username(username: &str) -> Result<(), TransportError> {
        let name = username.trim();
        if name.is_empty() {
            return Err(TransportError::InvalidUsername(
                "username must not be empty".to_string(),
            ));
        }
        if name == SYSTEM_USERNAME {
            return Err(TransportError::InvalidUsername(format!(
                "the name `{SYSTEM_USERNAME}` is reserved"
            )));
        }
        Ok(())
    }

    /// Sends a system notice to every other stream in the hub.
    pub(crate) fn announce(&self, body: String) {
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let frame = match (ServerMessage::Message {
            message: ChatMessage::system(body),
        })
        .encode()
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn_id = %self.conn_id, error = %e, "failed to encode notice");
                return;
            }
        };

        let conn_id = self.conn_id.clone();
        let result = hub.publish(move |stream| {
            if stream.conn_id == conn_id {
                return Ok(());
            }
            stream.send_raw(frame.clone()).map_err(BoxError::from)
        });
        if let Err(e) = result {
            warn!(conn_id = %self.conn_id, error = %e, "notice not delivered to everyone");
        }
    }
}

impl Subscriber for ChatStream {
    type Id = String;

    fn id(&self) -> String {
        self.username.clone()
    }

    fn activate(&self) -> Result<(), BoxError> {
        Self::validate_username(&self.username)?;
        self.announce(format!("`{}` joined", self.username));
        Ok(())
    }

    fn deactivate(&self) -> Result<(), BoxError> {
        // the connection may already be gone
        let _ = self.send_raw(WsMessage::Close(None));
        self.announce(format!("`{}` left", self.username));
        Ok(())
    }
}
