use std::sync::Arc;

use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

use super::ChatStream;
use crate::hub::Hub;
use crate::transport::message::{ChatMessage, ServerMessage};
use crate::utils::error::{HubError, TransportError};

fn chat_hub() -> Arc<Hub<ChatStream>> {
    Arc::new(Hub::new())
}

fn stream(
    hub: &Arc<Hub<ChatStream>>,
    username: &str,
) -> (Arc<ChatStream>, mpsc::UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChatStream::new(username, tx, hub)), rx)
}

fn decode(frame: WsMessage) -> ServerMessage {
    let text = frame.to_text().expect("expected a text frame");
    serde_json::from_str(text).expect("valid server message")
}

fn system_body(frame: WsMessage) -> String {
    match decode(frame) {
        ServerMessage::Message {
            message: ChatMessage { username, body, .. },
        } => {
            assert_eq!(username, "system");
            body
        }
        other => panic!("Expected a message, got {other:?}"),
    }
}

#[test]
fn test_chat_stream_new() {
    let hub = chat_hub();
    let (alice, _rx) = stream(&hub, "alice");
    let (other, _rx2) = stream(&hub, "alice");
    assert_eq!(alice.username, "alice");
    assert!(!alice.conn_id.is_empty());
    assert_ne!(alice.conn_id, other.conn_id);
}

#[test]
fn test_send_pushes_json_frame() {
    let hub = chat_hub();
    let (alice, mut rx) = stream(&hub, "alice");

    alice.send(&ServerMessage::error("nope")).unwrap();

    assert_eq!(decode(rx.try_recv().unwrap()), ServerMessage::error("nope"));
}

#[test]
fn test_send_to_closed_connection_fails() {
    let hub = chat_hub();
    let (alice, rx) = stream(&hub, "alice");
    drop(rx);

    let err = alice.send(&ServerMessage::error("nope")).unwrap_err();
    assert!(matches!(err, TransportError::Disconnected(ref id) if *id == alice.conn_id));
}

#[test]
fn test_activation_rejects_reserved_and_empty_names() {
    let hub = chat_hub();
    let (system, _rx) = stream(&hub, "system");
    let (blank, _rx2) = stream(&hub, "  ");

    assert!(matches!(
        hub.subscribe(system),
        Err(HubError::Activation { .. })
    ));
    assert!(matches!(hub.subscribe(blank), Err(HubError::Activation { .. })));
    assert!(hub.is_empty());
}

#[test]
fn test_validate_username() {
    assert!(ChatStream::validate_username("alice").is_ok());
    for name in ["", "   ", "system", " system "] {
        let err = ChatStream::validate_username(name).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUsername(_)), "{name:?}");
    }
}

#[test]
fn test_join_is_announced_to_others() {
    let hub = chat_hub();
    let (alice, mut alice_rx) = stream(&hub, "alice");
    let (bob, mut bob_rx) = stream(&hub, "bob");

    hub.subscribe(alice).unwrap();
    assert!(alice_rx.try_recv().is_err());

    hub.subscribe(bob).unwrap();
    assert_eq!(system_body(alice_rx.try_recv().unwrap()), "`bob` joined");
    assert!(bob_rx.try_recv().is_err());
}

#[test]
fn test_leave_closes_stream_and_is_announced() {
    let hub = chat_hub();
    let (alice, mut alice_rx) = stream(&hub, "alice");
    let (bob, mut bob_rx) = stream(&hub, "bob");
    hub.subscribe(alice).unwrap();
    hub.subscribe(bob.clone()).unwrap();
    let _ = alice_rx.try_recv();

    hub.unsubscribe(&bob).unwrap();

    assert_eq!(system_body(alice_rx.try_recv().unwrap()), "`bob` left");
    assert!(matches!(bob_rx.try_recv().unwrap(), WsMessage::Close(None)));
    assert!(bob_rx.try_recv().is_err());
    assert_eq!(hub.len(), 1);
}

#[test]
fn test_leave_of_disconnected_stream_still_succeeds() {
    let hub = chat_hub();
    let (alice, rx) = stream(&hub, "alice");
    hub.subscribe(alice.clone()).unwrap();
    drop(rx);

    hub.unsubscribe(&alice).unwrap();
    assert!(hub.is_empty());
}

#[test]
fn test_broadcast_reports_disconnected_stream() {
    let hub = chat_hub();
    let (alice, _alice_rx) = stream(&hub, "alice");
    let (bob, bob_rx) = stream(&hub, "bob");
    hub.subscribe(alice).unwrap();
    hub.subscribe(bob).unwrap();
    drop(bob_rx);

    let frame = ServerMessage::error("ping").encode().unwrap();
    let err = hub
        .publish(move |s| s.send_raw(frame.clone()).map_err(Into::into))
        .unwrap_err();

    assert!(matches!(err, HubError::Delivery { ref id, .. } if id == "\"bob\""));
}

#[test]
fn test_join_with_unreachable_peer_still_succeeds() {
    let hub = chat_hub();
    let (alice, alice_rx) = stream(&hub, "alice");
    let (bob, _bob_rx) = stream(&hub, "bob");
    hub.subscribe(alice).unwrap();
    drop(alice_rx);

    hub.subscribe(bob).unwrap();
    assert_eq!(hub.len(), 2);
}
