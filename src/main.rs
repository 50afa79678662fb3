//! CLI for PubHub
//!
//! Subcommands:
//! - `server`: run the WebSocket chat server
//! - `client`: join the chat from the terminal

use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

use pubhub::config::load_config;
use pubhub::transport::{ChatMessage, ChatServer, ClientMessage, ServerMessage, start_chat_server};
use pubhub::utils::logging;

#[derive(Parser)]
#[command(name = "pubhub")]
enum Command {
    /// Start the WebSocket chat server
    Server,
    /// Join the chat. Lines typed are broadcast; `@alice,bob text` goes to the named users only
    Client {
        /// WebSocket server URL to connect to (default: ws://127.0.0.1:8080)
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Name to join as
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client { url, username } => {
            logging::init("warn");
            if let Err(e) = run_client(&url, username).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.log.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = Arc::new(ChatServer::from_settings(&config.hub)?);
    info!(
        concurrency = config.hub.concurrency,
        allow_duplicate_ids = config.hub.allow_duplicate_ids,
        "hub ready"
    );

    tokio::select! {
        result = start_chat_server(&addr, server.clone()) => {
            error!("Chat server exited unexpectedly.");
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            server.shutdown().await?;
        }
    }

    Ok(())
}

async fn run_client(url: &str, username: String) -> Result<(), Box<dyn std::error::Error>> {
    let (ws_stream, _response) = connect_async(url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let join = serde_json::to_string(&ClientMessage::Join { username })?;
    ws_sender.send(WsMessage::text(join)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let Some(frame) = incoming else { break };
                match frame? {
                    WsMessage::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => print_server_message(message),
                        Err(e) => warn!(error = %e, "unreadable server message"),
                    },
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(request) = parse_input(&line) else { continue };
                ws_sender
                    .send(WsMessage::text(serde_json::to_string(&request)?))
                    .await?;
            }
        }
    }

    let _ = ws_sender.close().await;
    Ok(())
}

/// `@a,b text` addresses users a and b, `/history` asks for the history,
/// anything else is broadcast. Blank lines are ignored.
fn parse_input(line: &str) -> Option<ClientMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/history" {
        return Some(ClientMessage::History);
    }
    if let Some(rest) = line.strip_prefix('@') {
        let (targets, body) = rest.split_once(' ').unwrap_or((rest, ""));
        let to = targets
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        return Some(ClientMessage::Direct {
            to,
            body: body.trim().to_string(),
        });
    }
    Some(ClientMessage::Send {
        body: line.to_string(),
    })
}

fn print_server_message(message: ServerMessage) {
    match message {
        ServerMessage::Joined { username, history } => {
            println!("joined as {username}");
            history.iter().for_each(print_chat_message);
        }
        ServerMessage::Message { message } => print_chat_message(&message),
        ServerMessage::History { messages } => messages.iter().for_each(print_chat_message),
        ServerMessage::Error { message } => println!("error: {message}"),
    }
}

fn print_chat_message(message: &ChatMessage) {
    let time = chrono::DateTime::from_timestamp_millis(message.sent_at)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!("[{time}] {}: {}", message.username, message.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_recognises_commands() {
        assert_eq!(parse_input("   "), None);
        assert_eq!(parse_input("/history"), Some(ClientMessage::History));
        assert_eq!(
            parse_input("hello there"),
            Some(ClientMessage::Send {
                body: "hello there".to_string()
            })
        );
        assert_eq!(
            parse_input("@alice,bob  psst"),
            Some(ClientMessage::Direct {
                to: vec!["alice".to_string(), "bob".to_string()],
                body: "psst".to_string()
            })
        );
    }
}
