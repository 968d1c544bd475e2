//! TCP debug server
//!
//! One JSON command per line in, one JSON response per line out.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::protocol::{DebugCommand, DebugResponse};

/// Trait that the application implements to handle debug commands
pub trait DebugHandler: Send + Sync + 'static {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse;
}

/// Debug server handle - keep this alive to keep the server running
pub struct DebugServer {
    _handle: tokio::task::JoinHandle<()>,
}

impl DebugServer {
    /// Start the debug server on the given port.
    /// Returns immediately -- the accept loop runs on the current tokio runtime.
    pub fn start(handler: Arc<Mutex<dyn DebugHandler>>, port: u16) -> Self {
        let handle = tokio::spawn(async move {
            let addr = format!("127.0.0.1:{}", port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(l) => {
                    log::info!("Debug server listening on {}", addr);
                    l
                }
                Err(e) => {
                    log::error!("Failed to bind debug server on {}: {}", addr, e);
                    return;
                }
            };
            accept_loop(listener, handler).await;
        });

        Self { _handle: handle }
    }
}

async fn accept_loop(listener: TcpListener, handler: Arc<Mutex<dyn DebugHandler>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::info!("Debug client connected from {}", peer);
                let handler = handler.clone();
                tokio::spawn(async move {
                    serve_connection(stream, handler).await;
                    log::info!("Debug client disconnected: {}", peer);
                });
            }
            Err(e) => log::error!("Debug server accept error: {}", e),
        }
    }
}

/// Decode one request line and run it through the handler.
pub(crate) async fn respond(handler: &Mutex<dyn DebugHandler>, line: &str) -> String {
    let response = match DebugCommand::parse_line(line) {
        Ok(cmd) => {
            log::debug!("Debug command: {:?}", cmd);
            handler.lock().await.handle_command(cmd)
        }
        Err(e) => DebugResponse::error(e.to_string()),
    };

    let mut json = serde_json::to_string(&response).unwrap_or_else(|e| {
        format!("{{\"status\":\"error\",\"message\":\"Serialize error: {}\"}}", e)
    });
    json.push('\n');
    json
}

async fn serve_connection(stream: TcpStream, handler: Arc<Mutex<dyn DebugHandler>>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) if line.trim().is_empty() => continue,
            Ok(_) => {
                let reply = respond(&handler, &line).await;
                if let Err(e) = writer.write_all(reply.as_bytes()).await {
                    log::error!("Debug server write error: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    log::error!("Debug server flush error: {}", e);
                    break;
                }
            }
            Err(e) => {
                log::error!("Debug server read error: {}", e);
                break;
            }
        }
    }
}
