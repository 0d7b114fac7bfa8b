//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! WebSocket transport provider
//!
//! Binds a TCP listener and accepts WebSocket handshakes until stopped.
//! Each accepted socket gets a writer task draining its outbound channel
//! and a read pump that reports text frames (and the eventual close) as
//! transport events.

use crate::config::WsConfig;
use crate::connection::WsConnection;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use sockwire_core::{
    Connection, ConnectionId, Provider, ProviderFactory, Result, SocketsError, TransportEvent,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Build a [`ProviderFactory`] producing WebSocket providers
///
/// The factory is what the engine's server calls on start; every call
/// produces a fresh provider with the given configuration.
pub fn ws_provider_factory(config: WsConfig) -> ProviderFactory {
    Box::new(move || Arc::new(WsProvider::new(config.clone())))
}

/// WebSocket transport provider
pub struct WsProvider {
    config: WsConfig,
    running: AtomicBool,
    shutdown: Arc<Notify>,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
    bound_address: std::sync::Mutex<Option<SocketAddr>>,
}

impl WsProvider {
    /// Create a provider; the listener binds on [`Provider::start`]
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            accept_handle: Mutex::new(None),
            bound_address: std::sync::Mutex::new(None),
        }
    }

    /// Get the address the listener actually bound to
    ///
    /// `None` until the provider has started. Useful with a `:0` bind.
    pub fn bound_address(&self) -> Option<SocketAddr> {
        *self.bound_address.lock().expect("address lock poisoned")
    }

    async fn accept_loop(
        config: WsConfig,
        listener: TcpListener,
        events: mpsc::Sender<TransportEvent>,
        shutdown: Arc<Notify>,
    ) {
        loop {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = shutdown.notified() => break,
            };

            match accepted {
                Ok((socket, peer_addr)) => {
                    debug!(peer = %peer_addr, "accepted tcp connection");
                    let events = events.clone();
                    let buffer = config.outgoing_buffer;
                    tokio::spawn(async move {
                        if let Err(err) = serve_socket(socket, buffer, events).await {
                            warn!(peer = %peer_addr, error = %err, "websocket handshake failed");
                        }
                    });
                }
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                    // back off to avoid a tight error loop
                    tokio::time::sleep(config.accept_backoff).await;
                }
            }
        }

        info!("accept loop terminated");
    }
}

#[async_trait]
impl Provider for WsProvider {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|err| SocketsError::Provider(err.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| SocketsError::Provider(err.to_string()))?;
        *self.bound_address.lock().expect("address lock poisoned") = Some(local_addr);

        info!(addr = %local_addr, "websocket provider listening");

        let handle = tokio::spawn(Self::accept_loop(
            self.config.clone(),
            listener,
            events,
            self.shutdown.clone(),
        ));
        *self.accept_handle.lock().await = Some(handle);

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.shutdown.notify_waiters();
        if let Some(handle) = self.accept_handle.lock().await.take() {
            handle.abort();
        }

        info!("websocket provider stopped");
        Ok(())
    }
}

impl std::fmt::Debug for WsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsProvider")
            .field("bind_address", &self.config.bind_address)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

/// Run the handshake and pumps for one accepted socket
async fn serve_socket(
    socket: TcpStream,
    outgoing_buffer: usize,
    events: mpsc::Sender<TransportEvent>,
) -> Result<()> {
    let stream = accept_async(socket)
        .await
        .map_err(|err| SocketsError::Provider(err.to_string()))?;

    let id = ConnectionId::from(uuid::Uuid::new_v4().to_string());
    let (out_tx, out_rx) = mpsc::channel(outgoing_buffer);
    let open = Arc::new(AtomicBool::new(true));

    let conn: Arc<dyn Connection> =
        Arc::new(WsConnection::new(id.clone(), out_tx, open.clone()));

    counter!("sockwire.connections.total").increment(1);
    gauge!("sockwire.connections.active").increment(1.0);
    info!(conn_id = %id, "websocket connection established");

    let (sink, source) = stream.split();
    let writer = tokio::spawn(write_pump(sink, out_rx));

    if events.send(TransportEvent::Connected(conn)).await.is_err() {
        // the engine is gone; nothing to serve
        writer.abort();
        return Ok(());
    }

    read_pump(id.clone(), source, &events).await;

    open.store(false, Ordering::SeqCst);
    let _ = events.send(TransportEvent::Closed { id: id.clone() }).await;

    gauge!("sockwire.connections.active").decrement(1.0);
    debug!(conn_id = %id, "websocket connection finished");

    Ok(())
}

/// Forward text frames to the engine until the socket closes
async fn read_pump(
    id: ConnectionId,
    mut source: futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    events: &mpsc::Sender<TransportEvent>,
) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(payload)) => {
                counter!("sockwire.messages.received").increment(1);
                let event = TransportEvent::Data {
                    id: id.clone(),
                    payload,
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!(conn_id = %id, "peer sent close frame");
                break;
            }
            Ok(Message::Binary(_)) => {
                // the wire envelope is text-only
                debug!(conn_id = %id, "ignoring binary frame");
            }
            Ok(_) => {
                // ping/pong handled by tungstenite
            }
            Err(err) => {
                debug!(conn_id = %id, error = %err, "websocket read failed");
                break;
            }
        }
    }
}

/// Drain the outbound channel into the socket
async fn write_pump(
    mut sink: futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    mut out_rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = out_rx.recv().await {
        let closing = matches!(message, Message::Close(_));

        if let Err(err) = sink.send(message).await {
            debug!(error = %err, "websocket write failed");
            break;
        }
        counter!("sockwire.messages.sent").increment(1);

        if closing {
            break;
        }
    }
}
