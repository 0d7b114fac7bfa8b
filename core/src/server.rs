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

//! The sockets server orchestrator
//!
//! The server is the single point of configuration and connection
//! bookkeeping. It drives the per-message protocol: on accept it registers
//! the connection and (unless external-session mode is configured)
//! asynchronously creates and binds a session; inbound messages flow through
//! the per-connection worker to routing, the socketware chain, the token
//! check and finally the handler.

use crate::broadcaster::{BroadcastOutcome, Broadcaster};
use crate::config::ServerConfig;
use crate::connection::{Connection, Provider, ProviderFactory, TransportEvent};
use crate::handler::{ContextOps, HandlerMap, RequestHandler, RequestHandling};
use crate::metrics::ServerMetrics;
use crate::registry::SessionRegistry;
use crate::router::RequestMapper;
use crate::session::Session;
use crate::socketware::{Socketware, SocketwarePipeline};
use crate::types::{ConnectionId, ConnectionState, ServerEvent};
use crate::worker::{ConnMessage, ConnectionWorker};
use crate::{Result, SocketsError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use sockwire_envelope::ResponseEnvelope;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A registered connection and its worker plumbing
pub(crate) struct ConnectionEntry {
    pub(crate) conn: Arc<dyn Connection>,
    pub(crate) control_tx: mpsc::Sender<ConnMessage>,
    pub(crate) state: Arc<AtomicU8>,
    worker_handle: JoinHandle<()>,
}

/// Shared server internals
///
/// Owned behind an `Arc` by the public handle, the transport pump and every
/// connection worker.
pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) properties: DashMap<String, Value>,
    pub(crate) router: RwLock<RequestMapper>,
    pub(crate) wares: RwLock<SocketwarePipeline>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) connections: DashMap<ConnectionId, ConnectionEntry>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) metrics: Arc<ServerMetrics>,
    events: broadcast::Sender<ServerEvent>,
    running: AtomicBool,
    provider_factory: ProviderFactory,
    provider: Mutex<Option<Arc<dyn Provider>>>,
    pump_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ServerInner {
    /// Broadcast a server event; lagging or absent observers are ignored
    pub(crate) fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    /// Check the running flag
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Find the session bound to a connection id
    pub(crate) fn find_session_for(&self, conn_id: &ConnectionId) -> Option<Arc<Session>> {
        self.sessions.find(
            &self.config.session_id_key,
            &Value::String(conn_id.as_str().to_string()),
        )
    }

    /// Write an outbound envelope to a live connection
    async fn publish_envelope(
        &self,
        conn_id: &ConnectionId,
        resource: &str,
        data: Value,
        is_error: bool,
        client_id: Option<String>,
    ) -> Result<()> {
        if !self.is_running() {
            return Err(SocketsError::ServerNotRunning);
        }

        let conn = self
            .connections
            .get(conn_id)
            .map(|entry| entry.conn.clone())
            .ok_or_else(|| SocketsError::ConnectionNotFound(conn_id.clone()))?;

        let envelope = ResponseEnvelope::new(resource, data)
            .with_error(is_error)
            .with_client_id(client_id);

        debug!(conn_id = %conn_id, resource = %resource, "publishing message");

        if self.broadcaster.publish_to_connection(&envelope, &conn).await? {
            self.metrics.message_published();
        }
        Ok(())
    }

    /// React to one transport event
    async fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Connected(conn) => self.on_incoming_connection(conn).await,
            TransportEvent::Data { id, payload } => {
                let control_tx = self
                    .connections
                    .get(&id)
                    .map(|entry| entry.control_tx.clone());
                match control_tx {
                    Some(tx) => {
                        if tx.send(ConnMessage::Data(payload)).await.is_err() {
                            debug!(conn_id = %id, "worker gone, dropping message");
                        }
                    }
                    None => debug!(conn_id = %id, "data on unknown connection"),
                }
            }
            TransportEvent::Closed { id } => {
                let control_tx = self
                    .connections
                    .get(&id)
                    .map(|entry| entry.control_tx.clone());
                if let Some(tx) = control_tx {
                    let _ = tx.send(ConnMessage::Close).await;
                }
            }
        }
    }

    /// Register a new connection and kick off session creation
    async fn on_incoming_connection(self: &Arc<Self>, conn: Arc<dyn Connection>) {
        let id = conn.id();

        if self.connections.contains_key(&id) {
            warn!(conn_id = %id, "duplicate connection id from provider, ignoring");
            return;
        }

        debug!(conn_id = %id, "incoming connection");

        let state = Arc::new(AtomicU8::new(ConnectionState::Accepting.as_u8()));
        let (worker, control_tx) =
            ConnectionWorker::new(conn.clone(), self.clone(), state.clone());
        let worker_handle = tokio::spawn(worker.run());

        self.connections.insert(
            id.clone(),
            ConnectionEntry {
                conn,
                control_tx: control_tx.clone(),
                state: state.clone(),
                worker_handle,
            },
        );
        self.metrics.connection_opened();

        // the connection handle itself is not leaked to observers
        self.emit(ServerEvent::ConnectionOpened { id: id.clone() });

        if self.config.external_session {
            // the caller supplies sessions out-of-band; messages flow now
            let _ = control_tx.send(ConnMessage::Bound).await;
            return;
        }

        state.store(ConnectionState::Binding.as_u8(), Ordering::Release);

        let inner = self.clone();
        tokio::spawn(async move {
            let outcome = match inner.sessions.create_session().await {
                Ok(session) => session
                    .bind_connection(&inner.config.session_id_key, &id)
                    .map(|()| session),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(session) => {
                    inner.metrics.session_created();
                    inner.emit(ServerEvent::SessionCreated { session });
                    let _ = control_tx.send(ConnMessage::Bound).await;
                }
                Err(err) => {
                    let _ = control_tx.send(ConnMessage::BindFailed(err.to_string())).await;
                }
            }
        });
    }
}

#[async_trait]
impl ContextOps for ServerInner {
    async fn publish_to(
        &self,
        conn_id: &ConnectionId,
        resource: &str,
        data: Value,
        is_error: bool,
        client_id: Option<String>,
    ) -> Result<()> {
        self.publish_envelope(conn_id, resource, data, is_error, client_id)
            .await
    }

    fn attach_session(
        &self,
        conn_id: &ConnectionId,
        key: &str,
        value: &Value,
    ) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .find(key, value)
            .ok_or_else(|| SocketsError::SessionNotFound {
                key: key.to_string(),
                value: value.to_string(),
            })?;

        session.bind_connection(&self.config.session_id_key, conn_id)?;
        Ok(session)
    }

    fn property(&self, key: &str) -> Option<Value> {
        self.properties.get(key).map(|entry| entry.value().clone())
    }
}

/// Builder for a [`SocketsServer`]
///
/// # Example
///
/// ```no_run
/// use sockwire_core::{ServerBuilder, ServerConfig};
///
/// # fn provider_factory() -> sockwire_core::ProviderFactory { unimplemented!() }
/// let server = ServerBuilder::new(provider_factory())
///     .with_config(ServerConfig::default().with_silent_fail(true))
///     .build()
///     .unwrap();
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    provider_factory: ProviderFactory,
    handlers: HandlerMap,
    wares: Vec<(Arc<dyn Socketware>, Option<String>, Option<Value>)>,
}

impl ServerBuilder {
    /// Create a builder around the provider factory to use on start
    pub fn new(provider_factory: ProviderFactory) -> Self {
        Self {
            config: ServerConfig::default(),
            provider_factory,
            handlers: Vec::new(),
            wares: Vec::new(),
        }
    }

    /// Set the server configuration
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register initial request mappings
    pub fn with_request_handling(
        mut self,
        mappings: impl IntoIterator<Item = (String, Arc<dyn RequestHandler>)>,
    ) -> Self {
        self.handlers.extend(mappings);
        self
    }

    /// Register an initial socketware
    pub fn with_socketware(
        mut self,
        ware: Arc<dyn Socketware>,
        name: Option<String>,
        options: Option<Value>,
    ) -> Self {
        self.wares.push((ware, name, options));
        self
    }

    /// Build the server
    ///
    /// Invalid initial mappings or socketware registrations fail here.
    pub fn build(self) -> Result<SocketsServer> {
        let sessions = SessionRegistry::new(&self.config)?;

        let mut router = RequestMapper::new();
        router.add_mappings(self.handlers)?;

        let mut wares = SocketwarePipeline::new();
        wares.add_all(self.wares)?;

        let (events, _) = broadcast::channel(self.config.event_channel_capacity.max(1));

        Ok(SocketsServer {
            inner: Arc::new(ServerInner {
                config: self.config,
                properties: DashMap::new(),
                router: RwLock::new(router),
                wares: RwLock::new(wares),
                sessions,
                connections: DashMap::new(),
                broadcaster: Broadcaster::new(),
                metrics: Arc::new(ServerMetrics::new()),
                events,
                running: AtomicBool::new(false),
                provider_factory: self.provider_factory,
                provider: Mutex::new(None),
                pump_handle: Mutex::new(None),
            }),
        })
    }
}

/// The sockets server
///
/// Cloning produces another handle to the same server.
#[derive(Clone)]
pub struct SocketsServer {
    inner: Arc<ServerInner>,
}

impl SocketsServer {
    /// Start the server
    ///
    /// Instantiates the transport provider and begins processing its
    /// events. Starting an already-running server is a logged no-op, not an
    /// error.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            info!("start called while server is already running");
            return Ok(());
        }

        let provider = (self.inner.provider_factory)();
        let (events_tx, mut events_rx) = mpsc::channel(128);

        if let Err(err) = provider.start(events_tx).await {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        *self.inner.provider.lock().await = Some(provider);

        let inner = self.inner.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                inner.handle_transport_event(event).await;
            }
            debug!("transport event stream ended");
        });
        *self.inner.pump_handle.lock().await = Some(pump);

        info!("sockets server started");
        Ok(())
    }

    /// Stop the server
    ///
    /// Forcibly terminates all open connections, stops the provider and
    /// clears internal state. Stopping a non-running server is a logged
    /// no-op, not an error.
    pub async fn stop(&self) -> Result<()> {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            info!("stop called while server is not running");
            return Ok(());
        }

        info!("stopping sockets server");

        let provider = self.inner.provider.lock().await.take();
        let provider_result = match provider {
            Some(provider) => provider.stop().await,
            None => Ok(()),
        };

        if let Some(pump) = self.inner.pump_handle.lock().await.take() {
            pump.abort();
        }

        let ids: Vec<ConnectionId> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for id in ids {
            if let Some((_, entry)) = self.inner.connections.remove(&id) {
                entry.conn.stop().await;
                entry.worker_handle.abort();
                entry
                    .state
                    .store(ConnectionState::Closed.as_u8(), Ordering::Release);
                self.inner.metrics.connection_closed();

                if let Some(session) = self.inner.find_session_for(&id) {
                    self.inner.emit(ServerEvent::SessionDestroying {
                        session: session.clone(),
                    });
                    self.inner.sessions.destroy_session(&session.id().clone());
                    self.inner.metrics.session_destroyed();
                }
            }
        }

        self.inner.sessions.clear();

        if let Err(err) = &provider_result {
            error!(error = %err, "transport provider failed to stop cleanly");
        }
        info!("sockets server stopped");

        provider_result
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Register a socketware with an auto-generated name
    pub fn use_ware(&self, ware: Arc<dyn Socketware>) -> Result<()> {
        self.use_ware_named(ware, None, None)
    }

    /// Register a socketware with an explicit name and options
    pub fn use_ware_named(
        &self,
        ware: Arc<dyn Socketware>,
        name: Option<String>,
        options: Option<Value>,
    ) -> Result<()> {
        self.inner
            .wares
            .write()
            .expect("socketware lock poisoned")
            .add(ware, name, options)
    }

    /// Register a batch of socketwares in order
    pub fn use_wares(
        &self,
        wares: impl IntoIterator<Item = (Arc<dyn Socketware>, Option<String>, Option<Value>)>,
    ) -> Result<()> {
        self.inner
            .wares
            .write()
            .expect("socketware lock poisoned")
            .add_all(wares)
    }

    /// Register request mappings
    pub fn add_request_handling(
        &self,
        mappings: impl IntoIterator<Item = (String, Arc<dyn RequestHandler>)>,
    ) -> Result<()> {
        self.inner
            .router
            .write()
            .expect("router lock poisoned")
            .add_mappings(mappings)
    }

    /// Register every mapping contributed by a handler source
    pub fn add_request_source(&self, source: &dyn RequestHandling) -> Result<()> {
        self.add_request_handling(source.map())
    }

    /// Publish to the connection a session is bound to
    pub async fn publish(
        &self,
        session: &Session,
        resource: &str,
        data: Value,
        is_error: bool,
        client_id: Option<String>,
    ) -> Result<()> {
        let conn_id = session
            .bound_connection(&self.inner.config.session_id_key)
            .ok_or(SocketsError::SessionUnbound)?;

        self.publish_to_connection(&conn_id, resource, data, is_error, client_id)
            .await
    }

    /// Publish to a connection by id
    ///
    /// Fails when the server is not running or no live connection exists
    /// for the id.
    pub async fn publish_to_connection(
        &self,
        conn_id: &ConnectionId,
        resource: &str,
        data: Value,
        is_error: bool,
        client_id: Option<String>,
    ) -> Result<()> {
        self.inner
            .publish_envelope(conn_id, resource, data, is_error, client_id)
            .await
    }

    /// Publish one envelope to every live connection
    ///
    /// Non-writable connections are skipped per the broadcaster contract.
    pub async fn broadcast(
        &self,
        resource: &str,
        data: Value,
        is_error: bool,
    ) -> Result<BroadcastOutcome> {
        if !self.inner.is_running() {
            return Err(SocketsError::ServerNotRunning);
        }

        let connections: Vec<Arc<dyn Connection>> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.conn.clone())
            .collect();

        let envelope = ResponseEnvelope::new(resource, data).with_error(is_error);
        self.inner.broadcaster.broadcast(&envelope, &connections).await
    }

    /// Get a live connection handle by id
    pub fn connection(&self, conn_id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.inner
            .connections
            .get(conn_id)
            .map(|entry| entry.conn.clone())
    }

    /// Get the session registry
    ///
    /// External-session deployments use this to register sessions created
    /// out-of-band.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Subscribe to server events
    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// Set a server extension property
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.inner.properties.insert(key.into(), value);
    }

    /// Remove a server extension property
    pub fn remove_property(&self, key: &str) -> Option<Value> {
        self.inner.properties.remove(key).map(|(_, value)| value)
    }

    /// Read a server extension property
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner.property(key)
    }

    /// Check if an extension property is boolean `true`
    pub fn property_enabled(&self, key: &str) -> bool {
        self.property(key) == Some(Value::Bool(true))
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Get the number of live sessions
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.inner.metrics.clone()
    }
}

impl std::fmt::Debug for SocketsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketsServer")
            .field("running", &self.is_running())
            .field("connections", &self.connection_count())
            .field("sessions", &self.session_count())
            .finish()
    }
}
