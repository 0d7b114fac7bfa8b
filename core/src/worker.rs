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

//! Per-connection worker
//!
//! Each connection gets one worker task owning an explicit state machine
//! (Accepting → Binding → Ready → Closing → Closed). Session creation and
//! first-message arrival are unordered: messages arriving before the
//! session bind completes are queued (bounded) and drained once the worker
//! reaches Ready. Messages are processed strictly in arrival order, one in
//! flight per connection; messages on different connections interleave
//! freely.

use crate::connection::Connection;
use crate::handler::HandlerContext;
use crate::server::ServerInner;
use crate::session::Session;
use crate::socketware::SocketwarePipeline;
use crate::types::{ConnectionId, ConnectionState, ServerEvent};
use crate::{RequestEnvelope, Result, SocketsError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Control messages delivered to a connection worker
#[derive(Debug)]
pub(crate) enum ConnMessage {
    /// A raw payload arrived on the connection
    Data(String),
    /// Session creation and binding completed (or was not required)
    Bound,
    /// Session creation or binding failed
    BindFailed(String),
    /// The connection closed
    Close,
}

/// Worker that serializes all processing for a single connection
pub(crate) struct ConnectionWorker {
    id: ConnectionId,
    conn: Arc<dyn Connection>,
    inner: Arc<ServerInner>,
    state: Arc<AtomicU8>,
    control_rx: mpsc::Receiver<ConnMessage>,
    pending: VecDeque<String>,
}

impl ConnectionWorker {
    /// Create a worker and its control channel sender
    pub(crate) fn new(
        conn: Arc<dyn Connection>,
        inner: Arc<ServerInner>,
        state: Arc<AtomicU8>,
    ) -> (Self, mpsc::Sender<ConnMessage>) {
        let capacity = inner.config.pending_message_limit.max(16);
        let (control_tx, control_rx) = mpsc::channel(capacity);

        let worker = Self {
            id: conn.id(),
            conn,
            inner,
            state,
            control_rx,
            pending: VecDeque::new(),
        };

        (worker, control_tx)
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Run the worker event loop until the connection closes
    pub(crate) async fn run(mut self) {
        while let Some(message) = self.control_rx.recv().await {
            match message {
                ConnMessage::Data(payload) => self.on_data(payload).await,
                ConnMessage::Bound => self.on_bound().await,
                ConnMessage::BindFailed(reason) => self.on_bind_failed(reason).await,
                ConnMessage::Close => {
                    self.close().await;
                }
            }

            if self.state().is_terminal() {
                break;
            }
        }

        debug!(conn_id = %self.id, "connection worker terminated");
    }

    async fn on_data(&mut self, payload: String) {
        match self.state() {
            ConnectionState::Ready => self.process_message(payload).await,
            ConnectionState::Accepting | ConnectionState::Binding => {
                if self.pending.len() >= self.inner.config.pending_message_limit {
                    self.handle_failure(SocketsError::PendingQueueOverflow(self.id.clone()))
                        .await;
                } else {
                    debug!(conn_id = %self.id, "queueing message until session bind completes");
                    self.pending.push_back(payload);
                }
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                debug!(conn_id = %self.id, "dropping message on closing connection");
            }
        }
    }

    async fn on_bound(&mut self) {
        self.set_state(ConnectionState::Ready);

        while let Some(payload) = self.pending.pop_front() {
            self.process_message(payload).await;
            if self.state().is_terminal() {
                return;
            }
        }
    }

    async fn on_bind_failed(&mut self, reason: String) {
        if self.inner.config.silent_fail {
            // messages on this connection will fail their session lookup
            // individually and be dropped
            warn!(conn_id = %self.id, reason = %reason, "session bind failed, continuing session-less");
            self.on_bound().await;
        } else {
            error!(conn_id = %self.id, reason = %reason, "session bind failed, terminating connection");
            self.terminate().await;
        }
    }

    /// Process one inbound message end to end
    async fn process_message(&mut self, payload: String) {
        self.inner.metrics.message_received();
        self.inner.emit(ServerEvent::MessageReceived {
            id: self.id.clone(),
            payload: payload.clone(),
        });

        if let Err(err) = self.dispatch(&payload).await {
            self.handle_failure(err).await;
        }
    }

    async fn dispatch(&self, payload: &str) -> Result<()> {
        let mut session = self.inner.find_session_for(&self.id);

        if session.is_none() && !self.inner.config.external_session {
            return Err(SocketsError::SessionlessConnection(self.id.clone()));
        }

        let request = RequestEnvelope::parse(payload)?;

        let resolved = {
            let router = self.inner.router.read().expect("router lock poisoned");
            router.resolve(&request.resource, &request.method)
        };
        let resolved = resolved.ok_or_else(|| SocketsError::HandlerNotFound {
            method: request.method.to_string(),
            resource: request.resource.clone(),
        })?;

        let path_info = resolved.path_info();
        let client_id = request.client_request_id().map(str::to_string);

        let wares = {
            let pipeline = self.inner.wares.read().expect("socketware lock poisoned");
            pipeline.snapshot()
        };

        // a socketware may attach a session mid-chain, so each entry (and
        // the handler below) sees a freshly resolved session
        let make_context = || {
            let session = session
                .clone()
                .or_else(|| self.inner.find_session_for(&self.id));
            HandlerContext::new(
                self.inner.clone(),
                self.id.clone(),
                request.resource.clone(),
                client_id.clone(),
                path_info.clone(),
                session,
            )
        };

        SocketwarePipeline::run_entries(&wares, &request, &make_context).await?;

        session = session.or_else(|| self.inner.find_session_for(&self.id));

        self.check_request(&request, session.as_deref())?;

        let context = HandlerContext::new(
            self.inner.clone(),
            self.id.clone(),
            request.resource.clone(),
            client_id,
            path_info,
            session,
        );

        resolved.handler.handle(request, context).await;
        Ok(())
    }

    /// Enforce the token security check for one request
    ///
    /// A session that already passed the check is not re-validated.
    fn check_request(&self, request: &RequestEnvelope, session: Option<&Session>) -> Result<()> {
        let config = &self.inner.config;

        if !config.tokenize_connection {
            return Ok(());
        }

        let session = session.ok_or_else(|| SocketsError::SessionlessConnection(self.id.clone()))?;

        if !config.checks_token_on(&request.method) {
            return Ok(());
        }

        if session.security_checked() {
            return Ok(());
        }

        let token = request
            .metadata
            .get(&config.request_token_key)
            .and_then(Value::as_str)
            .ok_or_else(|| SocketsError::MissingToken(config.request_token_key.clone()))?;

        if session.is_valid(token)? {
            session.mark_security_checked()?;
            Ok(())
        } else {
            Err(SocketsError::InvalidToken)
        }
    }

    /// Route a processing failure through the silent-fail policy
    async fn handle_failure(&self, err: SocketsError) {
        self.inner.metrics.protocol_violation();

        if self.inner.config.silent_fail && err.is_silenceable() {
            warn!(conn_id = %self.id, error = %err, "dropping request");
        } else {
            error!(conn_id = %self.id, error = %err, "fatal protocol failure, terminating connection");
            self.terminate().await;
        }
    }

    /// Forcibly stop the connection and clean up its state
    async fn terminate(&self) {
        self.set_state(ConnectionState::Closing);
        self.conn.stop().await;
        self.cleanup().await;
        self.set_state(ConnectionState::Closed);
    }

    /// Handle a peer-initiated close
    async fn close(&self) {
        self.set_state(ConnectionState::Closing);
        self.cleanup().await;
        self.set_state(ConnectionState::Closed);
    }

    /// Remove the connection from the registry and destroy its session
    async fn cleanup(&self) {
        if self.inner.connections.remove(&self.id).is_none() {
            // already torn down by the server stop path
            return;
        }

        self.inner.metrics.connection_closed();

        if let Some(session) = self.inner.find_session_for(&self.id) {
            self.inner
                .emit(ServerEvent::SessionDestroying {
                    session: session.clone(),
                });
            self.inner.sessions.destroy_session(&session.id().clone());
            self.inner.metrics.session_destroyed();
        }

        debug!(conn_id = %self.id, "connection closed");
    }
}
