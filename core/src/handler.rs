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

//! Request handler traits and the per-request helper bundle
//!
//! A handler is invoked once per routed message, after the socketware chain
//! and the token check, with the parsed request and a [`HandlerContext`]
//! carrying the resolved path captures, the connection's session and the
//! publish/attach helpers.

use crate::session::Session;
use crate::types::{ConnectionId, PathInfo};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use sockwire_envelope::RequestEnvelope;
use std::future::Future;
use std::sync::Arc;

/// Handles a routed request
///
/// Implement the trait directly, or wrap an async closure with
/// [`handler_fn`].
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Process one routed request
    async fn handle(&self, request: RequestEnvelope, context: HandlerContext);
}

/// A named source of request mappings
///
/// The mapping keys use the `<VERB>path` syntax accepted by
/// [`RequestMapper::add_mapping`](crate::RequestMapper::add_mapping).
pub trait RequestHandling {
    /// Produce the mappings this source contributes
    fn map(&self) -> HandlerMap;
}

/// A batch of `(key, handler)` request mappings
pub type HandlerMap = Vec<(String, Arc<dyn RequestHandler>)>;

/// Closure adapter implementing [`RequestHandler`]
pub struct FnRequestHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnRequestHandler<F>
where
    F: Fn(RequestEnvelope, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, request: RequestEnvelope, context: HandlerContext) {
        (self.0)(request, context).await;
    }
}

/// Wrap an async closure as a shareable [`RequestHandler`]
///
/// # Examples
///
/// ```
/// use sockwire_core::handler_fn;
/// use serde_json::json;
///
/// let handler = handler_fn(|_request, context| async move {
///     context.publish(json!({"ok": true}), false).await.ok();
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(RequestEnvelope, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnRequestHandler(f))
}

/// Server-side operations the helper bundle delegates to
#[async_trait]
pub(crate) trait ContextOps: Send + Sync {
    /// Publish an outbound envelope to a connection by id
    async fn publish_to(
        &self,
        conn_id: &ConnectionId,
        resource: &str,
        data: Value,
        is_error: bool,
        client_id: Option<String>,
    ) -> Result<()>;

    /// Find a session by property and bind it to a connection
    fn attach_session(
        &self,
        conn_id: &ConnectionId,
        key: &str,
        value: &Value,
    ) -> Result<Arc<Session>>;

    /// Read a server extension property
    fn property(&self, key: &str) -> Option<Value>;
}

/// Helper bundle handed to socketwares and handlers for one request
///
/// Cloning is cheap; every clone refers to the same request context.
#[derive(Clone)]
pub struct HandlerContext {
    conn_id: ConnectionId,
    resource: String,
    client_id: Option<String>,
    /// Resolved path information for the routed request
    pub path: PathInfo,
    /// The session bound to the connection, when one exists
    pub session: Option<Arc<Session>>,
    ops: Arc<dyn ContextOps>,
}

impl HandlerContext {
    pub(crate) fn new(
        ops: Arc<dyn ContextOps>,
        conn_id: ConnectionId,
        resource: String,
        client_id: Option<String>,
        path: PathInfo,
        session: Option<Arc<Session>>,
    ) -> Self {
        Self {
            conn_id,
            resource,
            client_id,
            path,
            session,
            ops,
        }
    }

    /// Get the id of the connection the request arrived on
    pub fn connection_id(&self) -> &ConnectionId {
        &self.conn_id
    }

    /// Reply on the resource the request targeted
    ///
    /// The client correlation id, when the request carried one, is echoed
    /// on the reply.
    pub async fn publish(&self, data: Value, is_error: bool) -> Result<()> {
        let resource = self.resource.clone();
        self.publish_on(&resource, data, is_error).await
    }

    /// Reply on an explicit resource
    pub async fn publish_on(&self, resource: &str, data: Value, is_error: bool) -> Result<()> {
        self.ops
            .publish_to(
                &self.conn_id,
                resource,
                data,
                is_error,
                self.client_id.clone(),
            )
            .await
    }

    /// Attach an existing session to the request's connection
    ///
    /// The session is located by property `key` equal to `value` and bound
    /// to this connection atomically. Binding fails if the session is
    /// already attached to a different connection, or if no session
    /// matches.
    pub fn attach_session(&self, key: &str, value: &Value) -> Result<Arc<Session>> {
        self.ops.attach_session(&self.conn_id, key, value)
    }

    /// Read a server extension property
    pub fn property(&self, key: &str) -> Option<Value> {
        self.ops.property(key)
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("conn_id", &self.conn_id)
            .field("resource", &self.resource)
            .field("path", &self.path)
            .field("session", &self.session.as_ref().map(|s| s.id().clone()))
            .finish()
    }
}
