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

//! Socketware: the ordered interceptor chain ahead of dispatch
//!
//! Every routed message runs through the registered socketwares strictly in
//! registration order, one entry at a time. The first error aborts the
//! remaining chain and fails the message; the handler is invoked only when
//! every entry completed.

use crate::handler::HandlerContext;
use crate::{Result, SocketsError};
use async_trait::async_trait;
use serde_json::Value;
use sockwire_envelope::RequestEnvelope;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// An interceptor run before the matched handler
///
/// Implement the trait directly, or wrap an async closure with [`ware_fn`].
/// Returning an error aborts the chain for the current message.
#[async_trait]
pub trait Socketware: Send + Sync + 'static {
    /// Process one message before dispatch
    async fn handle(&self, request: RequestEnvelope, context: HandlerContext) -> Result<()>;
}

/// Closure adapter implementing [`Socketware`]
pub struct FnSocketware<F>(F);

#[async_trait]
impl<F, Fut> Socketware for FnSocketware<F>
where
    F: Fn(RequestEnvelope, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, request: RequestEnvelope, context: HandlerContext) -> Result<()> {
        (self.0)(request, context).await
    }
}

/// Wrap an async closure as a shareable [`Socketware`]
pub fn ware_fn<F, Fut>(f: F) -> Arc<dyn Socketware>
where
    F: Fn(RequestEnvelope, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnSocketware(f))
}

/// A registered socketware with its name and registration options
#[derive(Clone)]
pub struct SocketwareEntry {
    name: String,
    ware: Arc<dyn Socketware>,
    options: Value,
}

impl SocketwareEntry {
    /// Get the entry's unique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the options supplied at registration
    pub fn options(&self) -> &Value {
        &self.options
    }
}

impl std::fmt::Debug for SocketwareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketwareEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// The ordered socketware chain
#[derive(Default)]
pub struct SocketwarePipeline {
    entries: Vec<SocketwareEntry>,
    name_seq: AtomicU64,
}

impl SocketwarePipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socketware
    ///
    /// A missing name is auto-generated (`sw-1`, `sw-2`, …); an explicit
    /// name that is already registered is a configuration error, raised
    /// here rather than at dispatch.
    pub fn add(
        &mut self,
        ware: Arc<dyn Socketware>,
        name: Option<String>,
        options: Option<Value>,
    ) -> Result<()> {
        let name = match name {
            Some(name) => name,
            None => format!("sw-{}", self.name_seq.fetch_add(1, Ordering::Relaxed) + 1),
        };

        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(SocketsError::DuplicateSocketware(name));
        }

        debug!(name = %name, "registering socketware");

        self.entries.push(SocketwareEntry {
            name,
            ware,
            options: options.unwrap_or(Value::Null),
        });
        Ok(())
    }

    /// Register a batch of socketwares in order
    pub fn add_all(
        &mut self,
        wares: impl IntoIterator<Item = (Arc<dyn Socketware>, Option<String>, Option<Value>)>,
    ) -> Result<()> {
        for (ware, name, options) in wares {
            self.add(ware, name, options)?;
        }
        Ok(())
    }

    /// Get the number of registered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the registered names in execution order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Clone the entry list for lock-free execution
    pub fn snapshot(&self) -> Vec<SocketwareEntry> {
        self.entries.clone()
    }

    /// Run the chain for one message
    ///
    /// `make_context` is invoked before each entry so a socketware that
    /// attached a session mid-chain is visible to the entries after it.
    pub async fn run<F>(&self, request: &RequestEnvelope, make_context: F) -> Result<()>
    where
        F: Fn() -> HandlerContext,
    {
        Self::run_entries(&self.entries, request, make_context).await
    }

    /// Run a snapshot of entries for one message
    pub async fn run_entries<F>(
        entries: &[SocketwareEntry],
        request: &RequestEnvelope,
        make_context: F,
    ) -> Result<()>
    where
        F: Fn() -> HandlerContext,
    {
        for entry in entries {
            entry
                .ware
                .handle(request.clone(), make_context())
                .await
                .map_err(|err| SocketsError::SocketwareFailed {
                    name: entry.name.clone(),
                    message: err.to_string(),
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SocketwarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketwarePipeline")
            .field("entries", &self.names())
            .finish()
    }
}
