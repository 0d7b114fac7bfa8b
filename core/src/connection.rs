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

//! Transport seam: connection and provider contracts
//!
//! The engine never touches sockets. A transport crate implements
//! [`Connection`] for its bidirectional channel and [`Provider`] for the
//! listener, and reports lifecycle through the typed [`TransportEvent`]
//! stream. The provider to use is chosen by an injected [`ProviderFactory`]
//! constructed at startup.

use crate::types::ConnectionId;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A single bidirectional transport channel
///
/// Implementations wrap the concrete socket technology; the engine depends
/// only on this contract.
#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Get the connection's opaque identifier
    fn id(&self) -> ConnectionId;

    /// Write a text payload to the peer
    async fn send(&self, payload: String) -> Result<()>;

    /// Check whether the channel currently accepts writes
    fn is_writable(&self) -> bool;

    /// Terminate the channel
    async fn stop(&self);
}

/// Lifecycle notifications flowing from a provider to the engine
#[derive(Debug)]
pub enum TransportEvent {
    /// A peer completed its handshake
    Connected(Arc<dyn Connection>),
    /// A text message arrived on an open connection
    Data {
        /// Id of the connection the payload arrived on
        id: ConnectionId,
        /// Raw wire payload
        payload: String,
    },
    /// A connection closed (peer-initiated or local)
    Closed {
        /// Id of the closed connection
        id: ConnectionId,
    },
}

/// A transport listener owning the concrete socket technology
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start accepting connections, reporting them on the given channel
    ///
    /// The provider owns its accept loop; events must stop flowing after
    /// [`Provider::stop`] returns.
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<()>;

    /// Stop accepting and tear down the listener
    async fn stop(&self) -> Result<()>;
}

/// Factory the server calls on [`start`](crate::SocketsServer::start) to
/// obtain its provider
///
/// Injected at construction; replaces registry-by-name provider selection.
pub type ProviderFactory = Box<dyn Fn() -> Arc<dyn Provider> + Send + Sync>;
