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

//! Sockwire Orchestration Engine
//!
//! This crate provides a transport-agnostic request/response layer over
//! persistent bidirectional socket connections:
//!
//! - Connection lifecycle management with at-most-one session per connection
//! - Asynchronous session creation with an optional token security check
//! - Request routing over verb-qualified path patterns with named captures
//! - An ordered socketware (middleware) chain ahead of every dispatch
//! - Writability-gated publishing to one or many connections
//!
//! # Architecture
//!
//! ```text
//! Provider (transport crate)
//!     ↓ TransportEvent
//! SocketsServer
//!     ↓
//! ConnectionWorker → socketware chain → token check → handler
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sockwire_core::{handler_fn, ServerBuilder, ServerConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn provider_factory() -> sockwire_core::ProviderFactory { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerBuilder::new(provider_factory())
//!         .with_config(ServerConfig::default())
//!         .build()?;
//!
//!     server.add_request_handling([(
//!         "<GET>/items/:id".to_string(),
//!         handler_fn(|request, context| async move {
//!             let id = context.path.keys.get("id").cloned().unwrap_or_default();
//!             context.publish(json!({ "id": id }), false).await.ok();
//!             let _ = request;
//!         }),
//!     )])?;
//!
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod broadcaster;
mod config;
mod connection;
mod error;
mod handler;
mod metrics;
mod registry;
mod router;
mod server;
mod session;
mod socketware;
mod tokenizer;
mod types;
mod worker;

pub use broadcaster::{BroadcastOutcome, Broadcaster};
pub use config::ServerConfig;
pub use connection::{Connection, Provider, ProviderFactory, TransportEvent};
pub use error::{Result, SocketsError};
pub use handler::{
    handler_fn, FnRequestHandler, HandlerContext, HandlerMap, RequestHandler, RequestHandling,
};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::SessionRegistry;
pub use router::{RequestMapper, ResolvedHandler};
pub use server::{ServerBuilder, SocketsServer};
pub use session::{Session, SECURITY_CHECKED_KEY};
pub use socketware::{ware_fn, FnSocketware, Socketware, SocketwareEntry, SocketwarePipeline};
pub use tokenizer::{salt_length, TokenMaterial, Tokenizer};
pub use types::{ConnectionId, ConnectionState, PathInfo, ServerEvent, SessionId};

pub use sockwire_envelope::{RequestEnvelope, ResponseEnvelope, Verb, CLIENT_REQUEST_ID_KEY};
