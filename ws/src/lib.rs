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

//! WebSocket transport provider for sockwire
//!
//! Implements the engine's [`Connection`](sockwire_core::Connection) and
//! [`Provider`](sockwire_core::Provider) contracts on top of
//! `tokio-tungstenite`. The provider owns a TCP accept loop; each accepted
//! socket runs the WebSocket handshake, then a read pump reporting text
//! frames as transport events and a writer task draining an outbound
//! channel.
//!
//! # Example
//!
//! ```no_run
//! use sockwire_core::ServerBuilder;
//! use sockwire_ws::{ws_provider_factory, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WsConfig::new("127.0.0.1:8080".parse()?);
//!     let server = ServerBuilder::new(ws_provider_factory(config)).build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod provider;

pub use config::WsConfig;
pub use connection::WsConnection;
pub use provider::{ws_provider_factory, WsProvider};
