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

//! WebSocket connection handle

use async_trait::async_trait;
use sockwire_core::{Connection, ConnectionId, Result, SocketsError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// A single accepted WebSocket connection
///
/// Writes go through an outbound channel drained by the connection's writer
/// task; the handle itself never touches the socket.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    outgoing: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
}

impl WsConnection {
    pub(crate) fn new(
        id: ConnectionId,
        outgoing: mpsc::Sender<Message>,
        open: Arc<AtomicBool>,
    ) -> Self {
        Self { id, outgoing, open }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id.clone()
    }

    async fn send(&self, payload: String) -> Result<()> {
        if !self.is_writable() {
            return Err(SocketsError::Provider(format!(
                "connection {} is closed",
                self.id
            )));
        }

        self.outgoing
            .send(Message::Text(payload))
            .await
            .map_err(|_| SocketsError::Provider(format!("writer for {} is gone", self.id)))
    }

    fn is_writable(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }

    async fn stop(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(conn_id = %self.id, "closing websocket connection");
            // best effort close frame; the read pump reports the closure
            let _ = self.outgoing.try_send(Message::Close(None));
        }
    }
}
