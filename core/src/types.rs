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

//! Core types for the sockwire engine

use crate::session::Session;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier for a connection
///
/// Connection ids are assigned by the transport provider and unique for the
/// lifetime of the server; the registry holds at most one entry per id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Create a fresh random session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection processing state (stored as atomic u8 in the worker)
///
/// Messages arriving before `Ready` are queued and drained once the session
/// bind completes; this replaces scheduler-tick ordering with an explicit
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Connection accepted, session creation not yet requested
    Accepting = 0,
    /// Session creation in flight
    Binding = 1,
    /// Session bound (or not required), messages flow to dispatch
    Ready = 2,
    /// Close received, cleanup in progress
    Closing = 3,
    /// Connection fully closed
    Closed = 4,
}

impl ConnectionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Accepting,
            1 => Self::Binding,
            2 => Self::Ready,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the connection is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepting => write!(f, "accepting"),
            Self::Binding => write!(f, "binding"),
            Self::Ready => write!(f, "ready"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Resolved path information handed to socketwares and handlers
#[derive(Debug, Clone, Default)]
pub struct PathInfo {
    /// Named captures extracted from the resource
    pub keys: HashMap<String, String>,
    /// The verb-qualified path of the request, e.g. `<GET>/items/42`
    pub path: String,
}

/// Events emitted by the server to its observers
///
/// Each event is broadcast after the state change it reports and before
/// control returns to the transport loop.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was registered
    ///
    /// Carries the id only; the connection handle stays inside the server.
    ConnectionOpened {
        /// Id of the new connection
        id: ConnectionId,
    },
    /// A session finished asynchronous creation and was bound
    SessionCreated {
        /// The newly created session
        session: Arc<Session>,
    },
    /// A session is about to be destroyed with its closing connection
    SessionDestroying {
        /// The session being torn down
        session: Arc<Session>,
    },
    /// A raw message arrived on a connection
    MessageReceived {
        /// Id of the connection the message arrived on
        id: ConnectionId,
        /// The raw wire payload
        payload: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::from("conn-42");
        assert_eq!(id.to_string(), "conn-42");
        assert_eq!(id.as_str(), "conn-42");
    }

    #[test]
    fn test_session_id_generate_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_connection_state_conversion() {
        for state in [
            ConnectionState::Accepting,
            ConnectionState::Binding,
            ConnectionState::Ready,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_connection_state_terminal() {
        assert!(!ConnectionState::Accepting.is_terminal());
        assert!(!ConnectionState::Binding.is_terminal());
        assert!(!ConnectionState::Ready.is_terminal());
        assert!(ConnectionState::Closing.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
    }
}
