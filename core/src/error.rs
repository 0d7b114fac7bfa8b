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

//! Error types for the sockwire orchestration engine

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for sockwire operations
pub type Result<T> = std::result::Result<T, SocketsError>;

/// Sockwire error types
///
/// The variants fall into four families:
///
/// - configuration errors, raised synchronously at registration time
/// - protocol violations on a single inbound message or session operation
/// - transient I/O failures (randomness), surfaced after one retry
/// - operational errors on publish paths
#[derive(Debug, Error)]
pub enum SocketsError {
    /// A route pattern failed to compile
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending verb-qualified pattern
        pattern: String,
        /// Why compilation failed
        reason: String,
    },

    /// A socketware was registered under a name that is already taken
    #[error("Socketware name '{0}' is already registered")]
    DuplicateSocketware(String),

    /// Token material was requested with a zero secret length
    #[error("Token secret length must be greater than zero")]
    ZeroTokenLength,

    /// Token validation was attempted before a secret was generated
    #[error("Session has no secret, cannot validate token")]
    MissingSecret,

    /// Data arrived on a connection that has no session and needs one
    #[error("Incoming data on session-less connection {0}")]
    SessionlessConnection(ConnectionId),

    /// No handler matched the incoming request
    #[error("Handler not found for '{method}' on '{resource}'")]
    HandlerNotFound {
        /// Request verb
        method: String,
        /// Request resource
        resource: String,
    },

    /// The request carried no token in the configured metadata field
    #[error("Incoming request has no token in metadata '{0}'")]
    MissingToken(String),

    /// The request token failed validation
    #[error("Request failed the token check")]
    InvalidToken,

    /// A socketware aborted the chain
    #[error("Socketware '{name}' returned an error: {message}")]
    SocketwareFailed {
        /// Name of the failing entry
        name: String,
        /// The error it reported
        message: String,
    },

    /// A session was bound to a connection while bound to another
    #[error("Session is already attached to a different connection")]
    SessionAlreadyBound,

    /// No session matched an attach lookup
    #[error("No session found for {key}={value}")]
    SessionNotFound {
        /// Lookup property name
        key: String,
        /// Lookup property value
        value: String,
    },

    /// A destroyed session was mutated
    #[error("Session has been destroyed")]
    SessionDestroyed,

    /// The pre-ready message queue for a connection overflowed
    #[error("Pending message queue overflow on connection {0}")]
    PendingQueueOverflow(ConnectionId),

    /// The inbound payload was not a valid envelope
    #[error("Malformed request envelope: {0}")]
    Envelope(#[from] sockwire_envelope::EnvelopeError),

    /// Random byte generation failed after the single retry
    #[error("Random byte generation failed: {0}")]
    Randomness(String),

    /// An operation that requires a running server was called while stopped
    #[error("Server is not running, operation not allowed")]
    ServerNotRunning,

    /// A publish used a session that is not bound to any connection
    #[error("Session is not bound to a connection")]
    SessionUnbound,

    /// A publish targeted a connection id with no live registry entry
    #[error("No connection found for id: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The transport provider failed to start or stop
    #[error("Transport provider error: {0}")]
    Provider(String),
}

impl SocketsError {
    /// Check if the error is a registration-time configuration error
    ///
    /// Configuration errors are always surfaced, never silenced.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SocketsError::InvalidPattern { .. }
                | SocketsError::DuplicateSocketware(_)
                | SocketsError::ZeroTokenLength
                | SocketsError::MissingSecret
        )
    }

    /// Check if the error is a protocol violation on a single message
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SocketsError::SessionlessConnection(_)
                | SocketsError::HandlerNotFound { .. }
                | SocketsError::MissingToken(_)
                | SocketsError::InvalidToken
                | SocketsError::SocketwareFailed { .. }
                | SocketsError::SessionAlreadyBound
                | SocketsError::SessionNotFound { .. }
                | SocketsError::SessionDestroyed
                | SocketsError::PendingQueueOverflow(_)
                | SocketsError::Envelope(_)
        )
    }

    /// Check if the error is an operational error on a publish path
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            SocketsError::ServerNotRunning
                | SocketsError::ConnectionNotFound(_)
                | SocketsError::SessionUnbound
        )
    }

    /// Check if silent-fail mode may convert the error into a logged no-op
    ///
    /// Exactly the protocol violations are silenceable; configuration,
    /// transient and operational errors always surface.
    pub fn is_silenceable(&self) -> bool {
        self.is_protocol_violation()
    }
}
