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

//! Server configuration
//!
//! # Examples
//!
//! ```
//! use sockwire_core::ServerConfig;
//!
//! let config = ServerConfig::default()
//!     .with_tokenize_connection(true)
//!     .with_token_secret_length(24)
//!     .with_check_token_on_methods(Some(vec!["POST".into(), "DELETE".into()]));
//! ```

use sockwire_envelope::Verb;

/// Configuration for a [`SocketsServer`](crate::SocketsServer)
///
/// The documented options are typed fields; handler-defined values live in
/// the server's separate extension property map.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Byte length of generated session secrets
    pub token_secret_length: usize,

    /// Generate token material for every internally created session and
    /// check the token on incoming requests
    pub tokenize_connection: bool,

    /// Metadata field carrying the candidate token on incoming requests
    pub request_token_key: String,

    /// Verbs the token check applies to (`None` checks every verb)
    pub check_token_on_methods: Option<Vec<Verb>>,

    /// Sessions are supplied by the caller instead of created on accept
    pub external_session: bool,

    /// Convert protocol violations into logged no-ops instead of failing
    pub silent_fail: bool,

    /// Session property name that binds a session to a connection id
    pub session_id_key: String,

    /// Maximum messages queued on a connection before its session is ready
    pub pending_message_limit: usize,

    /// Capacity of the server event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            token_secret_length: 16,
            tokenize_connection: false,
            request_token_key: "token".to_string(),
            check_token_on_methods: None,
            external_session: false,
            silent_fail: false,
            session_id_key: "connection-id".to_string(),
            pending_message_limit: 64,
            event_channel_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the documented defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the byte length of generated session secrets
    pub fn with_token_secret_length(mut self, length: usize) -> Self {
        self.token_secret_length = length;
        self
    }

    /// Enable or disable connection tokenization
    pub fn with_tokenize_connection(mut self, tokenize: bool) -> Self {
        self.tokenize_connection = tokenize;
        self
    }

    /// Set the metadata field carrying the candidate token
    pub fn with_request_token_key(mut self, key: impl Into<String>) -> Self {
        self.request_token_key = key.into();
        self
    }

    /// Restrict the token check to the given verbs (`None` checks all)
    pub fn with_check_token_on_methods(mut self, methods: Option<Vec<Verb>>) -> Self {
        self.check_token_on_methods = methods;
        self
    }

    /// Enable or disable external session mode
    pub fn with_external_session(mut self, external: bool) -> Self {
        self.external_session = external;
        self
    }

    /// Enable or disable silent-fail mode
    pub fn with_silent_fail(mut self, silent: bool) -> Self {
        self.silent_fail = silent;
        self
    }

    /// Set the session property name binding sessions to connections
    pub fn with_session_id_key(mut self, key: impl Into<String>) -> Self {
        self.session_id_key = key.into();
        self
    }

    /// Set the pre-ready message queue bound
    pub fn with_pending_message_limit(mut self, limit: usize) -> Self {
        self.pending_message_limit = limit;
        self
    }

    /// Set the event broadcast channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Check whether the token check applies to the given verb
    pub fn checks_token_on(&self, method: &Verb) -> bool {
        match &self.check_token_on_methods {
            None => true,
            Some(methods) => methods.contains(method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.token_secret_length, 16);
        assert!(!config.tokenize_connection);
        assert_eq!(config.request_token_key, "token");
        assert!(config.check_token_on_methods.is_none());
        assert!(!config.external_session);
        assert!(!config.silent_fail);
        assert_eq!(config.session_id_key, "connection-id");
    }

    #[test]
    fn test_config_builders() {
        let config = ServerConfig::new()
            .with_token_secret_length(32)
            .with_tokenize_connection(true)
            .with_request_token_key("auth")
            .with_silent_fail(true)
            .with_session_id_key("conn");

        assert_eq!(config.token_secret_length, 32);
        assert!(config.tokenize_connection);
        assert_eq!(config.request_token_key, "auth");
        assert!(config.silent_fail);
        assert_eq!(config.session_id_key, "conn");
    }

    #[test]
    fn test_checks_token_on() {
        let config = ServerConfig::default();
        assert!(config.checks_token_on(&Verb::Get));
        assert!(config.checks_token_on(&Verb::Delete));

        let config =
            ServerConfig::default().with_check_token_on_methods(Some(vec![Verb::Post]));
        assert!(config.checks_token_on(&Verb::Post));
        assert!(!config.checks_token_on(&Verb::Get));
    }
}
