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

//! Session registry
//!
//! The registry owns every live session, creates them asynchronously on
//! connection accept (a fresh id is assigned before tokenization begins)
//! and answers property-based lookups.

use crate::config::ServerConfig;
use crate::session::Session;
use crate::tokenizer::Tokenizer;
use crate::types::SessionId;
use crate::Result;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Registry of live sessions (lock-free concurrent map)
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    tokenizer: Option<Tokenizer>,
}

impl SessionRegistry {
    /// Create a registry from the server configuration
    ///
    /// With `tokenize_connection` enabled a zero `token_secret_length` is a
    /// configuration error, raised here rather than on first accept.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let tokenizer = if config.tokenize_connection {
            Some(Tokenizer::new(config.token_secret_length)?)
        } else {
            None
        };

        Ok(Self {
            sessions: DashMap::new(),
            tokenizer,
        })
    }

    /// Create a new session
    ///
    /// A fresh unique id is assigned before tokenization begins; the session
    /// is ready (and registered) only once token material, if configured,
    /// has been generated.
    pub async fn create_session(&self) -> Result<Arc<Session>> {
        let id = SessionId::generate();
        let session = Arc::new(Session::new(id.clone()));

        session.initialize(self.tokenizer)?;

        self.sessions.insert(id.clone(), session.clone());
        debug!(session_id = %id, "session created");

        Ok(session)
    }

    /// Register an externally created session
    ///
    /// Used in external-session mode, where the caller supplies sessions
    /// out-of-band instead of the server creating them on accept.
    pub fn register_session(&self, session: Arc<Session>) {
        self.sessions.insert(session.id().clone(), session);
    }

    /// Destroy a session and drop it from the registry
    pub fn destroy_session(&self, id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(id) {
            if !session.is_destroyed() {
                session.destroy();
            }
            debug!(session_id = %id, "session destroyed");
        }
    }

    /// Get a session by id
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Find the first session whose bag property equals the given value
    ///
    /// Destroyed sessions never match.
    pub fn find(&self, key: &str, value: &Value) -> Option<Arc<Session>> {
        self.sessions
            .iter()
            .find(|entry| entry.value().matches(key, value))
            .map(|entry| entry.value().clone())
    }

    /// Get the number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Destroy every session and clear the registry
    pub fn clear(&self) {
        for entry in self.sessions.iter() {
            entry.value().destroy();
        }
        self.sessions.clear();
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("tokenized", &self.tokenizer.is_some())
            .finish()
    }
}
