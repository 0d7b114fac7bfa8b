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

//! Per-connection session state
//!
//! A session is the identity/state container attached to a connection,
//! independent of the transport connection object itself. It carries an
//! arbitrary JSON property bag, optional token material, and a destroyed
//! flag. Binding a session to a connection id is an atomic check-then-set:
//! a session bound to one connection can never be rebound to another.

use crate::tokenizer::{TokenMaterial, Tokenizer};
use crate::types::{ConnectionId, SessionId};
use crate::{Result, SocketsError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

/// Session property marking that the token check already passed
///
/// Once set, subsequent requests on the same session skip re-validation.
pub const SECURITY_CHECKED_KEY: &str = "session-security-checked";

struct TokenState {
    material: TokenMaterial,
    tokenizer: Tokenizer,
}

/// Per-connection identity and property store
///
/// Sessions are created asynchronously by the
/// [`SessionRegistry`](crate::SessionRegistry); handlers and socketwares may
/// read and write the property bag freely. All mutation is rejected once the
/// session is destroyed.
pub struct Session {
    id: SessionId,
    created_at: SystemTime,
    bag: RwLock<HashMap<String, Value>>,
    token: RwLock<Option<TokenState>>,
    ready: AtomicBool,
    destroyed: AtomicBool,
}

impl Session {
    /// Create a session with the given id
    ///
    /// The session is not ready until [`Session::initialize`] completes.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            created_at: SystemTime::now(),
            bag: RwLock::new(HashMap::new()),
            token: RwLock::new(None),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Generate token material if requested and mark the session ready
    ///
    /// With `tokenizer` set, a fresh secret and salt are drawn and the
    /// derived token is stored; without one the session completes
    /// immediately with no token material.
    pub fn initialize(&self, tokenizer: Option<Tokenizer>) -> Result<()> {
        if let Some(tokenizer) = tokenizer {
            let material = tokenizer.generate()?;
            *self.token.write().expect("token lock poisoned") = Some(TokenState {
                material,
                tokenizer,
            });
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Get the session id
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Get the session creation time
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Check if asynchronous creation has completed
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.is_destroyed()
    }

    /// Check if the session has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Get the token handed to the client, if tokenization was requested
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .expect("token lock poisoned")
            .as_ref()
            .map(|state| state.material.token.clone())
    }

    /// Validate a candidate token against the session secret
    ///
    /// Calling this before a secret has been generated is a configuration
    /// error, not a failed check.
    pub fn is_valid(&self, candidate: &str) -> Result<bool> {
        let token = self.token.read().expect("token lock poisoned");
        let state = token.as_ref().ok_or(SocketsError::MissingSecret)?;

        Ok(state.tokenizer.validate(&state.material.secret, candidate))
    }

    /// Get a property from the bag
    pub fn get(&self, key: &str) -> Option<Value> {
        self.bag
            .read()
            .expect("bag lock poisoned")
            .get(key)
            .cloned()
    }

    /// Set a property in the bag
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        if self.is_destroyed() {
            return Err(SocketsError::SessionDestroyed);
        }

        self.bag
            .write()
            .expect("bag lock poisoned")
            .insert(key.into(), value);
        Ok(())
    }

    /// Set multiple properties in one call
    pub fn set_all(&self, entries: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        if self.is_destroyed() {
            return Err(SocketsError::SessionDestroyed);
        }

        let mut bag = self.bag.write().expect("bag lock poisoned");
        for (key, value) in entries {
            bag.insert(key, value);
        }
        Ok(())
    }

    /// Remove a property from the bag
    pub fn unset(&self, key: &str) -> Option<Value> {
        self.bag.write().expect("bag lock poisoned").remove(key)
    }

    /// Check if a property is boolean `true`
    pub fn enabled(&self, key: &str) -> bool {
        self.get(key) == Some(Value::Bool(true))
    }

    /// Bind the session to a connection id under the given property name
    ///
    /// Atomic check-then-set: an unbound session (or one already bound to
    /// the same id) binds successfully; a session bound to a different
    /// connection fails and stays bound to the original.
    pub fn bind_connection(&self, key: &str, conn_id: &ConnectionId) -> Result<()> {
        if self.is_destroyed() {
            return Err(SocketsError::SessionDestroyed);
        }

        let mut bag = self.bag.write().expect("bag lock poisoned");

        match bag.get(key) {
            None => {}
            Some(Value::String(bound)) if bound == conn_id.as_str() => {}
            Some(_) => return Err(SocketsError::SessionAlreadyBound),
        }

        bag.insert(key.to_string(), Value::String(conn_id.as_str().to_string()));
        Ok(())
    }

    /// Get the connection id the session is bound to, if any
    pub fn bound_connection(&self, key: &str) -> Option<ConnectionId> {
        match self.get(key) {
            Some(Value::String(id)) => Some(ConnectionId::from(id)),
            _ => None,
        }
    }

    /// Check if the token check already passed for this session
    pub fn security_checked(&self) -> bool {
        self.enabled(SECURITY_CHECKED_KEY)
    }

    /// Record that the token check passed
    pub fn mark_security_checked(&self) -> Result<()> {
        self.set(SECURITY_CHECKED_KEY, Value::Bool(true))
    }

    /// Destroy the session
    ///
    /// Clears the property bag and rejects all further mutation. Destroyed
    /// sessions never match registry lookups.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.ready.store(false, Ordering::Release);
        self.bag.write().expect("bag lock poisoned").clear();
        *self.token.write().expect("token lock poisoned") = None;
    }

    /// Check a bag property against a value (used by registry lookups)
    pub(crate) fn matches(&self, key: &str, value: &Value) -> bool {
        !self.is_destroyed() && self.get(key).as_ref() == Some(value)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
