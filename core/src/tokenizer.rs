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

//! Token generation and validation
//!
//! A token is `salt ++ base64(sha256(secret ++ salt))` where secret and salt
//! are the base64 forms of independently generated random byte strings. The
//! secret never leaves the session; the token travels to the client once and
//! is presented back on subsequent requests.

use crate::{Result, SocketsError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Token/secret pair produced by [`Tokenizer::generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMaterial {
    /// The token handed to the client
    pub token: String,
    /// The secret retained on the session, never transmitted
    pub secret: String,
}

/// Character length of the salt prefix for a given secret byte length
///
/// The salt is base64-encoded before it is prepended to the token, so its
/// character length is the padded base64 expansion of `secret_length` bytes.
pub fn salt_length(secret_length: usize) -> usize {
    secret_length.div_ceil(3) * 4
}

/// Generates and validates session tokens for a fixed secret length
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    secret_length: usize,
}

impl Tokenizer {
    /// Create a tokenizer for the given secret byte length
    ///
    /// A zero length is a configuration error.
    pub fn new(secret_length: usize) -> Result<Self> {
        if secret_length == 0 {
            return Err(SocketsError::ZeroTokenLength);
        }
        Ok(Self { secret_length })
    }

    /// Get the configured secret byte length
    pub fn secret_length(&self) -> usize {
        self.secret_length
    }

    /// Generate fresh token material
    ///
    /// Secret and salt are drawn independently from the OS random source.
    pub fn generate(&self) -> Result<TokenMaterial> {
        let secret = BASE64.encode(random_bytes_with_retry(self.secret_length)?);
        self.finish(secret)
    }

    /// Generate token material around a caller-provided secret
    ///
    /// Used by external session flows that already hold a secret.
    pub fn generate_seeded(&self, seed: &[u8]) -> Result<TokenMaterial> {
        self.finish(BASE64.encode(seed))
    }

    /// Validate a candidate token against a stored secret
    ///
    /// The leading `salt_length` characters of the candidate are taken as
    /// the salt and the token is recomputed from the stored secret; the
    /// candidate is valid iff it equals the recomputed token verbatim.
    pub fn validate(&self, secret: &str, candidate: &str) -> bool {
        let prefix = salt_length(self.secret_length).min(candidate.len());
        let salt = &candidate[..prefix];

        candidate == derive_token(secret, salt)
    }

    fn finish(&self, secret: String) -> Result<TokenMaterial> {
        let salt = BASE64.encode(random_bytes(self.secret_length)?);
        let token = derive_token(&secret, &salt);

        debug!(secret_length = self.secret_length, "generated token material");

        Ok(TokenMaterial { token, secret })
    }
}

fn derive_token(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt.as_bytes());

    format!("{}{}", salt, BASE64.encode(hasher.finalize()))
}

fn random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|err| SocketsError::Randomness(err.to_string()))?;
    Ok(buffer)
}

/// Draw random bytes, retrying once on a transient randomness failure
fn random_bytes_with_retry(length: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; length];

    if OsRng.try_fill_bytes(&mut buffer).is_ok() {
        return Ok(buffer);
    }

    debug!("random byte generation failed, retrying once");
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|err| SocketsError::Randomness(err.to_string()))?;

    Ok(buffer)
}
