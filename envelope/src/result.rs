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

//! Error types and result aliases for envelope parsing

/// Result type for envelope operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Errors that can occur while decoding or encoding a wire envelope
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The payload was not valid JSON
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload was valid JSON but not a JSON object
    #[error("Envelope must be a JSON object")]
    NotAnObject,

    /// The required `resource` field was missing or not a string
    #[error("Envelope is missing the 'resource' field")]
    MissingResource,
}
