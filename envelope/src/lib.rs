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

//! # Sockwire Wire Envelope
//!
//! This crate defines the structured message unit exchanged over a sockwire
//! connection and its JSON codec.
//!
//! ## Overview
//!
//! Every inbound message is a JSON object with a required `resource` (the
//! path-like identifier the message targets) and optional `method`, `data`
//! and `metadata` fields. Outbound messages carry the resource they answer,
//! an error flag and an optional correlation id echoed back from the
//! request's `metadata.clientRequestId`.
//!
//! ## Core Components
//!
//! ### [`Verb`]
//!
//! HTTP-style request verb. `GET`, `POST`, `PUT` and `DELETE` are the
//! recognized set; anything else round-trips through [`Verb::Other`].
//!
//! ### [`RequestEnvelope`]
//!
//! The parsed inbound message. [`RequestEnvelope::parse`] applies the wire
//! defaults: missing `method` becomes `GET`, missing `data`/`metadata`
//! become empty objects.
//!
//! ### [`ResponseEnvelope`]
//!
//! The outbound message, serialized with `isError`/`clientId` field names
//! on the wire.

mod envelope;
mod result;
mod verb;

pub use envelope::{RequestEnvelope, ResponseEnvelope, CLIENT_REQUEST_ID_KEY};
pub use result::{EnvelopeError, EnvelopeResult};
pub use verb::Verb;
