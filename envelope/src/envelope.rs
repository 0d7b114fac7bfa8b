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

//! Request and response envelope types

use crate::{EnvelopeError, EnvelopeResult, Verb};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata field carrying the client's correlation id
///
/// When present on a request, its value is echoed back as the `clientId`
/// of every reply published for that request.
pub const CLIENT_REQUEST_ID_KEY: &str = "clientRequestId";

/// A parsed inbound wire message
///
/// # Examples
///
/// ```
/// use sockwire_envelope::{RequestEnvelope, Verb};
///
/// let request = RequestEnvelope::parse(r#"{"resource": "/items/42"}"#).unwrap();
/// assert_eq!(request.resource, "/items/42");
/// assert_eq!(request.method, Verb::Get);
/// assert!(request.data.as_object().unwrap().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// The path-like identifier this message targets
    pub resource: String,
    /// Request verb, `GET` when omitted on the wire
    #[serde(default)]
    pub method: Verb,
    /// Request payload, `{}` when omitted on the wire
    #[serde(default = "empty_object")]
    pub data: Value,
    /// Request metadata, `{}` when omitted on the wire
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RequestEnvelope {
    /// Create an envelope for the given resource with wire defaults
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            method: Verb::default(),
            data: empty_object(),
            metadata: Map::new(),
        }
    }

    /// Set the request verb
    pub fn with_method(mut self, method: Verb) -> Self {
        self.method = method;
        self
    }

    /// Set the request payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parse a wire payload into a request envelope
    ///
    /// The payload must be a JSON object with a string `resource` field.
    /// Missing `method`, `data` and `metadata` fields take their wire
    /// defaults; unknown fields are ignored.
    pub fn parse(payload: &str) -> EnvelopeResult<Self> {
        let value: Value = serde_json::from_str(payload)?;

        if !value.is_object() {
            return Err(EnvelopeError::NotAnObject);
        }

        match value.get("resource") {
            Some(Value::String(_)) => {}
            _ => return Err(EnvelopeError::MissingResource),
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Get the client correlation id, if the request carries one
    pub fn client_request_id(&self) -> Option<&str> {
        self.metadata
            .get(CLIENT_REQUEST_ID_KEY)
            .and_then(Value::as_str)
    }

    /// Serialize the envelope to its wire form
    pub fn encode(&self) -> EnvelopeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An outbound wire message
///
/// Replies carry the resource they answer, an error flag and the correlation
/// id of the request they respond to, when the client supplied one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// The resource this message answers
    pub resource: String,
    /// Whether the payload describes a failure
    pub is_error: bool,
    /// Response payload
    pub data: Value,
    /// Correlation id echoed from the request metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ResponseEnvelope {
    /// Create a successful response envelope
    pub fn new(resource: impl Into<String>, data: Value) -> Self {
        Self {
            resource: resource.into(),
            is_error: false,
            data,
            client_id: None,
        }
    }

    /// Mark the response as an error reply
    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    /// Attach the client correlation id
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    /// Serialize the envelope to its wire form
    pub fn encode(&self) -> EnvelopeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_envelope() {
        let request = RequestEnvelope::parse(
            r#"{"resource": "/users/7", "method": "POST", "data": {"name": "ann"}, "metadata": {"token": "abc"}}"#,
        )
        .unwrap();

        assert_eq!(request.resource, "/users/7");
        assert_eq!(request.method, Verb::Post);
        assert_eq!(request.data, json!({"name": "ann"}));
        assert_eq!(request.metadata.get("token"), Some(&json!("abc")));
    }

    #[test]
    fn test_parse_applies_defaults() {
        let request = RequestEnvelope::parse(r#"{"resource": "/ping"}"#).unwrap();

        assert_eq!(request.method, Verb::Get);
        assert_eq!(request.data, json!({}));
        assert!(request.metadata.is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_resource() {
        let err = RequestEnvelope::parse(r#"{"method": "GET"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingResource));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = RequestEnvelope::parse(r#"["/ping"]"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnObject));

        let err = RequestEnvelope::parse("not json at all").unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let request =
            RequestEnvelope::parse(r#"{"resource": "/ping", "extra": [1, 2, 3]}"#).unwrap();
        assert_eq!(request.resource, "/ping");
    }

    #[test]
    fn test_client_request_id() {
        let request = RequestEnvelope::new("/ping")
            .with_metadata(CLIENT_REQUEST_ID_KEY, json!("req-9"));
        assert_eq!(request.client_request_id(), Some("req-9"));

        let request = RequestEnvelope::new("/ping");
        assert_eq!(request.client_request_id(), None);
    }

    #[test]
    fn test_response_wire_field_names() {
        let response = ResponseEnvelope::new("/items", json!({"count": 3}))
            .with_error(true)
            .with_client_id(Some("req-1".to_string()));

        let wire: Value = serde_json::from_str(&response.encode().unwrap()).unwrap();
        assert_eq!(wire["isError"], json!(true));
        assert_eq!(wire["clientId"], json!("req-1"));
    }

    #[test]
    fn test_response_omits_absent_client_id() {
        let response = ResponseEnvelope::new("/items", json!(null));
        let wire: Value = serde_json::from_str(&response.encode().unwrap()).unwrap();

        assert!(wire.get("clientId").is_none());
        assert_eq!(wire["isError"], json!(false));
    }
}
