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

//! Request verbs for wire envelopes

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-style verb carried by a request envelope
///
/// `GET` is the wire default when a message omits the `method` field.
/// Unrecognized verbs are preserved verbatim in [`Verb::Other`] so new
/// verbs can be routed without a codec change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verb {
    /// Read a resource
    Get,
    /// Create a resource
    Post,
    /// Replace a resource
    Put,
    /// Remove a resource
    Delete,
    /// Any other verb, preserved verbatim
    Other(String),
}

impl Verb {
    /// Get the wire representation of the verb
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Other(verb) => verb.as_str(),
        }
    }
}

impl Default for Verb {
    fn default() -> Self {
        Self::Get
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Verb {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Verb {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Verb> for String {
    fn from(verb: Verb) -> Self {
        verb.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_round_trip() {
        for verb in ["GET", "POST", "PUT", "DELETE"] {
            assert_eq!(Verb::from(verb).as_str(), verb);
        }
    }

    #[test]
    fn test_verb_default() {
        assert_eq!(Verb::default(), Verb::Get);
    }

    #[test]
    fn test_other_verb_preserved() {
        let verb = Verb::from("SUBSCRIBE");
        assert_eq!(verb, Verb::Other("SUBSCRIBE".to_string()));
        assert_eq!(verb.as_str(), "SUBSCRIBE");
    }

    #[test]
    fn test_lowercase_is_not_recognized() {
        // Verbs are case-sensitive on the wire
        assert_eq!(Verb::from("get"), Verb::Other("get".to_string()));
    }
}
