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

//! Request routing over verb-qualified path patterns
//!
//! Mappings are keyed by `<VERB>path` where the verb tag is optional and
//! defaults to `GET`. The path may contain `:name` segments (named
//! captures), `:name?` optional segments and a trailing `*` splat.
//! Resolution tries an exact key match first, then scans registered
//! mappings in registration order for the first compiled pattern that
//! matches; the exact-match fast path is the dominant case.

use crate::handler::RequestHandler;
use crate::types::PathInfo;
use crate::{Result, SocketsError};
use regex::Regex;
use sockwire_envelope::Verb;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A mapping resolved for an incoming request
#[derive(Clone)]
pub struct ResolvedHandler {
    /// The handler registered for the matched pattern
    pub handler: Arc<dyn RequestHandler>,
    /// The verb-qualified path of the request
    pub path: String,
    /// Named captures extracted from the request path
    pub keys: HashMap<String, String>,
}

impl ResolvedHandler {
    /// Convert the resolution into the [`PathInfo`] handed to handlers
    pub fn path_info(&self) -> PathInfo {
        PathInfo {
            keys: self.keys.clone(),
            path: self.path.clone(),
        }
    }
}

impl std::fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("path", &self.path)
            .field("keys", &self.keys)
            .finish()
    }
}

struct Mapping {
    key: String,
    handler: Arc<dyn RequestHandler>,
    regex: Regex,
    names: Vec<String>,
}

/// Maps verb-qualified resources to registered handlers
#[derive(Default)]
pub struct RequestMapper {
    // registration order is the pattern-scan order
    mappings: Vec<Mapping>,
    index: HashMap<String, usize>,
}

impl RequestMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a verb-qualified path pattern
    ///
    /// A key without a `<VERB>` tag defaults to `GET`. Re-registering a key
    /// replaces the handler in place, keeping the original scan position.
    /// Invalid patterns fail here, at registration time.
    pub fn add_mapping(&mut self, key: &str, handler: Arc<dyn RequestHandler>) -> Result<()> {
        let key = qualify_key(key);
        let (regex, names) = compile_pattern(&key)?;

        let mapping = Mapping {
            key: key.clone(),
            handler,
            regex,
            names,
        };

        match self.index.get(&key) {
            Some(&slot) => self.mappings[slot] = mapping,
            None => {
                self.index.insert(key, self.mappings.len());
                self.mappings.push(mapping);
            }
        }

        Ok(())
    }

    /// Register every mapping from a batch
    pub fn add_mappings(
        &mut self,
        mappings: impl IntoIterator<Item = (String, Arc<dyn RequestHandler>)>,
    ) -> Result<()> {
        for (key, handler) in mappings {
            self.add_mapping(&key, handler)?;
        }
        Ok(())
    }

    /// Check whether a fully qualified key is registered
    pub fn has_mapping(&self, key: &str) -> bool {
        self.index.contains_key(&qualify_key(key))
    }

    /// Get the number of registered mappings
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Check if no mappings are registered
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Resolve the handler for an incoming (resource, verb) pair
    ///
    /// Exact-key matches win over pattern matches; among pattern matches
    /// the first registered mapping wins.
    pub fn resolve(&self, resource: &str, method: &Verb) -> Option<ResolvedHandler> {
        let path = format!("<{}>{}", method, resource);

        let mapping = match self.index.get(&path) {
            Some(&slot) => &self.mappings[slot],
            None => {
                debug!(path = %path, "no exact mapping, scanning patterns");
                self.mappings.iter().find(|m| m.regex.is_match(&path))?
            }
        };

        Some(ResolvedHandler {
            handler: mapping.handler.clone(),
            keys: extract_keys(mapping, &path),
            path,
        })
    }
}

impl std::fmt::Debug for RequestMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestMapper")
            .field("mappings", &self.mappings.len())
            .finish()
    }
}

/// Prefix a key with `<GET>` unless it already carries a verb tag
fn qualify_key(key: &str) -> String {
    if parse_verb_tag(key).is_some() {
        key.to_string()
    } else {
        format!("<{}>{}", Verb::Get, key)
    }
}

fn parse_verb_tag(key: &str) -> Option<&str> {
    let rest = key.strip_prefix('<')?;
    let end = rest.find('>')?;
    let tag = &rest[..end];

    if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(tag)
    } else {
        None
    }
}

/// Compile a verb-qualified pattern into an anchored regex
///
/// Returns the regex and the named capture list in declaration order.
fn compile_pattern(key: &str) -> Result<(Regex, Vec<String>)> {
    let invalid = |reason: &str| SocketsError::InvalidPattern {
        pattern: key.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from("^");
    let mut names: Vec<String> = Vec::new();

    for (index, segment) in key.split('/').enumerate() {
        if index == 0 {
            // the verb tag, always literal
            pattern.push_str(&regex::escape(segment));
            continue;
        }

        if let Some(raw) = segment.strip_prefix(':') {
            let optional = raw.ends_with('?');
            let name = if optional { &raw[..raw.len() - 1] } else { raw };

            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("capture name must be alphanumeric"));
            }
            if names.iter().any(|n| n == name) {
                return Err(invalid("duplicate capture name"));
            }

            if optional {
                pattern.push_str(&format!("(?:/(?P<{}>[^/]+))?", name));
            } else {
                pattern.push_str(&format!("/(?P<{}>[^/]+)", name));
            }
            names.push(name.to_string());
        } else if segment == "*" {
            // splat: matches the rest of the path, contributes no named key
            pattern.push_str("(?:/(.*))?");
        } else {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push_str("/?$");

    let regex = Regex::new(&pattern).map_err(|err| invalid(&err.to_string()))?;
    Ok((regex, names))
}

fn extract_keys(mapping: &Mapping, path: &str) -> HashMap<String, String> {
    let mut keys = HashMap::new();

    if mapping.names.is_empty() {
        return keys;
    }

    if let Some(captures) = mapping.regex.captures(path) {
        for name in &mapping.names {
            if let Some(value) = captures.name(name) {
                keys.insert(name.clone(), value.as_str().to_string());
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn noop() -> Arc<dyn RequestHandler> {
        handler_fn(|_request, _context| async {})
    }

    fn mapper_with(keys: &[&str]) -> RequestMapper {
        let mut mapper = RequestMapper::new();
        for key in keys {
            mapper.add_mapping(key, noop()).unwrap();
        }
        mapper
    }

    #[test]
    fn test_exact_match_literal_path() {
        let mapper = mapper_with(&["<GET>/items"]);

        let resolved = mapper.resolve("/items", &Verb::Get).unwrap();
        assert_eq!(resolved.path, "<GET>/items");
        assert!(resolved.keys.is_empty());
    }

    #[test]
    fn test_default_verb_is_get() {
        let mapper = mapper_with(&["/items"]);

        assert!(mapper.has_mapping("<GET>/items"));
        assert!(mapper.resolve("/items", &Verb::Get).is_some());
        assert!(mapper.resolve("/items", &Verb::Post).is_none());
    }

    #[test]
    fn test_verb_mismatch_does_not_resolve() {
        let mapper = mapper_with(&["<POST>/items"]);

        assert!(mapper.resolve("/items", &Verb::Post).is_some());
        assert!(mapper.resolve("/items", &Verb::Get).is_none());
    }

    #[test]
    fn test_named_capture_extraction() {
        let mapper = mapper_with(&["<GET>/items/:id"]);

        let resolved = mapper.resolve("/items/42", &Verb::Get).unwrap();
        assert_eq!(resolved.keys.get("id"), Some(&"42".to_string()));
        assert_eq!(resolved.path, "<GET>/items/42");
    }

    #[test]
    fn test_multiple_captures() {
        let mapper = mapper_with(&["<PUT>/users/:user/posts/:post"]);

        let resolved = mapper.resolve("/users/ann/posts/7", &Verb::Put).unwrap();
        assert_eq!(resolved.keys.get("user"), Some(&"ann".to_string()));
        assert_eq!(resolved.keys.get("post"), Some(&"7".to_string()));
    }

    #[test]
    fn test_optional_capture() {
        let mapper = mapper_with(&["<GET>/files/:name?"]);

        let resolved = mapper.resolve("/files/readme", &Verb::Get).unwrap();
        assert_eq!(resolved.keys.get("name"), Some(&"readme".to_string()));

        let resolved = mapper.resolve("/files", &Verb::Get).unwrap();
        assert!(resolved.keys.is_empty());
    }

    #[test]
    fn test_splat_matches_rest() {
        let mapper = mapper_with(&["<GET>/static/*"]);

        assert!(mapper.resolve("/static/css/site.css", &Verb::Get).is_some());
        assert!(mapper.resolve("/static", &Verb::Get).is_some());
        assert!(mapper.resolve("/other/css", &Verb::Get).is_none());
    }

    #[test]
    fn test_exact_wins_over_pattern() {
        // "/items/special" matches both; the exact key must win even though
        // the pattern was registered first
        let mapper = mapper_with(&["<GET>/items/:id", "<GET>/items/special"]);

        let resolved = mapper.resolve("/items/special", &Verb::Get).unwrap();
        assert!(resolved.keys.is_empty());
        assert_eq!(resolved.path, "<GET>/items/special");

        // other resources still route through the pattern
        let resolved = mapper.resolve("/items/42", &Verb::Get).unwrap();
        assert_eq!(resolved.keys.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let mapper = mapper_with(&["<GET>/a/:x", "<GET>/a/:y"]);

        let resolved = mapper.resolve("/a/1", &Verb::Get).unwrap();
        assert_eq!(resolved.keys.get("x"), Some(&"1".to_string()));
        assert!(!resolved.keys.contains_key("y"));
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let mut mapper = RequestMapper::new();
        mapper.add_mapping("<GET>/a", noop()).unwrap();
        mapper.add_mapping("<GET>/a", noop()).unwrap();

        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn test_invalid_patterns_fail_fast() {
        let mut mapper = RequestMapper::new();

        let err = mapper.add_mapping("<GET>/a/:", noop()).unwrap_err();
        assert!(err.is_configuration());

        let err = mapper
            .add_mapping("<GET>/a/:id/b/:id", noop())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_verb_tag() {
        let mapper = mapper_with(&["<SUBSCRIBE>/feed"]);

        assert!(mapper
            .resolve("/feed", &Verb::from("SUBSCRIBE"))
            .is_some());
        assert!(mapper.resolve("/feed", &Verb::Get).is_none());
    }

    #[test]
    fn test_trailing_slash_tolerated() {
        let mapper = mapper_with(&["<GET>/items/:id"]);

        let resolved = mapper.resolve("/items/42/", &Verb::Get).unwrap();
        assert_eq!(resolved.keys.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let mapper = mapper_with(&["<GET>/v1.0/items"]);

        assert!(mapper.resolve("/v1.0/items", &Verb::Get).is_some());
        // '.' must not act as a regex wildcard
        assert!(mapper.resolve("/v1x0/items", &Verb::Get).is_none());
    }
}
