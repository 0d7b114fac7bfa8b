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

//! WebSocket provider configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for [`WsProvider`](crate::WsProvider)
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Address the TCP listener binds to
    pub bind_address: SocketAddr,

    /// Capacity of each connection's outbound message channel
    pub outgoing_buffer: usize,

    /// Delay before retrying after an accept error
    pub accept_backoff: Duration,
}

impl WsConfig {
    /// Create a configuration binding to the given address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            outgoing_buffer: 64,
            accept_backoff: Duration::from_millis(100),
        }
    }

    /// Set the outbound channel capacity per connection
    pub fn with_outgoing_buffer(mut self, capacity: usize) -> Self {
        self.outgoing_buffer = capacity;
        self
    }

    /// Set the accept-error backoff delay
    pub fn with_accept_backoff(mut self, backoff: Duration) -> Self {
        self.accept_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WsConfig::new("127.0.0.1:0".parse().unwrap());

        assert_eq!(config.outgoing_buffer, 64);
        assert_eq!(config.accept_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_config_builders() {
        let config = WsConfig::new("127.0.0.1:0".parse().unwrap())
            .with_outgoing_buffer(8)
            .with_accept_backoff(Duration::from_secs(1));

        assert_eq!(config.outgoing_buffer, 8);
        assert_eq!(config.accept_backoff, Duration::from_secs(1));
    }
}
