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

//! Token security tests
//!
//! The token check runs between the socketware chain and the handler:
//! a tokenized server must reject requests without a valid token before
//! any handler code runs.

use async_trait::async_trait;
use sockwire_core::{
    handler_fn, salt_length, Connection, ConnectionId, Provider, ProviderFactory, Result,
    ServerBuilder, ServerConfig, ServerEvent, Session, SocketsServer, Tokenizer, TransportEvent,
    Verb,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

#[derive(Debug)]
struct TestConnection {
    id: ConnectionId,
    open: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl TestConnection {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::from(id),
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for TestConnection {
    fn id(&self) -> ConnectionId {
        self.id.clone()
    }

    async fn send(&self, payload: String) -> Result<()> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.is_open()
    }

    async fn stop(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TestTransport {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl TestTransport {
    fn sender(&self) -> mpsc::Sender<TransportEvent> {
        self.events
            .lock()
            .unwrap()
            .clone()
            .expect("provider not started")
    }

    async fn connect(&self, id: &str) -> Arc<TestConnection> {
        let conn = TestConnection::new(id);
        self.sender()
            .send(TransportEvent::Connected(conn.clone()))
            .await
            .unwrap();
        conn
    }

    async fn data(&self, id: &str, payload: String) {
        self.sender()
            .send(TransportEvent::Data {
                id: ConnectionId::from(id),
                payload,
            })
            .await
            .unwrap();
    }
}

struct TestProvider(Arc<TestTransport>);

#[async_trait]
impl Provider for TestProvider {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<()> {
        *self.0.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.0.events.lock().unwrap().take();
        Ok(())
    }
}

fn test_factory(transport: Arc<TestTransport>) -> ProviderFactory {
    Box::new(move || Arc::new(TestProvider(transport.clone())))
}

/// Build a tokenized server with a flag recording handler invocations
fn tokenized_server(
    config: ServerConfig,
) -> (SocketsServer, Arc<TestTransport>, Arc<AtomicBool>) {
    let transport = Arc::new(TestTransport::default());
    let server = ServerBuilder::new(test_factory(transport.clone()))
        .with_config(config)
        .build()
        .unwrap();

    let handled = Arc::new(AtomicBool::new(false));
    let flag = handled.clone();
    server
        .add_request_handling([(
            "/secure".to_string(),
            handler_fn(move |_request, _context| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                }
            }),
        )])
        .unwrap();

    (server, transport, handled)
}

async fn await_session(rx: &mut broadcast::Receiver<ServerEvent>) -> Arc<Session> {
    loop {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for session")
            .expect("event channel closed");
        if let ServerEvent::SessionCreated { session } = event {
            return session;
        }
    }
}

async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

fn secure_request(token: Option<&str>) -> String {
    match token {
        Some(token) => {
            format!(r#"{{"resource": "/secure", "metadata": {{"token": "{token}"}}}}"#)
        }
        None => r#"{"resource": "/secure"}"#.to_string(),
    }
}

#[tokio::test]
async fn test_missing_token_is_rejected_before_handler() {
    let config = ServerConfig::default().with_tokenize_connection(true);
    let (server, transport, handled) = tokenized_server(config);
    let mut events = server.events();

    server.start().await.unwrap();
    let conn = transport.connect("conn-1").await;
    await_session(&mut events).await;

    transport.data("conn-1", secure_request(None)).await;
    settle().await;

    // strict mode: the violation is fatal for the connection
    assert!(!handled.load(Ordering::SeqCst));
    assert!(!conn.is_open());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_valid_token_reaches_handler_and_checks_once() {
    let config = ServerConfig::default().with_tokenize_connection(true);
    let (server, transport, handled) = tokenized_server(config);
    let mut events = server.events();

    server.start().await.unwrap();
    transport.connect("conn-1").await;
    let session = await_session(&mut events).await;
    let token = session.token().expect("tokenized session has a token");

    transport.data("conn-1", secure_request(Some(&token))).await;
    settle().await;
    assert!(handled.load(Ordering::SeqCst));
    assert!(session.security_checked());

    // once checked, later requests pass without re-presenting the token
    handled.store(false, Ordering::SeqCst);
    transport.data("conn-1", secure_request(None)).await;
    settle().await;
    assert!(handled.load(Ordering::SeqCst));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_token_silent_fail_drops_without_reply() {
    let config = ServerConfig::default()
        .with_tokenize_connection(true)
        .with_silent_fail(true);
    let (server, transport, handled) = tokenized_server(config);
    let mut events = server.events();

    server.start().await.unwrap();
    let conn = transport.connect("conn-1").await;
    let session = await_session(&mut events).await;

    let mut token = session.token().unwrap();
    // flip the last character to invalidate the token
    let last = if token.pop() == Some('A') { 'B' } else { 'A' };
    token.push(last);

    transport.data("conn-1", secure_request(Some(&token))).await;
    settle().await;

    // the rejected request gets no reply and the connection survives
    assert!(!handled.load(Ordering::SeqCst));
    assert!(conn.sent.lock().unwrap().is_empty());
    assert!(conn.is_open());
    assert!(!session.security_checked());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_token_checked_only_on_configured_methods() {
    let config = ServerConfig::default()
        .with_tokenize_connection(true)
        .with_silent_fail(true)
        .with_check_token_on_methods(Some(vec![Verb::Post]));
    let (server, transport, handled) = tokenized_server(config);
    let mut events = server.events();

    server
        .add_request_handling([(
            "<POST>/secure".to_string(),
            handler_fn(|_request, _context| async {}),
        )])
        .unwrap();

    server.start().await.unwrap();
    transport.connect("conn-1").await;
    await_session(&mut events).await;

    // GET is outside the configured check set: no token required
    transport.data("conn-1", secure_request(None)).await;
    settle().await;
    assert!(handled.load(Ordering::SeqCst));

    // POST without a token is rejected
    transport
        .data("conn-1", r#"{"resource": "/secure", "method": "POST"}"#.to_string())
        .await;
    settle().await;
    assert_eq!(server.metrics().snapshot().protocol_violations, 1);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_custom_request_token_key() {
    let config = ServerConfig::default()
        .with_tokenize_connection(true)
        .with_request_token_key("auth");
    let (server, transport, handled) = tokenized_server(config);
    let mut events = server.events();

    server.start().await.unwrap();
    transport.connect("conn-1").await;
    let session = await_session(&mut events).await;
    let token = session.token().unwrap();

    transport
        .data(
            "conn-1",
            format!(r#"{{"resource": "/secure", "metadata": {{"auth": "{token}"}}}}"#),
        )
        .await;
    settle().await;

    assert!(handled.load(Ordering::SeqCst));

    server.stop().await.unwrap();
}

mod token_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn round_trip_for_any_secret_length(length in 1usize..48) {
            let tokenizer = Tokenizer::new(length).unwrap();
            let material = tokenizer.generate().unwrap();

            prop_assert!(tokenizer.validate(&material.secret, &material.token));
        }

        #[test]
        fn salt_prefix_length_matches_base64_expansion(length in 1usize..48) {
            let tokenizer = Tokenizer::new(length).unwrap();
            let material = tokenizer.generate().unwrap();

            // token = salt ++ base64(sha256 digest), digest part is 44 chars
            prop_assert_eq!(material.token.len(), salt_length(length) + 44);
        }

        #[test]
        fn truncated_token_never_validates(length in 1usize..16) {
            let tokenizer = Tokenizer::new(length).unwrap();
            let material = tokenizer.generate().unwrap();
            let truncated = &material.token[..material.token.len() - 1];

            prop_assert!(!tokenizer.validate(&material.secret, truncated));
        }
    }

    #[test]
    fn documented_salt_lengths() {
        for (length, expected) in [(0, 0), (8, 12), (11, 16), (12, 16), (16, 24)] {
            assert_eq!(salt_length(length), expected);
        }
    }
}
