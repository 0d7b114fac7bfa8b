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

//! End-to-end tests over real WebSocket connections

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sockwire_core::{
    handler_fn, Provider, ProviderFactory, ServerBuilder, ServerConfig, ServerEvent,
    SocketsServer,
};
use sockwire_ws::{WsConfig, WsProvider};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Build a server around a provider handle the test can query for its port
fn build_server(config: ServerConfig) -> (SocketsServer, Arc<WsProvider>) {
    let provider = Arc::new(WsProvider::new(WsConfig::new(
        "127.0.0.1:0".parse().unwrap(),
    )));

    let shared = provider.clone();
    let factory: ProviderFactory = Box::new(move || shared.clone() as Arc<dyn Provider>);

    let server = ServerBuilder::new(factory)
        .with_config(config)
        .build()
        .unwrap();

    (server, provider)
}

async fn bound_address(provider: &WsProvider) -> SocketAddr {
    for _ in 0..100 {
        if let Some(addr) = provider.bound_address() {
            return addr;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("provider never bound");
}

#[tokio::test]
async fn test_request_reply_over_websocket() {
    init_tracing();
    let (server, provider) = build_server(ServerConfig::default());

    server
        .add_request_handling([(
            "<GET>/items/:id".to_string(),
            handler_fn(|_request, context| async move {
                let id = context.path.keys.get("id").cloned().unwrap_or_default();
                context.publish(json!({ "id": id }), false).await.unwrap();
            }),
        )])
        .unwrap();

    server.start().await.unwrap();
    let addr = bound_address(&provider).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("client handshake");

    client
        .send(Message::Text(
            r#"{"resource": "/items/42", "metadata": {"clientRequestId": "req-1"}}"#.to_string(),
        ))
        .await
        .unwrap();

    let frame = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for reply")
        .expect("stream ended")
        .expect("read failed");

    let reply: Value = match frame {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    };

    assert_eq!(reply["resource"], json!("/items/42"));
    assert_eq!(reply["data"], json!({"id": "42"}));
    assert_eq!(reply["isError"], json!(false));
    assert_eq!(reply["clientId"], json!("req-1"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_disconnect_destroys_session() {
    init_tracing();
    let (server, provider) = build_server(ServerConfig::default());
    let mut events = server.events();

    server.start().await.unwrap();
    let addr = bound_address(&provider).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("client handshake");

    // wait for the session bind before disconnecting
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for session")
            .expect("event channel closed");
        if matches!(event, ServerEvent::SessionCreated { .. }) {
            break;
        }
    }
    assert_eq!(server.session_count(), 1);

    client.close(None).await.unwrap();

    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for teardown")
            .expect("event channel closed");
        if matches!(event, ServerEvent::SessionDestroying { .. }) {
            break;
        }
    }

    sleep(Duration::from_millis(100)).await;
    assert_eq!(server.session_count(), 0);
    assert_eq!(server.connection_count(), 0);

    server.stop().await.unwrap();
}
