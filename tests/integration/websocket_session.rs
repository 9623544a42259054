//! End-to-end session over a real WebSocket listener

use futures_util::{SinkExt, StreamExt};
use pairing_room::boost::DisabledBoostVerifier;
use pairing_room::config::AppConfig;
use pairing_room::engine::PairingService;
use pairing_room::metrics::MetricsCollector;
use pairing_room::transport::{HttpServer, HttpState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the full router on an ephemeral port
async fn start_server() -> (SocketAddr, Arc<HttpServer>) {
    let mut config = AppConfig::default();
    config.service.host = "127.0.0.1".to_string();
    config.service.http_port = 0;
    let config = Arc::new(config);

    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let (pairing, _engine) = PairingService::spawn(
        &config,
        Arc::new(DisabledBoostVerifier),
        Some(metrics.clone()),
    );
    let state = HttpState::new(config, pairing, metrics, Arc::new(RwLock::new(true))).unwrap();

    let server = Arc::new(HttpServer::new(state));
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = server.clone();
    tokio::spawn(async move {
        serving.serve(listener).await.unwrap();
    });

    (addr, server)
}

async fn connect(addr: SocketAddr, country: Option<&'static str>) -> Client {
    let mut request = format!("ws://{}/ws", addr).into_client_request().unwrap();
    if let Some(country) = country {
        request
            .headers_mut()
            .insert("cf-ipcountry", HeaderValue::from_static(country));
    }
    let (client, _response) = connect_async(request).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON frame, skipping online count updates unless asked for
async fn recv(client: &mut Client, keep_online_count: bool) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();

        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            if keep_online_count || frame["type"] != "online-count" {
                return frame;
            }
        }
    }
}

#[tokio::test]
async fn test_full_session_over_websocket() {
    let (addr, server) = start_server().await;

    let mut alice = connect(addr, None).await;
    let greeting = recv(&mut alice, true).await;
    assert_eq!(greeting, json!({ "type": "online-count", "n": 1 }));

    send(
        &mut alice,
        json!({ "type": "join", "sessionId": "alice", "interests": ["jazz"], "maxWait": 600 }),
    )
    .await;
    assert_eq!(recv(&mut alice, false).await, json!({ "type": "waiting" }));

    let mut bob = connect(addr, Some("NL")).await;
    send(
        &mut bob,
        json!({ "type": "join", "sessionId": "bob", "interests": ["Jazz"], "maxWait": 600 }),
    )
    .await;

    let bob_matched = recv(&mut bob, false).await;
    assert_eq!(bob_matched["type"], "matched");
    assert_eq!(bob_matched["initiator"], true);
    assert!(bob_matched.get("peerGender").is_none());
    let room_id = bob_matched["roomId"].as_str().unwrap().to_string();

    let alice_matched = recv(&mut alice, false).await;
    assert_eq!(alice_matched["type"], "matched");
    assert_eq!(alice_matched["roomId"], room_id.as_str());
    assert_eq!(alice_matched["initiator"], false);
    assert_eq!(alice_matched["peerCountry"], "NL");

    // Malformed frames are ignored and the socket stays usable
    alice
        .send(Message::Text("definitely not json".into()))
        .await
        .unwrap();
    send(&mut alice, json!({ "type": "teleport", "roomId": room_id })).await;

    send(
        &mut bob,
        json!({ "type": "offer", "roomId": room_id, "offer": { "type": "offer", "sdp": "v=0" } }),
    )
    .await;
    assert_eq!(
        recv(&mut alice, false).await,
        json!({ "type": "offer", "roomId": room_id, "offer": { "type": "offer", "sdp": "v=0" } })
    );

    send(
        &mut alice,
        json!({ "type": "answer", "roomId": room_id, "answer": { "type": "answer", "sdp": "v=0" } }),
    )
    .await;
    assert_eq!(
        recv(&mut bob, false).await,
        json!({ "type": "answer", "roomId": room_id, "answer": { "type": "answer", "sdp": "v=0" } })
    );

    send(
        &mut bob,
        json!({ "type": "ice-candidate", "roomId": room_id, "candidate": { "candidate": "c1" } }),
    )
    .await;
    assert_eq!(
        recv(&mut alice, false).await,
        json!({ "type": "ice-candidate", "roomId": room_id, "candidate": { "candidate": "c1" } })
    );

    // Closing one side notifies the other
    bob.close(None).await.unwrap();
    assert_eq!(
        recv(&mut alice, false).await,
        json!({ "type": "peer-disconnected" })
    );

    server.stop();
}

#[tokio::test]
async fn test_next_over_websocket_requeues_on_rejoin() {
    let (addr, server) = start_server().await;

    let mut alice = connect(addr, None).await;
    let mut bob = connect(addr, None).await;

    send(&mut alice, json!({ "type": "join", "maxWait": 600 })).await;
    assert_eq!(recv(&mut alice, false).await["type"], "waiting");
    send(&mut bob, json!({ "type": "join", "maxWait": 600 })).await;
    let room_id = recv(&mut bob, false).await["roomId"].clone();
    assert_eq!(recv(&mut alice, false).await["type"], "matched");

    send(&mut alice, json!({ "type": "next", "roomId": room_id })).await;
    assert_eq!(recv(&mut bob, false).await["type"], "peer-disconnected");

    send(&mut alice, json!({ "type": "join", "maxWait": 600 })).await;
    assert_eq!(recv(&mut alice, false).await["type"], "waiting");

    server.stop();
}
