//! Relay of offers, answers and ICE candidates between room members

use pairing_room::signal::{SignalKind, SignalMessage};
use pairing_room::transport::ServerMessage;
use serde_json::json;

use crate::fixtures::{plain_join, settle, spawn_engine, FakeConnection};

fn signal(kind: SignalKind, room_id: &str, payload: serde_json::Value) -> SignalMessage {
    SignalMessage {
        kind,
        room_id: room_id.to_string(),
        payload,
    }
}

#[tokio::test(start_paused = true)]
async fn test_handshake_is_relayed_to_the_peer_only() {
    let (handle, _engine) = spawn_engine();

    let mut alice = FakeConnection::connect(&handle, None);
    let mut bob = FakeConnection::connect(&handle, None);
    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;
    handle.join(bob.id, plain_join("bob")).unwrap();
    let (room_id, bob_initiates) = bob.expect_matched().await;
    alice.expect_matched().await;
    assert!(bob_initiates);

    let offer = json!({ "type": "offer", "sdp": "v=0 bob" });
    handle
        .signal(bob.id, signal(SignalKind::Offer, &room_id, offer.clone()))
        .unwrap();
    assert_eq!(
        alice.next_message().await,
        ServerMessage::Offer {
            room_id: room_id.clone(),
            offer
        }
    );

    let answer = json!({ "type": "answer", "sdp": "v=0 alice" });
    handle
        .signal(alice.id, signal(SignalKind::Answer, &room_id, answer.clone()))
        .unwrap();
    assert_eq!(
        bob.next_message().await,
        ServerMessage::Answer {
            room_id: room_id.clone(),
            answer
        }
    );

    let candidate = json!({ "candidate": "candidate:1 1 udp 2122260223 10.0.0.1 49152 typ host", "sdpMLineIndex": 0 });
    handle
        .signal(
            alice.id,
            signal(SignalKind::IceCandidate, &room_id, candidate.clone()),
        )
        .unwrap();
    assert_eq!(
        bob.next_message().await,
        ServerMessage::IceCandidate {
            room_id: room_id.clone(),
            candidate
        }
    );

    settle(&handle).await;
    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_outsider_cannot_signal_into_a_room() {
    let (handle, _engine) = spawn_engine();

    let mut alice = FakeConnection::connect(&handle, None);
    let mut bob = FakeConnection::connect(&handle, None);
    let mut mallory = FakeConnection::connect(&handle, None);

    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;
    handle.join(bob.id, plain_join("bob")).unwrap();
    let (room_id, _) = bob.expect_matched().await;
    alice.expect_matched().await;

    handle
        .signal(
            mallory.id,
            signal(SignalKind::Offer, &room_id, json!({ "sdp": "spoofed" })),
        )
        .unwrap();
    settle(&handle).await;

    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());
    assert!(mallory.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_signal_after_room_closed_is_dropped() {
    let (handle, _engine) = spawn_engine();

    let mut alice = FakeConnection::connect(&handle, None);
    let mut bob = FakeConnection::connect(&handle, None);

    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;
    handle.join(bob.id, plain_join("bob")).unwrap();
    let (room_id, _) = bob.expect_matched().await;
    alice.expect_matched().await;

    handle.next(bob.id, Some(room_id.clone())).unwrap();
    assert_eq!(alice.next_message().await, ServerMessage::PeerDisconnected);

    handle
        .signal(
            bob.id,
            signal(SignalKind::IceCandidate, &room_id, json!({ "candidate": "" })),
        )
        .unwrap();
    settle(&handle).await;
    assert!(alice.drain().is_empty());
}
