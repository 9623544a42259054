//! Room teardown through next, rejoin and disconnect

use pairing_room::transport::ServerMessage;
use pairing_room::types::RoomId;
use pairing_room::PairingHandle;
use serde_json::json;

use crate::fixtures::{join_request, plain_join, settle, spawn_engine, FakeConnection};

/// Connect two visitors and pair them
async fn paired(handle: &PairingHandle) -> (FakeConnection, FakeConnection, RoomId) {
    let mut alice = FakeConnection::connect(handle, None);
    let mut bob = FakeConnection::connect(handle, None);

    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;
    handle.join(bob.id, plain_join("bob")).unwrap();

    let (room_id, _) = bob.expect_matched().await;
    alice.expect_matched().await;
    (alice, bob, room_id)
}

#[tokio::test(start_paused = true)]
async fn test_next_notifies_peer_and_leaves_both_idle() {
    let (handle, _engine) = spawn_engine();
    let (mut alice, mut bob, room_id) = paired(&handle).await;

    handle.next(alice.id, Some(room_id)).unwrap();
    assert_eq!(bob.next_message().await, ServerMessage::PeerDisconnected);

    settle(&handle).await;
    assert!(alice.drain().is_empty());

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 0);
    assert_eq!(stats.queue_length, 0);
}

#[tokio::test(start_paused = true)]
async fn test_next_with_stale_room_id_still_leaves_current_room() {
    let (handle, _engine) = spawn_engine();
    let (alice, mut bob, _) = paired(&handle).await;

    handle
        .next(alice.id, Some("not-this-room".to_string()))
        .unwrap();
    assert_eq!(bob.next_message().await, ServerMessage::PeerDisconnected);
    assert_eq!(handle.stats().await.unwrap().active_rooms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_next_outside_a_room_is_harmless() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle.next(alice.id, None).unwrap();
    settle(&handle).await;
    assert!(alice.drain().is_empty());

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.live_connections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_tears_down_room_and_requeues() {
    let (handle, _engine) = spawn_engine();
    let (mut alice, mut bob, _) = paired(&handle).await;

    handle.join(alice.id, plain_join("alice")).unwrap();
    assert_eq!(bob.next_message().await, ServerMessage::PeerDisconnected);

    // Bob is idle, not queued, so Alice waits alone
    alice.expect_waiting().await;

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 0);
    assert_eq!(stats.queue_length, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_while_waiting_keeps_single_entry() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    for _ in 0..3 {
        handle.join(alice.id, plain_join("alice")).unwrap();
        alice.expect_waiting().await;
    }

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 1);
    assert_eq!(stats.pending_escalations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_in_room_notifies_peer() {
    let (handle, _engine) = spawn_engine();
    let (alice, mut bob, _) = paired(&handle).await;

    handle.disconnect(alice.id).unwrap();
    assert_eq!(bob.next_message().await, ServerMessage::PeerDisconnected);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 0);
    assert_eq!(stats.live_connections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_waiting_leaves_queue() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;

    handle.disconnect(alice.id).unwrap();
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.pending_escalations, 0);
    assert_eq!(stats.live_connections, 0);

    // Repeated disconnects are no-ops
    handle.disconnect(alice.id).unwrap();
    assert_eq!(handle.stats().await.unwrap().live_connections, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dead_socket_in_queue_is_purged_on_scan() {
    let (handle, _engine) = spawn_engine();

    let mut alice = FakeConnection::connect(&handle, None);
    handle.join(alice.id, plain_join("alice")).unwrap();
    alice.expect_waiting().await;

    // The socket dies before its disconnect reaches the engine
    alice.drop_socket();

    let mut bob = FakeConnection::connect(&handle, None);
    handle.join(bob.id, plain_join("bob")).unwrap();
    bob.expect_waiting().await;

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 1);
    assert_eq!(stats.active_rooms, 0);
    assert_eq!(stats.live_connections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_session_is_never_paired_with_itself() {
    let (handle, _engine) = spawn_engine();

    let mut first_tab = FakeConnection::connect(&handle, None);
    let mut second_tab = FakeConnection::connect(&handle, None);

    handle
        .join(
            first_tab.id,
            join_request(json!({ "sessionId": "shared", "maxWait": 600 })),
        )
        .unwrap();
    handle
        .join(
            second_tab.id,
            join_request(json!({ "sessionId": "shared", "maxWait": 600 })),
        )
        .unwrap();

    first_tab.expect_waiting().await;
    second_tab.expect_waiting().await;
    assert_eq!(handle.stats().await.unwrap().queue_length, 2);
}
