//! Escalation: country filters relax once a visitor's max wait elapses

use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::fixtures::{join_request, plain_join, settle, spawn_engine, FakeConnection};

#[tokio::test(start_paused = true)]
async fn test_escalation_relaxes_country_filter() {
    let (handle, _engine) = spawn_engine();

    let mut bob = FakeConnection::connect(&handle, Some("DE"));
    let mut alice = FakeConnection::connect(&handle, Some("US"));

    handle.join(bob.id, plain_join("bob")).unwrap();
    bob.expect_waiting().await;

    // Alice only wants France, so Bob is skipped at join time
    handle
        .join(
            alice.id,
            join_request(json!({
                "sessionId": "alice",
                "countries": ["FR"],
                "maxWait": 1
            })),
        )
        .unwrap();
    alice.expect_waiting().await;

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 2);
    assert_eq!(stats.active_rooms, 0);

    // After one second the filter is dropped and the escalating side initiates
    let (room_id, initiator) = alice.expect_matched().await;
    assert!(initiator);

    let (peer_room, peer_initiator) = bob.expect_matched().await;
    assert_eq!(peer_room, room_id);
    assert!(!peer_initiator);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.escalations_fired, 1);
    assert_eq!(stats.pending_escalations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_escalation_keeps_gender_preferences() {
    let (handle, _engine) = spawn_engine();

    let mut bob = FakeConnection::connect(&handle, None);
    let mut alice = FakeConnection::connect(&handle, None);

    handle
        .join(
            bob.id,
            join_request(json!({ "sessionId": "bob", "gender": "M", "maxWait": 600 })),
        )
        .unwrap();
    handle
        .join(
            alice.id,
            join_request(json!({
                "sessionId": "alice",
                "wantGender": "F",
                "maxWait": 1
            })),
        )
        .unwrap();

    bob.expect_waiting().await;
    alice.expect_waiting().await;

    sleep(Duration::from_secs(3)).await;
    settle(&handle).await;

    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.escalations_fired, 1);
    assert_eq!(stats.active_rooms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_escalation_stays_queued_without_retry() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle
        .join(
            alice.id,
            join_request(json!({ "sessionId": "alice", "maxWait": 1 })),
        )
        .unwrap();
    alice.expect_waiting().await;

    sleep(Duration::from_secs(10)).await;
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 1);
    assert_eq!(stats.pending_escalations, 0);
    assert_eq!(stats.escalations_fired, 1);

    // A later arrival still finds the waiting visitor through the ordinary join scan
    let mut bob = FakeConnection::connect(&handle, None);
    handle.join(bob.id, plain_join("bob")).unwrap();
    let (_, initiator) = bob.expect_matched().await;
    assert!(initiator);
    alice.expect_matched().await;
}

#[tokio::test(start_paused = true)]
async fn test_leaving_the_queue_cancels_escalation() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle
        .join(
            alice.id,
            join_request(json!({ "sessionId": "alice", "maxWait": 2 })),
        )
        .unwrap();
    alice.expect_waiting().await;
    assert_eq!(handle.stats().await.unwrap().pending_escalations, 1);

    handle.next(alice.id, None).unwrap();
    sleep(Duration::from_secs(5)).await;

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.pending_escalations, 0);
    assert_eq!(stats.escalations_fired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_rearms_escalation() {
    let (handle, _engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle
        .join(
            alice.id,
            join_request(json!({ "sessionId": "alice", "maxWait": 2 })),
        )
        .unwrap();
    alice.expect_waiting().await;

    sleep(Duration::from_secs(1)).await;
    handle
        .join(
            alice.id,
            join_request(json!({ "sessionId": "alice", "maxWait": 5 })),
        )
        .unwrap();
    alice.expect_waiting().await;

    // The first arming would have fired at two seconds
    sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.stats().await.unwrap().escalations_fired, 0);

    sleep(Duration::from_secs(3)).await;
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.escalations_fired, 1);
    assert_eq!(stats.queue_length, 1);
}

#[tokio::test(start_paused = true)]
async fn test_escalation_picks_the_gender_compatible_candidate() {
    let (handle, _engine) = spawn_engine();

    let mut carol = FakeConnection::connect(&handle, Some("DE"));
    let mut dave = FakeConnection::connect(&handle, Some("DE"));
    let mut alice = FakeConnection::connect(&handle, Some("US"));

    // Wrong gender and wrong country
    handle
        .join(
            carol.id,
            join_request(json!({ "sessionId": "carol", "gender": "M", "maxWait": 600 })),
        )
        .unwrap();
    // Right gender, wrong country
    handle
        .join(
            dave.id,
            join_request(json!({
                "sessionId": "dave",
                "gender": "F",
                "wantGender": "F",
                "maxWait": 600
            })),
        )
        .unwrap();
    handle
        .join(
            alice.id,
            join_request(json!({
                "sessionId": "alice",
                "gender": "F",
                "wantGender": "F",
                "countries": ["FR"],
                "maxWait": 1
            })),
        )
        .unwrap();

    carol.expect_waiting().await;
    dave.expect_waiting().await;
    alice.expect_waiting().await;

    tokio::time::advance(Duration::from_millis(900)).await;
    settle(&handle).await;
    assert!(alice.drain().is_empty());
    assert_eq!(handle.stats().await.unwrap().queue_length, 3);

    let (room_id, initiator) = alice.expect_matched().await;
    assert!(initiator);
    let (dave_room, _) = dave.expect_matched().await;
    assert_eq!(dave_room, room_id);

    settle(&handle).await;
    assert!(carol.drain().is_empty());
    assert_eq!(handle.stats().await.unwrap().queue_length, 1);
}

#[tokio::test(start_paused = true)]
async fn test_huge_max_wait_keeps_the_engine_running() {
    let (handle, engine) = spawn_engine();
    let mut alice = FakeConnection::connect(&handle, None);

    handle
        .join(
            alice.id,
            join_request(json!({ "sessionId": "alice", "maxWait": 1e19 })),
        )
        .unwrap();
    alice.expect_waiting().await;

    sleep(Duration::from_secs(86_400)).await;
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.queue_length, 1);
    assert_eq!(stats.pending_escalations, 1);
    assert_eq!(stats.escalations_fired, 0);
    assert!(!engine.is_finished());

    let mut bob = FakeConnection::connect(&handle, None);
    handle.join(bob.id, plain_join("bob")).unwrap();
    bob.expect_matched().await;
    alice.expect_matched().await;
}
