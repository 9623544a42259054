//! Property tests for the wait queue and the partner scan

use pairing_room::connection::LiveConnections;
use pairing_room::matchmaking::{CompatibilityMatcher, PartnerMatcher, WaitQueue};
use pairing_room::transport::ServerMessage;
use pairing_room::types::{ConnectionId, CountryCode, Gender, Participant};
use pairing_room::utils::current_timestamp;
use proptest::prelude::*;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(usize),
    Remove(usize),
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        (0..8usize).prop_map(QueueOp::Enqueue),
        (0..8usize).prop_map(QueueOp::Remove),
    ]
}

fn gender() -> impl Strategy<Value = Gender> {
    prop::sample::select(vec![
        Gender::Male,
        Gender::Female,
        Gender::Other,
        Gender::Unknown,
    ])
}

fn country() -> impl Strategy<Value = Option<&'static str>> {
    prop::sample::select(vec![None, Some("US"), Some("DE"), Some("BR")])
}

#[derive(Debug, Clone)]
struct Profile {
    session: u8,
    gender: Gender,
    want_gender: Option<Gender>,
    country: Option<&'static str>,
    filter: Vec<&'static str>,
    interests: Vec<&'static str>,
}

fn profile() -> impl Strategy<Value = Profile> {
    (
        0..4u8,
        gender(),
        prop::option::of(gender()),
        country(),
        prop::sample::subsequence(vec!["US", "DE", "BR"], 0..=2),
        prop::sample::subsequence(vec!["music", "games", "art", "film"], 0..=3),
    )
        .prop_map(
            |(session, gender, want_gender, country, filter, interests)| Profile {
                session,
                gender,
                want_gender,
                country,
                filter,
                interests,
            },
        )
}

fn participant(id: ConnectionId, profile: &Profile) -> Participant {
    Participant {
        connection_id: id,
        session_id: format!("session_{}", profile.session),
        gender: profile.gender,
        want_gender: profile.want_gender,
        boost_active: false,
        country_filter: profile
            .filter
            .iter()
            .filter_map(|c| CountryCode::parse(c))
            .collect(),
        resolved_country: profile.country.and_then(CountryCode::parse),
        interests: profile.interests.iter().map(|s| s.to_string()).collect(),
        max_wait_seconds: 5,
        joined_at: current_timestamp(),
    }
}

proptest! {
    #[test]
    fn prop_queue_is_duplicate_free_and_ordered(ops in prop::collection::vec(queue_op(), 0..64)) {
        let ids: Vec<ConnectionId> = (0..8).map(|_| Uuid::new_v4()).collect();
        let profile = Profile {
            session: 0,
            gender: Gender::Unknown,
            want_gender: None,
            country: None,
            filter: Vec::new(),
            interests: Vec::new(),
        };

        let mut queue = WaitQueue::new();
        let mut model: Vec<ConnectionId> = Vec::new();

        for op in ops {
            match op {
                QueueOp::Enqueue(i) => {
                    queue.enqueue(participant(ids[i], &profile));
                    model.retain(|id| *id != ids[i]);
                    model.push(ids[i]);
                }
                QueueOp::Remove(i) => {
                    queue.remove(ids[i]);
                    model.retain(|id| *id != ids[i]);
                }
            }

            let order: Vec<ConnectionId> = queue.iter().map(|p| p.connection_id).collect();
            prop_assert_eq!(&order, &model);
        }
    }

    #[test]
    fn prop_scan_picks_a_compatible_partner_when_one_exists(
        user in profile(),
        waiting in prop::collection::vec(profile(), 0..12),
        ignore_country in any::<bool>(),
    ) {
        let matcher = CompatibilityMatcher::new();
        let mut connections = LiveConnections::new();
        let mut receivers: Vec<mpsc::UnboundedReceiver<ServerMessage>> = Vec::new();
        let mut queue = WaitQueue::new();

        for profile in &waiting {
            let (tx, rx) = mpsc::unbounded_channel();
            let candidate = participant(Uuid::new_v4(), profile);
            connections.register(candidate.connection_id, tx, candidate.resolved_country.clone());
            receivers.push(rx);
            queue.enqueue(candidate);
        }

        let user = participant(Uuid::new_v4(), &user);
        let outcome = matcher.find_candidate(&user, &queue, &connections, ignore_country);
        prop_assert!(outcome.stale.is_empty());

        let any_compatible = queue
            .iter()
            .any(|c| matcher.is_compatible(&user, c, ignore_country));

        match outcome.candidate {
            Some(candidate) => {
                prop_assert_ne!(candidate.connection_id, user.connection_id);
                prop_assert_ne!(&candidate.session_id, &user.session_id);
                prop_assert!(matcher.is_compatible(&user, &candidate, ignore_country));
            }
            None => prop_assert!(!any_compatible),
        }
    }
}
