//! Integration tests for the full room lifecycle.
//!
//! These tests verify the complete path a room travels:
//! - Create room (network provisioned, creator addressed)
//! - Other players join and receive distinct virtual IPs
//! - Game start and end
//! - Creator leaves (ownership handoff)
//! - Last member leaves (room and network disbanded)
//!
//! Tests use the in-memory repository and real backends, so no external
//! supernode or daemon is required.

use roomnet::{
    BackendRegistry, Config, MemoryRepository, RoomAction, RoomCoordinator, RoomStatus,
    RoomnetError, User, UserRepository,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

async fn setup(usernames: &[&str]) -> (Arc<MemoryRepository>, RoomCoordinator) {
    let config = Config::default();
    let repo = Arc::new(MemoryRepository::new());
    let registry =
        Arc::new(BackendRegistry::from_config(&config).expect("Failed to build registry"));
    let coordinator = RoomCoordinator::new(repo.clone(), repo.clone(), registry, &config);

    for username in usernames {
        repo.save_user(&User::new(username)).await.expect("Failed to seed user");
    }
    (repo, coordinator)
}

#[tokio::test]
async fn test_room_lifecycle_create_join_play_leave_disband() {
    let (repo, coordinator) = setup(&["alice", "bob", "carol", "dave"]).await;

    // Step 1: Create the room
    let room = coordinator
        .create_room("alice", "friday-lan", "fightcade", 4)
        .await
        .expect("Failed to create room");
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.creator, "alice");
    let network_id = room.network_id.clone().expect("Room should have a network");
    assert_eq!(room.network_name.as_deref(), Some(format!("room_{}", room.id).as_str()));
    assert!(room.network_secret.is_some());

    // Step 2: Two more players join and everyone holds a distinct IP
    coordinator.join_room("bob", room.id).await.expect("Failed to join room");
    let room_after_joins =
        coordinator.join_room("carol", room.id).await.expect("Failed to join room");
    assert_eq!(room_after_joins.players, vec!["alice", "bob", "carol"]);

    let mut ips = HashSet::new();
    for username in ["alice", "bob", "carol"] {
        let user = repo.get_user(username).await.unwrap().expect("User should exist");
        assert_eq!(user.current_room_id, Some(room.id));
        assert!(ips.insert(user.virtual_ip.expect("Member should hold a virtual IP")));
    }
    assert_eq!(ips.len(), 3);

    // The backend view agrees with the membership
    let backend = coordinator.registry().resolve(Some("n2n")).expect("n2n registered").clone();
    let info = backend.network_info(Some(&network_id)).await.expect("Failed to query network");
    assert_eq!(info.as_detail().expect("expected detail").active_users, 3);

    // Step 3: Start the game; the room stops accepting members
    let room_playing =
        coordinator.start_game("alice", room.id).await.expect("Failed to start game");
    assert_eq!(room_playing.status, RoomStatus::Playing);
    assert!(matches!(
        coordinator.join_room("dave", room.id).await,
        Err(RoomnetError::RoomNotJoinable { .. })
    ));

    // Step 4: End the game; the room reopens
    let room_reopened = coordinator.end_game("alice", room.id).await.expect("Failed to end game");
    assert_eq!(room_reopened.status, RoomStatus::Waiting);

    // Step 5: The creator leaves; ownership moves to the next member in
    // join order and their address is released
    let outcome = coordinator.leave_room("alice").await.expect("Failed to leave room");
    assert!(!outcome.disbanded);
    assert_eq!(outcome.new_creator.as_deref(), Some("bob"));

    let room_handed_over = coordinator.get_room(room.id).await.expect("Room should survive");
    assert_eq!(room_handed_over.creator, "bob");
    let alice = repo.get_user("alice").await.unwrap().expect("User should exist");
    assert_eq!(alice.current_room_id, None);
    assert_eq!(alice.virtual_ip, None);

    let info = backend.network_info(Some(&network_id)).await.expect("Failed to query network");
    assert_eq!(info.as_detail().expect("expected detail").active_users, 2);

    // Step 6: Everyone else leaves; the last leave disbands room and network
    coordinator.leave_room("bob").await.expect("Failed to leave room");
    let outcome = coordinator.leave_room("carol").await.expect("Failed to leave room");
    assert!(outcome.disbanded);

    assert!(matches!(
        coordinator.get_room(room.id).await,
        Err(RoomnetError::RoomNotFound { .. })
    ));
    assert!(matches!(
        backend.network_info(Some(&network_id)).await,
        Err(RoomnetError::UnknownNetwork { .. })
    ));
}

#[tokio::test]
async fn test_disband_frees_room_name_for_reuse() {
    let (_repo, coordinator) = setup(&["alice", "bob"]).await;

    let first = coordinator
        .create_room("alice", "friday-lan", "doom", 4)
        .await
        .expect("Failed to create room");
    assert!(matches!(
        coordinator.create_room("bob", "friday-lan", "doom", 4).await,
        Err(RoomnetError::RoomNameTaken { .. })
    ));

    coordinator.leave_room("alice").await.expect("Failed to leave room");

    let second = coordinator
        .create_room("bob", "friday-lan", "doom", 4)
        .await
        .expect("Name should be reusable after disband");
    assert_ne!(first.id, second.id);
    assert_ne!(first.network_id, second.network_id);
}

#[tokio::test]
async fn test_members_can_fetch_connection_command() {
    let (_repo, coordinator) = setup(&["alice"]).await;

    let room = coordinator
        .create_room("alice", "friday-lan", "doom", 4)
        .await
        .expect("Failed to create room");

    let command = coordinator
        .connection_command(room.id)
        .await
        .expect("Failed to build command")
        .expect("Room with a network should yield a command");
    assert!(command.starts_with(&format!("edge -c room_{} -k ", room.id)));
    assert!(command.contains(room.network_secret.as_deref().unwrap()));
    assert!(command.ends_with("-l 127.0.0.1:9527 -r"));
}

#[tokio::test]
async fn test_event_stream_follows_membership() {
    let (_repo, coordinator) = setup(&["alice", "bob"]).await;
    let mut joins_and_leaves =
        coordinator.event_bus().subscribe(vec![RoomAction::Joined, RoomAction::Left]);
    let mut everything = coordinator.event_bus().subscribe(vec![]);

    let room = coordinator
        .create_room("alice", "friday-lan", "doom", 4)
        .await
        .expect("Failed to create room");
    coordinator.join_room("bob", room.id).await.expect("Failed to join room");
    coordinator.start_game("alice", room.id).await.expect("Failed to start game");
    coordinator.end_game("alice", room.id).await.expect("Failed to end game");
    coordinator.leave_room("bob").await.expect("Failed to leave room");

    // The filtered subscriber sees only membership changes
    let event = recv(&mut joins_and_leaves).await;
    assert_eq!(event.action, RoomAction::Joined);
    assert_eq!(event.username, "bob");
    assert_eq!(event.players, vec!["alice", "bob"]);

    let event = recv(&mut joins_and_leaves).await;
    assert_eq!(event.action, RoomAction::Left);
    assert_eq!(event.players, vec!["alice"]);

    // The unfiltered subscriber sees the whole lifecycle in order
    let mut actions = Vec::new();
    for _ in 0..5 {
        actions.push(recv(&mut everything).await.action);
    }
    assert_eq!(
        actions,
        vec![
            RoomAction::Created,
            RoomAction::Joined,
            RoomAction::Started,
            RoomAction::Ended,
            RoomAction::Left,
        ]
    );
}

async fn recv(subscriber: &mut roomnet::RoomEventSubscriber) -> roomnet::RoomEvent {
    tokio::time::timeout(Duration::from_millis(200), subscriber.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event bus closed")
}
