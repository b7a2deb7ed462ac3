//! Integration tests for the periodic sweeps and health reporting.
//!
//! - Offline members are evicted through the normal leave path
//! - Rooms emptied by eviction are disbanded along with their networks
//! - Idle overlay networks with no assignments are reclaimed
//! - Backend health reflects what each backend is running

use roomnet::{
    BackendRegistry, Config, HealthStatus, MemoryRepository, RoomCoordinator, RoomRepository,
    RoomnetError, User, UserRepository,
};
use std::sync::Arc;
use std::time::Duration;

fn sweep_config() -> Config {
    let mut config = Config::default();
    // Zero idle window so a freshly abandoned network is already eligible
    config.cleanup.max_idle_secs = 0;
    config
}

async fn setup(config: &Config, usernames: &[&str]) -> (Arc<MemoryRepository>, RoomCoordinator) {
    let repo = Arc::new(MemoryRepository::new());
    let registry =
        Arc::new(BackendRegistry::from_config(config).expect("Failed to build registry"));
    let coordinator = RoomCoordinator::new(repo.clone(), repo.clone(), registry, config);

    for username in usernames {
        repo.save_user(&User::new(username)).await.expect("Failed to seed user");
    }
    (repo, coordinator)
}

#[tokio::test]
async fn test_offline_sweep_evicts_and_disbands() {
    let config = Config::default();
    let (repo, coordinator) = setup(&config, &["alice", "bob", "carol"]).await;

    let doomed = coordinator
        .create_room("alice", "doomed", "doom", 4)
        .await
        .expect("Failed to create room");
    coordinator.join_room("bob", doomed.id).await.expect("Failed to join room");
    let healthy = coordinator
        .create_room("carol", "healthy", "quake", 4)
        .await
        .expect("Failed to create room");

    // Everyone in the doomed room logs out
    for username in ["alice", "bob"] {
        let mut user = repo.get_user(username).await.unwrap().expect("User should exist");
        user.active = false;
        repo.save_user(&user).await.expect("Failed to save user");
    }

    let report = coordinator.sweep_offline_members().await.expect("Sweep failed");
    assert_eq!(report.members_removed, 2);
    assert_eq!(report.rooms_disbanded, 1);
    assert_eq!(report.failures, 0);

    assert!(matches!(
        coordinator.get_room(doomed.id).await,
        Err(RoomnetError::RoomNotFound { .. })
    ));
    let survivor = coordinator.get_room(healthy.id).await.expect("Healthy room should survive");
    assert_eq!(survivor.players, vec!["carol"]);

    // The doomed room's network went with it
    let doomed_network = doomed.network_id.as_deref().expect("Room should have a network");
    let backend = coordinator.registry().resolve(Some("n2n")).expect("n2n registered");
    assert!(matches!(
        backend.network_info(Some(doomed_network)).await,
        Err(RoomnetError::UnknownNetwork { .. })
    ));

    // A second sweep finds nothing left to do
    let report = coordinator.sweep_offline_members().await.expect("Sweep failed");
    assert_eq!(report.members_removed, 0);
}

#[tokio::test]
async fn test_idle_network_sweep_spares_occupied_networks() {
    let config = sweep_config();
    let (_repo, coordinator) = setup(&config, &["alice"]).await;

    // A room whose creator holds an address keeps its network occupied
    let room = coordinator
        .create_room("alice", "occupied", "doom", 4)
        .await
        .expect("Failed to create room");
    let occupied_id = room.network_id.clone().expect("Room should have a network");

    // An orphan network with no assignments, left behind by a crashed room
    let backend = coordinator.registry().resolve(Some("n2n")).expect("n2n registered").clone();
    let orphan = backend.create_network().await.expect("Failed to create network");

    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = coordinator.purge_orphan_networks().await;
    assert_eq!(report.reclaimed, 1);
    assert_eq!(report.failures, 0);

    assert!(backend.network_info(Some(&occupied_id)).await.is_ok());
    assert!(matches!(
        backend.network_info(Some(&orphan.id)).await,
        Err(RoomnetError::UnknownNetwork { .. })
    ));

    // Once the room disbands normally its network is already gone, so the
    // next purge has nothing to reclaim
    coordinator.leave_room("alice").await.expect("Failed to leave room");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = coordinator.purge_orphan_networks().await;
    assert_eq!(report.reclaimed, 0);
}

#[tokio::test]
async fn test_cleanup_deletes_rooms_left_empty() {
    let config = Config::default();
    let (repo, coordinator) = setup(&config, &["alice"]).await;

    let room = coordinator
        .create_room("alice", "abandoned", "doom", 4)
        .await
        .expect("Failed to create room");

    // Simulate a crash that emptied the member list without deleting the room
    let mut orphaned = coordinator.get_room(room.id).await.expect("Room should exist");
    orphaned.players.clear();
    repo.update_room(&orphaned).await.expect("Failed to update room");

    let report = coordinator.cleanup_empty_rooms().await.expect("Cleanup failed");
    assert_eq!(report.rooms_disbanded, 1);
    assert!(matches!(
        coordinator.get_room(room.id).await,
        Err(RoomnetError::RoomNotFound { .. })
    ));
}

#[tokio::test]
async fn test_backend_health_reports_per_technology() {
    let config = Config::default();
    let (_repo, coordinator) = setup(&config, &["alice"]).await;
    coordinator.create_room("alice", "lan", "doom", 4).await.expect("Failed to create room");

    let health = coordinator.registry().check_health().await;
    assert_eq!(health.len(), 2);

    let n2n = health.iter().find(|h| h.technology == "n2n").expect("n2n entry");
    assert!(matches!(n2n.status, HealthStatus::Healthy));
    assert_eq!(n2n.total_networks, 1);

    let zerotier = health.iter().find(|h| h.technology == "zerotier").expect("zerotier entry");
    assert!(matches!(zerotier.status, HealthStatus::Healthy));
    assert_eq!(zerotier.total_networks, 0);
}
