mod support;

use dispatch_atoms::assignments;
use dispatch_atoms::store::MemoryStore;
use dispatch_atoms::users::{self, User};
use dispatch_atoms::DispatchError;
use rstest::{fixture, rstest};
use support::*;

#[fixture]
async fn fleet() -> MemoryStore {
    let store = MemoryStore::new();
    seed_ambulance(&store, "amb-available", "available").await;
    seed_ambulance(&store, "amb-offline", "offline").await;
    seed_ambulance(&store, "amb-busy", "on_duty").await;
    seed_ambulance(&store, "amb-busy-2", "on_duty").await;
    store
}

fn driver_ids(drivers: &[User]) -> Vec<String> {
    ids(drivers, |d| d.id.as_str())
}

#[rstest]
#[tokio::test]
async fn hospital_listing_skips_drivers_without_ambulances(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "d-assigned", true, false, &["amb-busy"]).await;
    seed_driver(&store, "d-empty", true, true, &[]).await;
    seed_driver(&store, "d-inactive", false, true, &["amb-offline"]).await;
    seed_user(&store, "staff", "hospitalStaff").await;

    let drivers = users::drivers_for_hospital(&store, "hospital-1").await.unwrap();

    assert_eq!(driver_ids(&drivers), vec!["d-assigned"]);
}

#[rstest]
#[tokio::test]
async fn hospital_id_does_not_narrow_the_listing(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "d1", true, true, &["amb-available"]).await;
    seed_driver(&store, "d2", true, true, &["amb-offline"]).await;

    let a = users::drivers_for_hospital(&store, "hospital-a").await.unwrap();
    let b = users::drivers_for_hospital(&store, "hospital-b").await.unwrap();

    assert_eq!(a, b);
    assert_eq!(driver_ids(&a), vec!["d1", "d2"]);
}

#[rstest]
#[case::no_ambulances(&[], true)]
#[case::available(&["amb-available"], true)]
#[case::offline(&["amb-offline"], true)]
#[case::all_on_duty(&["amb-busy", "amb-busy-2"], false)]
#[case::one_free_of_several(&["amb-busy", "amb-offline"], true)]
#[case::only_missing_ambulance(&["amb-ghost"], false)]
#[tokio::test]
async fn available_drivers_need_a_free_ambulance_or_none(
    #[future] fleet: MemoryStore,
    #[case] assigned: &[&str],
    #[case] listed: bool,
) {
    let store = fleet.await;
    seed_driver(&store, "d1", true, true, assigned).await;

    let drivers = users::available_drivers(&store, "hospital-1").await.unwrap();

    assert_eq!(!drivers.is_empty(), listed);
}

#[rstest]
#[tokio::test]
async fn off_shift_and_inactive_drivers_are_not_available(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "off-shift", true, false, &["amb-available"]).await;
    seed_driver(&store, "inactive", false, true, &["amb-available"]).await;
    seed_driver(&store, "on-shift", true, true, &["amb-available"]).await;

    let drivers = users::available_drivers(&store, "hospital-1").await.unwrap();

    assert_eq!(driver_ids(&drivers), vec!["on-shift"]);
}

#[rstest]
#[tokio::test]
async fn set_availability_records_flag_and_time(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "d1", true, false, &[]).await;

    users::set_availability(&store, "d1", true).await.unwrap();

    let driver = read_driver(&store, "d1").await;
    assert!(driver.role_specific_data.is_available);
    assert!(driver.role_specific_data.last_availability_update.is_some());
    assert!(driver.updated_at.is_some());
}

#[rstest]
#[tokio::test]
async fn set_availability_on_missing_driver_is_a_generic_failure(#[future] fleet: MemoryStore) {
    let store = fleet.await;

    let err = users::set_availability(&store, "nobody", true).await.unwrap_err();

    assert!(matches!(err, DispatchError::Operation { .. }));
    assert!(err.to_string().starts_with("Failed to update availability: "));
}

#[rstest]
#[tokio::test]
async fn get_driver_reports_missing_driver(#[future] fleet: MemoryStore) {
    let store = fleet.await;

    let err = users::get_driver(&store, "nobody").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Driver not found");
}

#[rstest]
#[tokio::test]
async fn hospital_listing_follows_assignments_live(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "d1", true, true, &[]).await;
    let mut live = users::list_drivers_for_hospital(&store, "hospital-1");

    assert!(next_snapshot(&mut live).await.unwrap().is_empty());

    assignments::assign(&store, "d1", "amb-available").await.unwrap();
    let drivers = next_snapshot(&mut live).await.unwrap();
    assert_eq!(driver_ids(&drivers), vec!["d1"]);

    // An unrelated user change produces an identical snapshot, which is suppressed.
    seed_user(&store, "patient-1", "patient").await;
    assert_quiet(&mut live).await;
}

#[rstest]
#[tokio::test]
async fn available_listing_reacts_to_ambulance_status(#[future] fleet: MemoryStore) {
    let store = fleet.await;
    seed_driver(&store, "d1", true, true, &["amb-busy"]).await;
    let mut live = users::list_available_drivers(&store, "hospital-1");

    assert!(next_snapshot(&mut live).await.unwrap().is_empty());

    dispatch_atoms::ambulances::update_ambulance_status(
        &store,
        "amb-busy",
        dispatch_atoms::ambulances::AmbulanceStatus::Available,
    )
    .await
    .unwrap();

    let drivers = next_snapshot(&mut live).await.unwrap();
    assert_eq!(driver_ids(&drivers), vec!["d1"]);
}
