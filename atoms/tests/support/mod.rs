#![allow(dead_code)]

use std::time::Duration;

use dispatch_atoms::ambulances::Ambulance;
use dispatch_atoms::store::{Collection, DocumentStore, MemoryStore};
use dispatch_atoms::users::User;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;

pub async fn seed_driver(store: &MemoryStore, id: &str, active: bool, available: bool, assigned: &[&str]) {
    store
        .insert(
            Collection::Users,
            id,
            json!({
                "role": "ambulanceDriver",
                "isActive": active,
                "roleSpecificData": {
                    "isAvailable": available,
                    "assignedAmbulances": assigned,
                },
            }),
        )
        .await
        .expect("seed driver");
}

pub async fn seed_user(store: &MemoryStore, id: &str, role: &str) {
    store
        .insert(Collection::Users, id, json!({"role": role, "isActive": true}))
        .await
        .expect("seed user");
}

pub async fn seed_ambulance(store: &MemoryStore, id: &str, status: &str) {
    store
        .insert(
            Collection::Ambulances,
            id,
            json!({"status": status, "currentDriverId": null, "vehicleNumber": format!("AMB-{}", id)}),
        )
        .await
        .expect("seed ambulance");
}

pub async fn read_driver(store: &MemoryStore, id: &str) -> User {
    let doc = store
        .get(Collection::Users, id)
        .await
        .expect("read driver")
        .expect("driver exists");
    User::from_document(id, doc).expect("decode driver")
}

pub async fn read_ambulance(store: &MemoryStore, id: &str) -> Ambulance {
    let doc = store
        .get(Collection::Ambulances, id)
        .await
        .expect("read ambulance")
        .expect("ambulance exists");
    Ambulance::from_document(id, doc).expect("decode ambulance")
}

pub fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|item| id(item).to_string()).collect()
}

/// Next item of a live stream, failing the test if nothing arrives in time.
pub async fn next_snapshot<T>(stream: &mut BoxStream<'_, T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("snapshot before timeout")
        .expect("stream still open")
}

/// Assert the stream stays quiet for a short while.
pub async fn assert_quiet<T: std::fmt::Debug>(stream: &mut BoxStream<'_, T>) {
    let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(pending.is_err(), "unexpected snapshot: {:?}", pending);
}
