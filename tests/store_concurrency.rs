//! Concurrency properties of the entity store: insert uniqueness under
//! contention, single-winner compare-and-swap, and idempotent removal.

use std::sync::Arc;

use registry_core::models::{Order, OrderStatus};
use registry_core::{Decimal, EntityStore, Record};
use uuid::Uuid;

fn order(customer: &str, amount: i64) -> Order {
    Order::new(customer, Decimal::from(amount))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_inserts_produce_one_entry_per_generated_id() {
    let store: Arc<EntityStore<Order>> = Arc::new(EntityStore::new());
    let writers = 8;
    let per_writer = 200;

    let mut handles = Vec::new();
    for w in 0..writers {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::with_capacity(per_writer);
            for i in 0..per_writer {
                let id = store
                    .insert(order(&format!("customer-{w}-{i}"), 1))
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.await.unwrap());
    }

    all_ids.sort();
    all_ids.dedup();
    assert_eq!(all_ids.len(), writers * per_writer);
    assert_eq!(store.len(), writers * per_writer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_inserts_of_the_same_id_admit_exactly_one() {
    let store: Arc<EntityStore<Order>> = Arc::new(EntityStore::new());
    let shared_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for w in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut contender = order(&format!("contender-{w}"), w);
            contender.id = Some(shared_id);
            store.insert(contender).unwrap()
        }));
    }

    for handle in handles {
        // Every call reports the shared id; only one entry exists.
        assert_eq!(handle.await.unwrap(), shared_id);
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn two_racing_compare_and_updates_have_exactly_one_winner() {
    let store: Arc<EntityStore<Order>> = Arc::new(EntityStore::new());
    let id = store.insert(order("alice", 10)).unwrap();
    let stale = store.get(id).unwrap();

    let barrier = Arc::new(std::sync::Barrier::new(2));
    let mut handles = Vec::new();
    for offset in [1i64, 2] {
        let store = store.clone();
        let stale = stale.clone();
        let barrier = barrier.clone();
        handles.push(std::thread::spawn(move || {
            let mut updated = stale.clone();
            updated.total_amount += Decimal::from(offset);
            barrier.wait();
            store.compare_and_update(id, &stale, updated).unwrap()
        }));
    }

    let outcomes: Vec<bool> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();
    assert_eq!(outcomes.iter().filter(|won| **won).count(), 1);
}

#[test]
fn compare_and_swap_retry_loop_loses_no_updates() {
    let store: Arc<EntityStore<Order>> = Arc::new(EntityStore::new());
    let id = store.insert(order("counter", 0)).unwrap();

    let threads = 4;
    let increments_per_thread = 100;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..increments_per_thread {
                    // Read-then-CAS, retrying on a lost race.
                    loop {
                        let current = store.get(id).unwrap();
                        let mut bumped = current.clone();
                        bumped.total_amount += Decimal::ONE;
                        if store.compare_and_update(id, &current, bumped).unwrap() {
                            break;
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let expected = Decimal::from(threads * increments_per_thread);
    assert_eq!(store.get(id).unwrap().total_amount, expected);
}

#[test]
fn removing_a_missing_key_leaves_the_store_unchanged() {
    let store: EntityStore<Order> = EntityStore::new();
    store.insert(order("alice", 10)).unwrap();

    assert!(!store.remove(Uuid::new_v4()).unwrap());
    assert_eq!(store.len(), 1);
}

#[test]
fn stale_compare_and_update_never_mutates() {
    let store: EntityStore<Order> = EntityStore::new();
    let id = store.insert(order("alice", 10)).unwrap();
    let original = store.get(id).unwrap();

    // Another writer moves the record forward.
    let mut shipped = original.clone();
    shipped.status = OrderStatus::Shipped;
    assert!(store
        .compare_and_update(id, &original, shipped.clone())
        .unwrap());

    // The stale writer is refused, and the winning value is untouched.
    let mut stale_edit = original.clone();
    stale_edit.total_amount = Decimal::from(9999);
    assert!(!store.compare_and_update(id, &original, stale_edit).unwrap());
    assert_eq!(store.get(id).unwrap(), shipped);
}

#[test]
fn assigned_identity_is_stable_across_updates() {
    let store: EntityStore<Order> = EntityStore::new();
    let id = store.insert(order("alice", 10)).unwrap();

    let current = store.get(id).unwrap();
    let mut updated = current.clone();
    updated.total_amount = Decimal::from(20);
    store.compare_and_update(id, &current, updated).unwrap();

    assert_eq!(store.get(id).unwrap().id(), Some(id));
}
