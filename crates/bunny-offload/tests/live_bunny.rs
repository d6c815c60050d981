//! Tests against real services. Run with `--ignored` and a populated `.env`.

use std::time::Duration;

use bunny_models::UserId;
use bunny_offload::{LockStore, MetadataStore, OffloadService, RedisStore};

/// Test Redis lock round trip.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_lock_round_trip() {
    dotenvy::dotenv().ok();

    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
    let store = RedisStore::new(&url).expect("Failed to create store");

    let key = format!("live_test_lock_{}", uuid::Uuid::new_v4());
    let token = store
        .try_acquire(&key, Duration::from_secs(5))
        .await
        .expect("Failed to acquire")
        .expect("Lock should be free");

    assert!(store
        .try_acquire(&key, Duration::from_secs(5))
        .await
        .expect("Failed to query lock")
        .is_none());

    store.release(&key, &token).await.expect("Failed to release");
    assert!(store.user_collection(UserId(u64::MAX)).await.unwrap().is_none());
}

/// Test listing libraries with real credentials.
#[tokio::test]
#[ignore = "requires Bunny credentials"]
async fn test_list_libraries() {
    dotenvy::dotenv().ok();

    let service = OffloadService::from_env().expect("Failed to create service");
    let libraries = service
        .client()
        .list_video_libraries()
        .await
        .expect("Failed to list libraries");

    for library in libraries {
        println!("{} {} {}", library.id, library.name, library.resolved_hostname());
    }
}
