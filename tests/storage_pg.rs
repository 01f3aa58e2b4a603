mod common;

use common::link;
use shortlink::domain::repositories::{Storage, StorageError, UniquenessPolicy};
use shortlink::infrastructure::persistence::PgStorage;
use sqlx::PgPool;

async fn storage(pool: PgPool, policy: UniquenessPolicy) -> PgStorage {
    let storage = PgStorage::new(pool, policy);
    storage.bootstrap().await.unwrap();
    storage
}

#[sqlx::test(migrations = "./migrations")]
async fn test_save_and_lookups(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    let saved = link("alice", "aaaa1111", "http://a.com");
    store.save(saved.clone()).await.unwrap();

    assert_eq!(store.get_by_code("aaaa1111").await.unwrap(), saved);
    assert_eq!(store.get_by_id(saved.id).await.unwrap(), saved);
    assert_eq!(store.get_by_original_url("http://a.com").await.unwrap(), saved);
    assert!(store.get_by_code("missing0").await.unwrap_err().is_not_found());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_write_errors_are_classified(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    let saved = link("alice", "aaaa1111", "http://a.com");
    store.save(saved.clone()).await.unwrap();

    let err = store
        .save(link("bob", "bbbb2222", "http://a.com"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = store
        .save(link("bob", "aaaa1111", "http://b.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateCode { .. }));

    let mut same_id = link("bob", "cccc3333", "http://c.com");
    same_id.id = saved.id;
    let err = store.save(same_id).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateId { id } if id == saved.id));
    assert_eq!(store.get_by_id(saved.id).await.unwrap().owner, "alice");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_insert_batch_rolls_back(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    store
        .save(link("alice", "aaaa1111", "http://a.com"))
        .await
        .unwrap();

    let err = store
        .insert_batch(vec![
            link("alice", "bbbb2222", "http://b.com"),
            link("alice", "cccc3333", "http://a.com"),
        ])
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(store.get_by_code("bbbb2222").await.unwrap_err().is_not_found());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_batch_conflict_in_the_middle_rolls_back(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    let first = link("alice", "aaaa1111", "http://a.com");
    let second = link("alice", "bbbb2222", "http://b.com");
    let third = link("alice", "cccc3333", "http://c.com");
    store
        .insert_batch(vec![first.clone(), second.clone(), third.clone()])
        .await
        .unwrap();

    let mut first_changed = first.clone();
    first_changed.original_url = "http://a2.com".into();
    let mut second_clash = second.clone();
    second_clash.original_url = "http://c.com".into();
    let mut third_changed = third.clone();
    third_changed.original_url = "http://c2.com".into();

    let err = store
        .update_batch(vec![first_changed, second_clash, third_changed])
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(store.get_by_code("aaaa1111").await.unwrap(), first);
    assert_eq!(store.get_by_code("bbbb2222").await.unwrap(), second);
    assert_eq!(store.get_by_code("cccc3333").await.unwrap(), third);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_batch_unknown_id_rolls_back(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    let existing = link("alice", "aaaa1111", "http://a.com");
    store.save(existing.clone()).await.unwrap();

    let mut changed = existing.clone();
    changed.original_url = "http://a2.com".into();
    let unknown = link("alice", "zzzz9999", "http://z.com");

    let err = store
        .update_batch(vec![changed, unknown])
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.get_by_code("aaaa1111").await.unwrap(), existing);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_respects_ownership(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    store
        .insert_batch(vec![
            link("alice", "aaaa1111", "http://a.com"),
            link("bob", "bbbb2222", "http://b.com"),
        ])
        .await
        .unwrap();

    let codes = vec!["aaaa1111".to_string(), "bbbb2222".to_string()];
    store.delete_flag_batch(&codes, "alice").await.unwrap();
    store.delete_flag_batch(&codes, "alice").await.unwrap();

    assert!(store.get_by_code("aaaa1111").await.unwrap().is_deleted());
    assert!(!store.get_by_code("bbbb2222").await.unwrap().is_deleted());

    let mut undelete = store.get_by_code("aaaa1111").await.unwrap();
    undelete.deleted = false;
    store.update_batch(vec![undelete]).await.unwrap();
    assert!(store.get_by_code("aaaa1111").await.unwrap().is_deleted());

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.urls, 1);
    assert_eq!(stats.users, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deleted_url_stays_reserved_by_default(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    store
        .save(link("alice", "aaaa1111", "http://a.com"))
        .await
        .unwrap();
    store
        .delete_flag_batch(&["aaaa1111".to_string()], "alice")
        .await
        .unwrap();

    let err = store
        .save(link("alice", "bbbb2222", "http://a.com"))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_live_only_allows_resave_after_delete(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::LiveOnly).await;
    store
        .save(link("alice", "aaaa1111", "http://a.com"))
        .await
        .unwrap();

    let err = store
        .save(link("bob", "bbbb2222", "http://a.com"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    store
        .delete_flag_batch(&["aaaa1111".to_string()], "alice")
        .await
        .unwrap();
    store
        .save(link("alice", "cccc3333", "http://a.com"))
        .await
        .unwrap();

    let canonical = store.get_by_original_url("http://a.com").await.unwrap();
    assert_eq!(canonical.code, "cccc3333");
    assert!(store.get_by_code("aaaa1111").await.unwrap().is_deleted());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_ping(pool: PgPool) {
    let store = storage(pool, UniquenessPolicy::IncludeDeleted).await;
    store.ping().await.unwrap();
}
