use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use rolewarden_application::{GrantStore, UpsertGrantInput};
use rolewarden_core::{GrantId, PrincipalId, RealmId, RoleId};

use super::PostgresGrantStore;

async fn test_store() -> Option<PostgresGrantStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool: PgPool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    let store = PostgresGrantStore::new(pool);
    if let Err(error) = store.ensure_schema().await {
        panic!("failed to ensure grant schema for tests: {error}");
    }

    Some(store)
}

fn input(principal: i64, realm: i64, role: i64, expires_in: Duration) -> UpsertGrantInput {
    UpsertGrantInput {
        principal_id: PrincipalId::new(principal),
        realm_id: RealmId::new(realm),
        role_id: RoleId::new(role),
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };

    // test_store already created the schema once.
    assert!(store.ensure_schema().await.is_ok());
    assert!(store.ensure_schema().await.is_ok());
}

#[tokio::test]
async fn upsert_replaces_the_grant_for_the_same_triple() {
    let Some(store) = test_store().await else {
        return;
    };
    let realm = 910_001;

    let first = store.upsert(input(1, realm, 99, Duration::hours(1))).await;
    let second_input = input(1, realm, 99, Duration::hours(2));
    let second = store.upsert(second_input).await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("upsert failed");
    };
    assert_eq!(first.id, second.id);
    assert_eq!(
        second.expires_at.timestamp_micros(),
        second_input.expires_at.timestamp_micros()
    );

    let active = store
        .list_active(PrincipalId::new(1), RealmId::new(realm), Utc::now())
        .await
        .unwrap_or_default();
    assert_eq!(active.len(), 1);
    assert_eq!(
        active[0].expires_at.timestamp_micros(),
        second_input.expires_at.timestamp_micros()
    );

    assert!(store.delete_many(&[second.id]).await.is_ok());
}

#[tokio::test]
async fn expired_and_active_grants_partition_strictly() {
    let Some(store) = test_store().await else {
        return;
    };
    let realm = 910_002;

    let stale = store.upsert(input(1, realm, 98, -Duration::minutes(5))).await;
    let live = store.upsert(input(1, realm, 99, Duration::hours(1))).await;
    let (Ok(stale), Ok(live)) = (stale, live) else {
        panic!("upsert failed");
    };

    let now = Utc::now();
    let expired: Vec<GrantId> = store
        .list_expired(now)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|grant| grant.realm_id == RealmId::new(realm))
        .map(|grant| grant.id)
        .collect();
    assert_eq!(expired, vec![stale.id]);

    let active = store
        .list_active(PrincipalId::new(1), RealmId::new(realm), now)
        .await
        .unwrap_or_default();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, live.id);

    assert!(store.delete_many(&[stale.id, live.id]).await.is_ok());
}

#[tokio::test]
async fn list_expired_returns_oldest_expiry_first() {
    let Some(store) = test_store().await else {
        return;
    };
    let realm = 910_003;

    let newest = store.upsert(input(1, realm, 97, -Duration::minutes(1))).await;
    let oldest = store.upsert(input(2, realm, 98, -Duration::minutes(30))).await;
    let middle = store.upsert(input(3, realm, 99, -Duration::minutes(10))).await;
    let (Ok(newest), Ok(oldest), Ok(middle)) = (newest, oldest, middle) else {
        panic!("upsert failed");
    };

    let ordered: Vec<GrantId> = store
        .list_expired(Utc::now())
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|grant| grant.realm_id == RealmId::new(realm))
        .map(|grant| grant.id)
        .collect();
    assert_eq!(ordered, vec![oldest.id, middle.id, newest.id]);

    assert!(
        store
            .delete_many(&[oldest.id, middle.id, newest.id])
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn delete_many_ignores_identifiers_already_absent() {
    let Some(store) = test_store().await else {
        return;
    };
    let realm = 910_004;

    let Ok(grant) = store.upsert(input(1, realm, 99, Duration::hours(1))).await else {
        panic!("upsert failed");
    };

    let deleted = store
        .delete_many(&[grant.id, GrantId::new(i64::MAX - 7)])
        .await;
    assert!(matches!(deleted, Ok(1)));

    let deleted_again = store.delete_many(&[grant.id]).await;
    assert!(matches!(deleted_again, Ok(0)));
}

#[tokio::test]
async fn count_includes_expired_rows_awaiting_reconciliation() {
    let Some(store) = test_store().await else {
        return;
    };
    let realm = 910_005;

    let Ok(stale) = store.upsert(input(1, realm, 99, -Duration::minutes(5))).await else {
        panic!("upsert failed");
    };

    let total = store.count().await.unwrap_or_default();
    assert!(total >= 1);

    assert!(store.delete_many(&[stale.id]).await.is_ok());
}
