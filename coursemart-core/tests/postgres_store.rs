//! PostgreSQL credential store behaviour. Needs `DATABASE_URL`; run with
//! `cargo test -p coursemart-core -- --ignored`.

#![cfg(feature = "database")]

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use coursemart_core::domain::users::auth::{
    AuthCrypto, CredentialStore, LoginRequest, RegisterRequest, RotationOutcome, SessionManager,
    StoreError, TokenService, TokenSettings,
};
use coursemart_core::domain::users::identity::{CourseId, UserId, UserIdentity};
use coursemart_core::infrastructure::PostgresCredentialStore;
use sqlx::PgPool;
use uuid::Uuid;

fn identity(email: &str, username: &str, tokens: &[&str]) -> UserIdentity {
    let mut identity =
        UserIdentity::new(UserId::new(), email.into(), username.into(), "hash".into());
    identity.refresh_tokens = tokens.iter().map(|t| t.to_string()).collect();
    identity
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn unique_indexes_report_conflicting_field(pool: PgPool) -> Result<()> {
    let store = PostgresCredentialStore::new(pool);
    store.create(identity("a@x.com", "alice", &[])).await?;

    let err = store
        .create(identity("a@x.com", "bob", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "email" }));

    let err = store
        .create(identity("b@x.com", "alice", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "username" }));
    Ok(())
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn rotation_swaps_only_held_tokens(pool: PgPool) -> Result<()> {
    let store = PostgresCredentialStore::new(pool);
    let user = store
        .create(identity("a@x.com", "alice", &["t1", "t2"]))
        .await?;

    assert_eq!(
        store.rotate_refresh_token(user.id, "t1", "t3").await?,
        RotationOutcome::Rotated
    );
    assert_eq!(
        store.rotate_refresh_token(user.id, "t1", "t4").await?,
        RotationOutcome::TokenNotPresent
    );
    assert_eq!(
        store.rotate_refresh_token(UserId::new(), "t2", "t5").await?,
        RotationOutcome::IdentityMissing
    );

    let stored = store.find_by_id(user.id).await?.expect("row exists");
    assert_eq!(stored.refresh_tokens, vec!["t2".to_string(), "t3".to_string()]);
    Ok(())
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn push_evicts_and_preserves_order(pool: PgPool) -> Result<()> {
    let store = PostgresCredentialStore::new(pool);
    let user = store
        .create(identity("a@x.com", "alice", &["a", "b", "c"]))
        .await?;

    assert!(store.push_refresh_token(user.id, "d", &["b".to_string()], 10).await?);
    let stored = store.find_by_id(user.id).await?.expect("row exists");
    assert_eq!(stored.refresh_tokens, vec!["a", "c", "d"]);

    assert!(store.remove_refresh_token(user.id, "a").await?);
    assert!(!store.remove_refresh_token(user.id, "a").await?);
    assert!(!store.push_refresh_token(UserId::new(), "x", &[], 10).await?);
    Ok(())
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn push_trims_to_cap_keeping_newest(pool: PgPool) -> Result<()> {
    let store = PostgresCredentialStore::new(pool);
    let user = store
        .create(identity("a@x.com", "alice", &["a", "b", "c", "d"]))
        .await?;

    assert!(store.push_refresh_token(user.id, "e", &["b".to_string()], 3).await?);
    let stored = store.find_by_id(user.id).await?.expect("row exists");
    assert_eq!(stored.refresh_tokens, vec!["c", "d", "e"]);

    assert!(store.push_refresh_token(user.id, "f", &[], 1).await?);
    let stored = store.find_by_id(user.id).await?.expect("row exists");
    assert_eq!(stored.refresh_tokens, vec!["f"]);
    Ok(())
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn record_login_leaves_enrollments_alone(pool: PgPool) -> Result<()> {
    let store = PostgresCredentialStore::new(pool);
    let mut user = store.create(identity("a@x.com", "alice", &["t1"])).await?;
    user.enrolled_courses.push(CourseId::from(Uuid::new_v4()));
    store.save(&user).await?;

    let at = Utc::now();
    assert!(store.record_login(user.id, at).await?);
    let stored = store.find_by_id(user.id).await?.expect("row exists");
    assert!(stored.last_login_at.is_some());
    assert_eq!(stored.enrolled_courses, user.enrolled_courses);
    assert_eq!(stored.refresh_tokens, vec!["t1"]);

    assert!(!store.record_login(UserId::new(), at).await?);
    Ok(())
}

#[sqlx::test(migrator = "coursemart_core::MIGRATOR")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_refresh_against_postgres_succeeds_once(pool: PgPool) -> Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(PostgresCredentialStore::new(pool));
    let tokens = TokenService::new(TokenSettings::new(
        "pg-access-secret-pg-access-secret",
        "pg-refresh-secret-pg-refresh-secret",
    ))?;
    let manager = Arc::new(SessionManager::new(
        store,
        Arc::new(tokens),
        Arc::new(AuthCrypto::for_tests("pepper", "token-hmac-key")?),
    ));

    manager
        .register(RegisterRequest {
            email: "a@x.com".into(),
            username: "alice".into(),
            password: "secret1".into(),
        })
        .await?;
    let session = manager
        .login(LoginRequest {
            email: "a@x.com".into(),
            password: "secret1".into(),
        })
        .await?;

    let (first, second) = tokio::join!(
        manager.refresh(Some(&session.refresh_token)),
        manager.refresh(Some(&session.refresh_token)),
    );
    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );
    Ok(())
}
