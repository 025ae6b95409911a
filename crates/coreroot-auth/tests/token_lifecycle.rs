//! End-to-end token lifecycle: login, expiry, rotation, replay, logout.

use std::sync::Arc;

use coreroot_auth::config::AuthConfig;
use coreroot_auth::types::{LoginRequest, RegisterRequest};
use coreroot_auth::{AuthError, AuthState};
use coreroot_core::{Clock, ManualClock};
use coreroot_storage::InMemoryStore;
use time::Duration;

fn config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.signing.secret = Some("integration-test-secret-0123456789abcdef".to_string());
    config
}

async fn setup() -> (Arc<ManualClock>, AuthState) {
    let clock = Arc::new(ManualClock::starting_now());
    let users = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let state = AuthState::from_config(&config(), users, clock.clone()).unwrap();

    state
        .accounts
        .register(RegisterRequest {
            username: "u1".to_string(),
            email: "u1@example.com".to_string(),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .unwrap();

    (clock, state)
}

fn credentials() -> LoginRequest {
    LoginRequest {
        email: "u1@example.com".to_string(),
        password: "password123".to_string(),
    }
}

#[tokio::test]
async fn test_login_expire_refresh_replay() {
    let (clock, state) = setup().await;
    let session = state.accounts.login(credentials()).await.unwrap();
    let (access, refresh) = (session.tokens.access, session.tokens.refresh);

    assert!(state.tokens.authenticate(&access).is_ok());

    clock.advance(Duration::minutes(5) + Duration::seconds(1));
    assert!(matches!(
        state.tokens.authenticate(&access),
        Err(AuthError::TokenExpired)
    ));

    let rotated = state.tokens.refresh(&refresh).await.unwrap();
    assert!(state.tokens.authenticate(&rotated.access).is_ok());
    assert_ne!(rotated.refresh, refresh);

    assert!(matches!(
        state.tokens.refresh(&refresh).await,
        Err(AuthError::TokenRevoked)
    ));
}

#[tokio::test]
async fn test_logout_is_idempotent_and_blocks_refresh() {
    let (_clock, state) = setup().await;
    let session = state.accounts.login(credentials()).await.unwrap();

    state.tokens.logout(&session.tokens.refresh).await.unwrap();
    state.tokens.logout(&session.tokens.refresh).await.unwrap();

    assert!(matches!(
        state.tokens.refresh(&session.tokens.refresh).await,
        Err(AuthError::TokenRevoked)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_one_winner() {
    let (_clock, state) = setup().await;
    let session = state.accounts.login(credentials()).await.unwrap();
    let refresh = session.tokens.refresh;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let tokens = state.tokens.clone();
        let refresh = refresh.clone();
        handles.push(tokio::spawn(async move { tokens.refresh(&refresh).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(err, AuthError::TokenRevoked)),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_refresh_token_expires_after_a_day() {
    let (clock, state) = setup().await;
    let session = state.accounts.login(credentials()).await.unwrap();

    clock.advance(Duration::days(1));
    assert!(matches!(
        state.tokens.refresh(&session.tokens.refresh).await,
        Err(AuthError::TokenExpired)
    ));
    // Logging out with it is a harmless no-op.
    assert!(state.tokens.logout(&session.tokens.refresh).await.is_ok());
    assert!(clock.now() >= session.tokens.refresh_expires_at);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let clock = Arc::new(ManualClock::starting_now());
    let users = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let mut bad = config();
    bad.signing.secret = Some("short".to_string());

    let result = AuthState::from_config(&bad, users, clock);
    assert!(matches!(result, Err(AuthError::Configuration { .. })));
}
