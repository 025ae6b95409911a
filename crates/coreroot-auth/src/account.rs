//! Account registration and email/password login.

use std::sync::Arc;

use coreroot_storage::{DynUserStore, NewUser, UserRecord};
use tokio::sync::OnceCell;

use crate::AuthResult;
use crate::config::PasswordConfig;
use crate::error::AuthError;
use crate::password::{hash_password_async, verify_password_async};
use crate::token::TokenService;
use crate::types::{LoginRequest, Principal, RegisterRequest, Session};

/// Password verified against the placeholder hash for unknown emails.
const PLACEHOLDER_PASSWORD: &str = "coreroot-placeholder-password";

/// Creates accounts and exchanges credentials for token pairs.
pub struct AccountService {
    users: DynUserStore,
    tokens: Arc<TokenService>,
    min_password_length: usize,
    /// Hash checked on the unknown-email path, so that path costs one
    /// argon2 verification like a wrong password does.
    placeholder_hash: OnceCell<String>,
}

impl AccountService {
    #[must_use]
    pub fn new(users: DynUserStore, tokens: Arc<TokenService>, passwords: &PasswordConfig) -> Self {
        Self {
            users,
            tokens,
            min_password_length: passwords.min_length,
            placeholder_hash: OnceCell::new(),
        }
    }

    /// Registers a new account and logs it in.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if a field fails validation
    /// - `AuthError::Conflict` if the email or username is taken
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<Session> {
        self.validate_registration(&request)?;

        let password_hash = hash_password_async(request.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                username: request.username.trim().to_string(),
                email: request.email.trim().to_string(),
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
            })
            .await?;

        let tokens = self.tokens.issue_token_pair(&principal_of(&user))?;
        tracing::info!(user = %user.key, "Account registered");
        Ok(Session { user, tokens })
    }

    /// Verifies email and password and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email, a wrong
    /// password and an inactive account alike.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<Session> {
        let Some(user) = self.users.find_user_by_email(&request.email).await? else {
            let hash = self
                .placeholder_hash
                .get_or_try_init(|| hash_password_async(PLACEHOLDER_PASSWORD.to_string()))
                .await?
                .clone();
            verify_password_async(request.password, hash).await?;
            tracing::debug!("Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let verified = verify_password_async(request.password, user.password_hash.clone()).await?;
        if !verified || !user.is_active {
            tracing::debug!(user = %user.key, active = user.is_active, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_token_pair(&principal_of(&user))?;
        tracing::info!(user = %user.key, "User logged in");
        Ok(Session { user, tokens })
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn users(&self) -> &DynUserStore {
        &self.users
    }

    fn validate_registration(&self, request: &RegisterRequest) -> AuthResult<()> {
        if request.username.trim().is_empty() {
            return Err(AuthError::invalid_request("username: This field may not be blank."));
        }
        if !is_plausible_email(request.email.trim()) {
            return Err(AuthError::invalid_request("email: Enter a valid email address."));
        }
        if request.password.chars().count() < self.min_password_length {
            return Err(AuthError::invalid_request(format!(
                "password: Ensure this field has at least {} characters.",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

fn principal_of(user: &UserRecord) -> Principal {
    Principal::new(user.key, user.id)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRevokedTokenStorage;
    use crate::token::{JwtCodec, KeyRing, SigningAlgorithm, SigningKey, TokenConfig};
    use coreroot_core::ManualClock;
    use coreroot_storage::InMemoryStore;

    fn service() -> AccountService {
        let clock = Arc::new(ManualClock::starting_now());
        let key =
            SigningKey::from_secret("k1", SigningAlgorithm::HS256, b"account-service-secret-32-bytes!")
                .unwrap();
        let codec = Arc::new(JwtCodec::new(KeyRing::new(key), "coreroot", clock.clone()));
        let revoked = Arc::new(InMemoryRevokedTokenStorage::new(clock.clone()));
        let tokens = Arc::new(TokenService::new(codec, revoked, TokenConfig::default()));
        let users = Arc::new(InMemoryStore::with_clock(clock));
        AccountService::new(users, tokens, &PasswordConfig::default())
    }

    fn registration(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let accounts = service();
        let session = accounts
            .register(registration("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        assert_ne!(session.user.password_hash, "password123");

        let identity = accounts.tokens().authenticate(&session.tokens.access).unwrap();
        assert_eq!(identity.key, session.user.key);

        let again = accounts.login(login("alice@example.com", "password123")).await.unwrap();
        assert_eq!(again.user.key, session.user.key);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let accounts = service();
        for request in [
            registration("  ", "a@example.com", "password123"),
            registration("bob", "not-an-email", "password123"),
            registration("bob", "@example.com", "password123"),
            registration("bob", "bob@example.com", "short"),
        ] {
            assert!(matches!(
                accounts.register(request).await,
                Err(AuthError::InvalidRequest { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let accounts = service();
        accounts
            .register(registration("carol", "carol@example.com", "password123"))
            .await
            .unwrap();
        let err = accounts
            .register(registration("carol2", "CAROL@example.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let accounts = service();
        accounts
            .register(registration("dave", "dave@example.com", "password123"))
            .await
            .unwrap();

        let unknown = accounts.login(login("nobody@example.com", "password123")).await.unwrap_err();
        let wrong = accounts.login(login("dave@example.com", "password124")).await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_hash() {
        let accounts = service();
        assert!(!accounts.placeholder_hash.initialized());

        let err = accounts
            .login(login("nobody@example.com", PLACEHOLDER_PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let hash = accounts.placeholder_hash.get().unwrap();
        assert!(hash.starts_with("$argon2id$"));

        // The hash is built once and reused.
        accounts.login(login("other@example.com", "password123")).await.unwrap_err();
        assert_eq!(accounts.placeholder_hash.get(), Some(hash));
    }
}
