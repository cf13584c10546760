use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::errors::{ServerError, ServerResult};
use crate::protocol::SignupRequest;
use crate::store::{NewUser, Storage, StorageError, AVATAR_COLORS};
use crate::validate;

/// An authenticated user, keyed by username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Tracks which users are logged in right now, and performs the checks that
/// guard the door.
pub struct Auth {
    storage: Arc<dyn Storage>,
    logged_in: Mutex<HashSet<String>>,
}

impl Auth {
    pub fn new(storage: &Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            storage: storage.clone(),
            logged_in: Default::default(),
        })
    }

    /// Logs a user in. Credential problems surface as
    /// [ServerError::InvalidCredentials] with a client-visible message.
    pub async fn login(&self, username: &str, password: &str) -> ServerResult<Identity> {
        if !self.storage.user_exists(username).await? {
            return Err(ServerError::InvalidCredentials(
                "User does not exist".to_string(),
            ));
        }

        if !self.storage.password_matches(username, password).await? {
            return Err(ServerError::InvalidCredentials(
                "Password does not match".to_string(),
            ));
        }

        let mut logged_in = self.logged_in.lock();

        if logged_in.contains(username) {
            return Err(ServerError::InvalidCredentials(
                "User already logged in".to_string(),
            ));
        }

        logged_in.insert(username.to_string());

        Ok(Identity::new(username))
    }

    /// Logs a user out. Safe to call twice.
    pub fn logout(&self, username: &str) {
        self.logged_in.lock().remove(username);
    }

    /// Validates and creates a new account, then logs it in. The account is
    /// not verified yet at this point.
    pub async fn signup(&self, request: SignupRequest) -> ServerResult<Identity> {
        validate_signup(&request).map_err(ServerError::InvalidCredentials)?;

        let avatar_color = AVATAR_COLORS
            .choose(&mut thread_rng())
            .expect("color list is not empty")
            .to_string();

        self.storage
            .create_user(NewUser {
                username: request.username.clone(),
                password: request.password.clone(),
                email: request.email,
                address: request.address,
                phone_number: request.phone_number,
                birthday: request.birthday,
                avatar_color,
            })
            .await
            .map_err(|e| match e {
                StorageError::Conflict {
                    resource,
                    field,
                    value,
                } => ServerError::AlreadyExists(format!("{} {} '{}'", resource, field, value)),
                e => ServerError::Storage(e),
            })?;

        self.login(&request.username, &request.password).await
    }

    /// Removes an account that never finished verification, and logs it out.
    /// Failures are logged and swallowed, since there is nothing else to do.
    pub async fn scrub_unverified(&self, username: &str) {
        self.logout(username);

        if let Err(e) = self.storage.delete_user(username).await {
            warn!("Failed to scrub unverified user '{}': {}", username, e);
        }
    }
}

fn validate_signup(request: &SignupRequest) -> Result<(), String> {
    validate::username(&request.username)?;
    validate::email(&request.email)?;
    validate::address(&request.address)?;
    validate::phone_number(&request.phone_number)?;
    validate::birthday(&request.birthday)?;
    // Password last, mirroring the client-side order of the checks
    validate::password(&request.password)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{test_storage, test_user};

    async fn test_auth() -> Arc<Auth> {
        let storage: Arc<dyn Storage> = Arc::new(test_storage().await);
        Auth::new(&storage)
    }

    fn signup_request(username: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            password: "Sup3r$ecret".to_string(),
            email: format!("{}@example.com", username),
            address: "Main Street, 4, Springfield".to_string(),
            phone_number: "052-1234567".to_string(),
            birthday: "01.02.1990".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_logins_are_rejected() {
        let storage: Arc<dyn Storage> = Arc::new(test_storage().await);
        storage
            .create_user(test_user("olive"))
            .await
            .expect("user is created");

        let auth = Auth::new(&storage);

        auth.login("olive", "Sup3r$ecret")
            .await
            .expect("first login succeeds");

        let second = auth.login("olive", "Sup3r$ecret").await;
        assert!(matches!(second, Err(ServerError::InvalidCredentials(_))));

        // Logging out twice must not panic, and frees the slot
        auth.logout("olive");
        auth.logout("olive");

        auth.login("olive", "Sup3r$ecret")
            .await
            .expect("login works again after logout");
    }

    #[tokio::test]
    async fn signup_validates_before_touching_storage() {
        let auth = test_auth().await;

        let mut invalid = signup_request("olive");
        invalid.email = "not-an-email".to_string();

        let result = auth.signup(invalid).await;
        assert!(matches!(result, Err(ServerError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn signup_logs_the_new_user_in() {
        let auth = test_auth().await;

        let identity = auth
            .signup(signup_request("olive"))
            .await
            .expect("signup succeeds");

        assert_eq!(identity.username, "olive");

        // Already logged in from the signup
        let again = auth.login("olive", "Sup3r$ecret").await;
        assert!(matches!(again, Err(ServerError::InvalidCredentials(_))));
    }
}
