use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

#[cfg(test)]
pub(crate) use sqlite::tests;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// An unknown or internal error happened with the storage backend
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the storage backend doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoStorageError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StorageError;
    fn any(self) -> StorageError;
}

/// Represents a type that can persist users, questions, and statistics
#[async_trait]
pub trait Storage: Send + Sync {
    async fn user_exists(&self, username: &str) -> Result<bool>;
    async fn password_matches(&self, username: &str, password: &str) -> Result<bool>;
    async fn create_user(&self, new_user: NewUser) -> Result<()>;
    async fn email_exists(&self, email: &str) -> Result<bool>;
    async fn delete_user(&self, username: &str) -> Result<()>;

    /// Returns exactly `amount` questions, topping the bank up from the
    /// external fetcher when it runs low, or errors out.
    async fn questions(&self, amount: u32) -> Result<Vec<QuestionRow>>;

    async fn user_statistics(&self, username: &str) -> Result<UserStatistics>;
    async fn top_players(&self, limit: u32) -> Result<Vec<PlayerSummary>>;
    async fn player_by_username(&self, username: &str) -> Result<PlayerSummary>;
    async fn submit_game_result(&self, outcome: GameOutcome, username: &str) -> Result<()>;

    async fn user_profile(&self, username: &str) -> Result<UserProfile>;
    async fn update_user_profile(&self, username: &str, update: ProfileUpdate) -> Result<()>;

    /// Returns the secret to include in a password recovery email for the
    /// account behind this email address.
    async fn password_for_recovery_email(&self, email: &str) -> Result<String>;
}
