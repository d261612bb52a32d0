use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// Stored under the bearer token in the sessions namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Stored under the username in the accounts namespace. The first successful
/// sign-in for a username creates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Base64 salt and PBKDF2-SHA256 digest of the password.
    pub salt: String,
    pub password_hash: String,
    pub rounds: u32,
    pub created_at: DateTime<Utc>,
}
