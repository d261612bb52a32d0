//! Per-user password hashing: PBKDF2-HMAC-SHA256 with a random salt.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use uuid::Uuid;

use crate::models::user::Account;

pub const MIN_PASSWORD_LEN: usize = 8;

#[cfg(not(test))]
const ROUNDS: u32 = 210_000;
#[cfg(test)]
const ROUNDS: u32 = 1_000;

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn new_account(username: &str, password: &str) -> Account {
    let salt = *Uuid::new_v4().as_bytes();
    let key = derive_key(password, &salt, ROUNDS);
    Account {
        username: username.to_string(),
        salt: BASE64.encode(salt),
        password_hash: BASE64.encode(key),
        rounds: ROUNDS,
        created_at: Utc::now(),
    }
}

/// False for a wrong password or an account record that cannot be decoded.
pub fn verify(account: &Account, password: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (
        BASE64.decode(&account.salt),
        BASE64.decode(&account.password_hash),
    ) else {
        return false;
    };
    constant_time_eq(&derive_key(password, &salt, account.rounds), &expected)
}
