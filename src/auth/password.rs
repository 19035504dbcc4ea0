use bcrypt::{hash, verify};

use super::AuthError;

/// bcrypt hashing. Work runs on the blocking pool so request threads are
/// not stalled by the key derivation.
pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
        Ok(hash(password, cost)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        Ok(verify(password, hash)?)
    }

    pub async fn hash_password_async(password: String, cost: u32) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || Self::hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Encoding(format!("password hashing task failed: {}", e)))?
    }

    pub async fn verify_password_async(password: String, hash: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || Self::verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Encoding(format!("password verification task failed: {}", e)))?
    }

    /// Minimum requirements for passwords set through the CLI.
    pub fn validate_password_strength(password: &str) -> Result<(), String> {
        if password.chars().count() < 8 {
            return Err("Password must be at least 8 characters long".to_string());
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            return Err("Password cannot be entirely numeric".to_string());
        }
        Ok(())
    }
}
