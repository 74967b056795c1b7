//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest user id the gateway accepts.
const MAX_USER_ID_LENGTH: usize = 64;
/// Longest display name the gateway accepts.
const MAX_USERNAME_LENGTH: usize = 32;

/// Validates that a user id is non-empty, bounded, and free of whitespace.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_USER_ID_LENGTH {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some(
            format!("User id must be between 1 and {MAX_USER_ID_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some("User id must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a display name is non-blank and bounded.
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || name.len() > MAX_USERNAME_LENGTH {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be between 1 and {MAX_USERNAME_LENGTH} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("u-123").is_ok());
        assert!(validate_user_id("5f3a9c").is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("a b").is_err()); // whitespace
        assert!(validate_user_id(&"x".repeat(65)).is_err()); // too long
    }

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("Ada").is_ok());
        assert!(validate_username("tap master 3000").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err()); // blank
        assert!(validate_username(&"x".repeat(33)).is_err()); // too long
    }
}
