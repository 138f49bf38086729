use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tokens are issued by the campus SSO; this service only verifies them.
/// `group` is the department/group code notification audiences are matched
/// against, `role` distinguishes admins from everyone else.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub group: String,
    pub role: String,
    pub exp: i64,
}

/// Create a signed token. Used by tests and local tooling; production tokens
/// come from the SSO with the same claim shape.
pub fn create_access_token(
    user_id: Uuid,
    group: &str,
    role: &str,
    secret: &str,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(8))
        .ok_or(AppError::InternalError)?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        group: group.to_string(),
        role: role.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Unauthorized("Failed to create access token".to_string()))
}

/// Verify a JWT and extract its claims.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "CS", "student", "testsecret").unwrap();
        let claims = verify_jwt(&token, "testsecret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.group, "CS");
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_access_token(Uuid::new_v4(), "CS", "student", "secret-a").unwrap();
        assert!(verify_jwt(&token, "secret-b").is_err());
    }
}
