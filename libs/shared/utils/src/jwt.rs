use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, Role, User};

/// Validate an HS256 token issued by the identity layer and turn it into an actor.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => "Token expired".to_string(),
            ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
            _ => "Invalid token".to_string(),
        }
    })?;

    let claims = data.claims;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| "Invalid subject claim".to_string())?;
    let role: Role = claims.role.parse()?;

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id,
        email: claims.email,
        role,
        created_at,
    };

    debug!("Token validated successfully for user: {} ({})", user.id, user.role);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn accepts_valid_token() {
        let user = TestUser::provider("doc@example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let actor = validate_token(&token, SECRET).unwrap();
        assert_eq!(actor.id, user.id);
        assert_eq!(actor.role, Role::Provider);
        assert_eq!(actor.email.as_deref(), Some("doc@example.com"));
    }

    #[test]
    fn rejects_expired_token() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn rejects_wrong_secret() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_invalid_signature_token(&user);
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn rejects_unknown_role() {
        let token = JwtTestUtils::create_token_with_role(Uuid::new_v4(), "medico", SECRET);
        assert!(validate_token(&token, SECRET).unwrap_err().contains("Unknown role"));
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(validate_token("a.b.c", "").is_err());
    }
}
