// src/services/auth.rs

use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, User},
};

/// Verifies bearer tokens issued by the Account Zero identity service.
/// Identity and role come from the claims; there is no user table here.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::InvalidToken
        })?;

        Ok(User {
            id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }

    #[cfg(test)]
    pub(crate) fn issue_token(&self, user_id: uuid::Uuid, role: crate::models::rbac::Role) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            exp: (now + chrono::Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rbac::Role;
    use uuid::Uuid;

    #[test]
    fn accepts_its_own_tokens() {
        let auth = AuthService::new("test-secret".into());
        let id = Uuid::new_v4();
        let token = auth.issue_token(id, Role::StockController);

        let user = auth.validate_token(&token).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::StockController);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let issuer = AuthService::new("someone-else".into());
        let token = issuer.issue_token(Uuid::new_v4(), Role::Admin);

        let auth = AuthService::new("test-secret".into());
        assert!(matches!(auth.validate_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(auth.validate_token("not-a-jwt"), Err(AppError::InvalidToken)));
    }
}
