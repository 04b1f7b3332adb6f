use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::CacheBackend,
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};

const REVOKED_KEY_PREFIX: &str = "auth:revoked:";

/// JWT claims carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Token id, used by the revocation list.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("admin access required".into()))
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<user::Model> for PublicUser {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            role: model.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Registers and authenticates users, issues and validates session tokens,
/// and keeps a cache-backed revocation list.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    cache: Arc<dyn CacheBackend>,
    event_sender: Arc<EventSender>,
    secret: String,
    token_lifetime: Duration,
}

impl AuthService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<dyn CacheBackend>,
        event_sender: Arc<EventSender>,
        secret: String,
        token_lifetime: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            event_sender,
            secret,
            token_lifetime,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthResponse, ServiceError> {
        input.validate()?;

        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(input.email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict("Email already registered".into()));
        }

        let password_hash = hash_password(&input.password)?;
        let user_id = Uuid::new_v4();

        let model = user::ActiveModel {
            id: Set(user_id),
            email: Set(input.email),
            password_hash: Set(password_hash),
            full_name: Set(input.full_name),
            phone: Set(input.phone),
            role: Set(input.role.unwrap_or(UserRole::Customer)),
            is_active: Set(true),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user_id))
            .await;
        info!(user_id = %user_id, "user registered");

        let token = self.issue_token(&created)?;
        Ok(AuthResponse {
            token,
            user: created.into(),
        })
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse, ServiceError> {
        input.validate()?;

        let found = UserEntity::find()
            .filter(user::Column::Email.eq(input.email.clone()))
            .filter(user::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?;

        // Same error for unknown email and bad password.
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());
        let found = found.ok_or_else(invalid)?;
        verify_password(&input.password, &found.password_hash).map_err(|_| invalid())?;

        let token = self.issue_token(&found)?;
        Ok(AuthResponse {
            token,
            user: found.into(),
        })
    }

    /// Validates signature and expiry, then checks the revocation list.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let claims = self.decode_token(token)?;
        let revoked = self
            .cache
            .exists(&format!("{REVOKED_KEY_PREFIX}{}", claims.jti))
            .await?;
        if revoked {
            warn!(jti = %claims.jti, "rejected revoked token");
            return Err(ServiceError::Unauthorized("Token revoked".into()));
        }
        Ok(claims)
    }

    /// Blacklists the token's id for its remaining lifetime.
    pub async fn revoke_token(&self, token: &str) -> Result<(), ServiceError> {
        let claims = self.decode_token(token)?;
        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        self.cache
            .set_nx(
                &format!("{REVOKED_KEY_PREFIX}{}", claims.jti),
                "1",
                Duration::from_secs(remaining),
            )
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<PublicUser, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    fn issue_token(&self, user: &user::Model) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: match user.role {
                UserRole::Admin => "ADMIN".to_string(),
                UserRole::Customer => "CUSTOMER".to_string(),
            },
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(self.token_lifetime.as_secs() as i64))
                .timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {e}")))
    }

    fn decode_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token expired".into())
            }
            _ => ServiceError::Unauthorized("Invalid token".into()),
        })
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<(), ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("stored hash invalid: {e}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ServiceError::Unauthorized("Invalid credentials".into()))
}

#[async_trait]
impl FromRequestParts<crate::AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".into()))?;

        let claims = state.services.auth.validate_token(token).await?;
        let role = match claims.role.as_str() {
            "ADMIN" => UserRole::Admin,
            _ => UserRole::Customer,
        };
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(verify_password("wrong", &hash).is_err());
    }

    #[test]
    fn hash_is_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn require_admin_gates_customers() {
        let customer = AuthUser {
            id: Uuid::new_v4(),
            email: "c@example.com".into(),
            role: UserRole::Customer,
        };
        assert!(matches!(
            customer.require_admin(),
            Err(ServiceError::Forbidden(_))
        ));

        let admin = AuthUser {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            role: UserRole::Admin,
        };
        assert!(admin.require_admin().is_ok());
    }
}
