use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::Row as _;
use std::collections::{HashMap, HashSet};

use crate::config;
use crate::database::postgres::log_sql;
use crate::database::{PgStore, StoreError};
use crate::types::RecordKey;

/// Access level that bypasses every permission check
pub const ROOT_ACCESS: &str = "root";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User primary key, as text
    pub sub: String,
    pub user_name: String,
    pub access: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: &RecordKey, user_name: String, access: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id.to_string(),
            user_name,
            access,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, &claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: RecordKey,
    pub user_name: String,
    pub access: String,
}

impl Principal {
    pub fn new(user_id: impl Into<RecordKey>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            access: "user".to_string(),
        }
    }

    pub fn root(user_id: impl Into<RecordKey>, user_name: impl Into<String>) -> Self {
        Self {
            access: ROOT_ACCESS.to_string(),
            ..Self::new(user_id, user_name)
        }
    }

    pub fn is_root(&self) -> bool {
        self.access == ROOT_ACCESS
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: RecordKey::parse(&claims.sub),
            user_name: claims.user_name,
            access: claims.access,
        }
    }
}

/// Answers "may this principal use this permission slug"
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn check_access(&self, principal: &Principal, permission: &str) -> Result<bool, StoreError>;
}

/// Root principals pass without consulting the authorizer
pub async fn authorize(
    authorizer: &dyn Authorizer,
    principal: &Principal,
    permission: &str,
) -> Result<bool, StoreError> {
    if principal.is_root() {
        return Ok(true);
    }
    authorizer.check_access(principal, permission).await
}

/// Fixed grants keyed by user id
#[derive(Debug, Default, Clone)]
pub struct StaticAuthorizer {
    grants: HashMap<RecordKey, HashSet<String>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: impl Into<RecordKey>, permission: impl Into<String>) -> Self {
        self.grants.entry(user_id.into()).or_default().insert(permission.into());
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn check_access(&self, principal: &Principal, permission: &str) -> Result<bool, StoreError> {
        Ok(self
            .grants
            .get(&principal.user_id)
            .map(|slugs| slugs.contains(permission))
            .unwrap_or(false))
    }
}

/// Users hold permissions through their roles
#[async_trait]
impl Authorizer for PgStore {
    async fn check_access(&self, principal: &Principal, permission: &str) -> Result<bool, StoreError> {
        let sql = "SELECT EXISTS (\
                SELECT 1 FROM role_users ru \
                JOIN permission_roles pr ON pr.role_id = ru.role_id \
                JOIN permissions p ON p.id = pr.permission_id \
                WHERE ru.user_id::text = $1 AND p.slug = $2\
            ) AS granted";
        log_sql(sql);
        let row = sqlx::query(sql)
            .bind(principal.user_id.to_string())
            .bind(permission)
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("granted")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_bypasses_grants() {
        let authz = StaticAuthorizer::new();
        let root = Principal::root(1, "admin");
        assert!(authorize(&authz, &root, "update_user_field").await.unwrap());
        let user = Principal::new(2, "alex");
        assert!(!authorize(&authz, &user, "update_user_field").await.unwrap());
    }

    #[tokio::test]
    async fn static_grants_are_per_user() {
        let authz = StaticAuthorizer::new().grant(2, "update_user_field");
        assert!(authz.check_access(&Principal::new(2, "alex"), "update_user_field").await.unwrap());
        assert!(!authz.check_access(&Principal::new(3, "sam"), "update_user_field").await.unwrap());
        assert!(!authz.check_access(&Principal::new(2, "alex"), "delete_user").await.unwrap());
    }

    #[test]
    fn principal_from_claims_parses_numeric_subject() {
        let claims = Claims {
            sub: "42".into(),
            user_name: "alex".into(),
            access: "user".into(),
            exp: 0,
            iat: 0,
        };
        let principal = Principal::from(claims);
        assert_eq!(principal.user_id, RecordKey::Int(42));
        assert!(!principal.is_root());
    }
}
