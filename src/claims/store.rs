use super::model::{Claim, ClaimStatusView, ClaimUpdate, NewClaim, User, ValidationError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("username already registered")]
    DuplicateUsername,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Claim persistence. Every lookup is scoped to the owning user: a claim
/// that exists but belongs to someone else is reported as absent.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn create_claim(&self, user_id: Uuid, claim: NewClaim) -> Result<Claim, StoreError>;

    async fn get_claim(&self, claim_id: Uuid, user_id: Uuid) -> Result<Option<Claim>, StoreError>;

    async fn get_claim_status(
        &self,
        claim_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ClaimStatusView>, StoreError> {
        Ok(self
            .get_claim(claim_id, user_id)
            .await?
            .map(|claim| claim.status_view()))
    }

    async fn update_claim(
        &self,
        claim_id: Uuid,
        update: ClaimUpdate,
        user_id: Uuid,
    ) -> Result<Option<Claim>, StoreError>;

    /// Returns whether a claim was deleted.
    async fn delete_claim(&self, claim_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn list_claims(&self, user_id: Uuid) -> Result<Vec<Claim>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store a user whose password has already been hashed.
    async fn create_user(
        &self,
        username: &str,
        full_name: &str,
        password_hash: String,
    ) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
}

/// Process-local store backing both traits.
#[derive(Default)]
pub struct InMemoryStore {
    claims: RwLock<HashMap<Uuid, Claim>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for InMemoryStore {
    async fn create_claim(&self, user_id: Uuid, claim: NewClaim) -> Result<Claim, StoreError> {
        claim.validate()?;
        let claim = Claim::new(user_id, claim);
        self.claims.write().await.insert(claim.id, claim.clone());
        Ok(claim)
    }

    async fn get_claim(&self, claim_id: Uuid, user_id: Uuid) -> Result<Option<Claim>, StoreError> {
        Ok(self
            .claims
            .read()
            .await
            .get(&claim_id)
            .filter(|claim| claim.user_id == user_id)
            .cloned())
    }

    async fn update_claim(
        &self,
        claim_id: Uuid,
        update: ClaimUpdate,
        user_id: Uuid,
    ) -> Result<Option<Claim>, StoreError> {
        let mut claims = self.claims.write().await;
        match claims.get_mut(&claim_id) {
            Some(claim) if claim.user_id == user_id => {
                claim.apply(update);
                Ok(Some(claim.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_claim(&self, claim_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut claims = self.claims.write().await;
        let owned = claims
            .get(&claim_id)
            .is_some_and(|claim| claim.user_id == user_id);
        if owned {
            claims.remove(&claim_id);
        }
        Ok(owned)
    }

    async fn list_claims(&self, user_id: Uuid) -> Result<Vec<Claim>, StoreError> {
        let mut claims: Vec<Claim> = self
            .claims
            .read()
            .await
            .values()
            .filter(|claim| claim.user_id == user_id)
            .cloned()
            .collect();
        claims.sort_by_key(|claim| claim.created_at);
        Ok(claims)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(
        &self,
        username: &str,
        full_name: &str,
        password_hash: String,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|user| user.username == username) {
            return Err(StoreError::DuplicateUsername);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }
}
