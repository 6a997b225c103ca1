use crate::domain::money::Balance;
use crate::domain::ports::{BalanceSource, IdentityStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory session holding the signed-in user id.
///
/// Clones share the same session, so a sign-out is seen by every flow.
#[derive(Default, Clone)]
pub struct InMemorySession {
    user_id: Arc<RwLock<Option<String>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Arc::new(RwLock::new(Some(user_id.into()))),
        }
    }

    pub async fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write().await = Some(user_id.into());
    }

    pub async fn sign_out(&self) {
        *self.user_id.write().await = None;
    }
}

#[async_trait]
impl IdentityStore for InMemorySession {
    async fn current_user_id(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }
}

/// A thread-safe in-memory wallet balance.
#[derive(Default, Clone)]
pub struct InMemoryWallet {
    balance: Arc<RwLock<Balance>>,
}

impl InMemoryWallet {
    pub fn new(balance: Balance) -> Self {
        Self {
            balance: Arc::new(RwLock::new(balance)),
        }
    }

    pub async fn set_balance(&self, balance: Balance) {
        *self.balance.write().await = balance;
    }
}

#[async_trait]
impl BalanceSource for InMemoryWallet {
    async fn available_balance(&self) -> Balance {
        *self.balance.read().await
    }
}
