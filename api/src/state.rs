use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenService;
use crate::mailer::Mailer;
use crate::storage::ObjectStorage;
use crate::store::UserStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<TokenService>,
    pub bcrypt_cost: u32,
    pub email_from: String,
    pub started_at: Instant,
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        registry: Registry,
    ) -> Self {
        Self {
            users,
            storage,
            mailer,
            tokens: Arc::new(tokens),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            email_from: "no-reply@example.com".to_string(),
            started_at: Instant::now(),
            registry,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_email_from(mut self, from: impl Into<String>) -> Self {
        self.email_from = from.into();
        self
    }
}
