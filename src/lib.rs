use std::sync::Arc;

use auth::{CredentialManager, ResetTokenStore, TokenService};
use config::Config;
use error::AppError;
use services::{AccountService, MembershipLifecycle, OrderLedger};
use store::Store;

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub memberships: MembershipLifecycle,
    pub ledger: OrderLedger,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        reset_tokens: Arc<dyn ResetTokenStore>,
    ) -> Result<Self, AppError> {
        let credentials = CredentialManager::new(config.bcrypt_cost)?;
        let tokens = TokenService::new(&config.jwt_secret);

        Ok(Self {
            accounts: AccountService::new(
                store.clone(),
                credentials,
                tokens.clone(),
                reset_tokens,
                config.reset_token_expiration(),
            ),
            memberships: MembershipLifecycle::new(store.clone()),
            ledger: OrderLedger::new(store.clone()),
            tokens,
            store,
            config,
        })
    }
}
