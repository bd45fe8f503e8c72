//! Shared test helpers for `medool-core` integration tests.
//!
//! Provides a scripted `AuthApi` and builders for a controller wired to
//! in-memory credentials, so lifecycle tests can focus on behaviour instead of
//! boilerplate.

pub mod auth_api;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use medool_common::auth::{
    CredentialStore, Fingerprint, MemoryStore, Obfuscator, RefreshCoordinator,
};
use medool_common::testing::MockTokenExchange;
use medool_core::SessionController;
use medool_domain::{Profile, Relation, UserType};

pub use auth_api::MockAuthApi;

/// Controller plus handles to everything behind it.
pub struct Harness {
    pub controller: Arc<SessionController>,
    pub api: Arc<MockAuthApi>,
    pub exchange: Arc<MockTokenExchange>,
    pub store: Arc<CredentialStore>,
    pub durable: Arc<MemoryStore>,
}

pub fn harness(api: MockAuthApi, exchange: MockTokenExchange) -> Harness {
    let durable = Arc::new(MemoryStore::new());
    let store = Arc::new(CredentialStore::new(
        durable.clone(),
        Obfuscator::new(&Fingerprint {
            user_agent: "core-tests".to_string(),
            language: "en-IN".to_string(),
            color_depth: 24,
            timezone_offset_minutes: -330,
        }),
    ));
    let api = Arc::new(api);
    let exchange = Arc::new(exchange);
    let refresher = RefreshCoordinator::new(Arc::clone(&store), exchange.clone());
    let controller = Arc::new(SessionController::new(api.clone(), refresher));

    Harness { controller, api, exchange, store, durable }
}

pub fn profile(id: &str, is_default: bool) -> Profile {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().unwrap_or_default();
    Profile {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        full_name: format!("Profile {id}"),
        gender: None,
        date_of_birth: None,
        relation: if is_default { Relation::Myself } else { Relation::Child },
        user_type: UserType::Regular,
        user_type_locked: false,
        is_default,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}
