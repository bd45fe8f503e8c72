use std::sync::Arc;

use medool_common::auth::{Fingerprint, MemoryStore};
use medool_common::testing::test_user;
use medool_domain::{ClientConfig, StorageBackend};
use medool_infra::MedoolClient;
use serde_json::{json, Value};
use wiremock::MockServer;

pub fn fingerprint() -> Fingerprint {
    Fingerprint {
        user_agent: "infra-tests".to_string(),
        language: "en-IN".to_string(),
        color_depth: 24,
        timezone_offset_minutes: -330,
    }
}

/// Config pointed at `server` with fast upload backoff.
pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(server.uri());
    config.api.timeout_secs = 5;
    config.session.storage = StorageBackend::Memory;
    config.upload.base_delay_ms = 10;
    config
}

/// Client wired to `server` on an in-memory durable store.
pub fn client_for(server: &MockServer) -> (MedoolClient, Arc<MemoryStore>) {
    let durable = Arc::new(MemoryStore::new());
    let client = MedoolClient::with_store(config_for(server), fingerprint(), durable.clone())
        .expect("client should build");
    (client, durable)
}

/// Client that already holds a refresh token (and optionally an access
/// token valid for 15 minutes).
pub async fn signed_in_client(
    server: &MockServer,
    refresh: &str,
    access: Option<&str>,
) -> MedoolClient {
    let (client, _) = client_for(server);
    client.credentials().store_refresh(refresh).await.expect("refresh token should persist");
    if let Some(access) = access {
        client.credentials().set_access(access, 900);
    }
    client
}

pub fn grant_json(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 900,
        "user": test_user(),
    })
}

pub fn profile_json(id: &str, is_default: bool) -> Value {
    json!({
        "id": id,
        "user_id": "user-1",
        "full_name": format!("Profile {id}"),
        "gender": null,
        "date_of_birth": null,
        "relation": if is_default { "SELF" } else { "CHILD" },
        "user_type": "REGULAR",
        "user_type_locked": false,
        "is_default": is_default,
        "is_active": true,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
    })
}

pub fn prescription_json(profile_id: &str) -> Value {
    json!({
        "id": "rx-1",
        "user_id": "user-1",
        "profile_id": profile_id,
        "source": "UPLOAD",
        "status": "UPLOADED",
        "title": "Blood work",
        "note": null,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
        "files": [],
    })
}
