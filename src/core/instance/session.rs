use std::collections::BTreeMap;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PlayableOnline,
    PlayableOffline,
}

/// Credentials handed to the game. Produced by an account provider outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub player_name: String,
    /// Profile id without dashes.
    pub uuid: String,
    pub access_token: String,
    pub client_token: String,
    /// `token:<access token>:<uuid>` for online sessions, `-` otherwise.
    pub session: String,
    /// `msa`, `mojang` or `legacy`.
    pub user_type: String,
    pub user_properties: String,
    pub demo: bool,
    pub status: SessionStatus,
}

impl AuthSession {
    pub fn online(player_name: &str, uuid: &str, access_token: &str, user_type: &str) -> Self {
        Self {
            player_name: player_name.to_string(),
            uuid: uuid.to_string(),
            access_token: access_token.to_string(),
            client_token: String::new(),
            session: format!("token:{}:{}", access_token, uuid),
            user_type: user_type.to_string(),
            user_properties: "{}".to_string(),
            demo: false,
            status: SessionStatus::PlayableOnline,
        }
    }

    /// Offline play with the name-derived profile id the vanilla server expects.
    pub fn offline(player_name: &str) -> Self {
        let name = match player_name.trim() {
            "" => "Player",
            trimmed => trimmed,
        };
        Self {
            player_name: name.to_string(),
            uuid: offline_uuid(name),
            access_token: "0".to_string(),
            client_token: String::new(),
            session: "-".to_string(),
            user_type: "legacy".to_string(),
            user_properties: "{}".to_string(),
            demo: false,
            status: SessionStatus::PlayableOffline,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.status == SessionStatus::PlayableOffline
    }

    /// Secret -> placeholder pairs for the log censor.
    pub fn censor_filter(&self) -> BTreeMap<String, String> {
        let mut filter = BTreeMap::new();
        let mut add = |secret: &str, placeholder: &str| {
            if !secret.trim().is_empty() {
                filter.insert(secret.to_string(), placeholder.to_string());
            }
        };
        if self.session != "-" {
            add(&self.session, "<SESSION ID>");
        }
        add(&self.access_token, "<ACCESS TOKEN>");
        add(&self.client_token, "<CLIENT TOKEN>");
        add(&self.uuid, "<PROFILE ID>");
        filter
    }
}

/// Name-based (v3) UUID of `OfflinePlayer:<name>`, without dashes.
fn offline_uuid(name: &str) -> String {
    let digest = Md5::digest(format!("OfflinePlayer:{}", name).as_bytes());
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes)
        .into_uuid()
        .simple()
        .to_string()
}
