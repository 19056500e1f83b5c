use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

/// Participant identity shared by every RPC call of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    id: Uuid,
    username: String,
    encoded_username: String,
}

impl SessionIdentity {
    /// Fresh identity with a random id.
    pub fn generate(display_name: &str) -> Self {
        Self::with_id(Uuid::new_v4(), display_name)
    }

    pub fn with_id(id: Uuid, display_name: &str) -> Self {
        Self::with_username(id, raw_username(&id, display_name))
    }

    /// Identity around an already derived `id:base64(name)` username.
    pub fn with_username(id: Uuid, username: impl Into<String>) -> Self {
        let username = username.into();
        let encoded_username = urlencoding::encode(&username).into_owned();
        Self {
            id,
            username,
            encoded_username,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Username before percent-encoding.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Token sent on the wire.
    pub fn encoded_username(&self) -> &str {
        &self.encoded_username
    }
}

/// Percent-encoded `id:base64(display_name)`.
pub fn encode_username(id: &Uuid, display_name: &str) -> String {
    urlencoding::encode(&raw_username(id, display_name)).into_owned()
}

fn raw_username(id: &Uuid, display_name: &str) -> String {
    format!("{id}:{}", STANDARD.encode(display_name))
}
