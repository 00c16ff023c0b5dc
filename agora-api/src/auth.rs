pub const STUB_UID: &str = "stub-uid";

/// Opaque identity key the backend attaches to everything a user owns.
/// Delete permissions are decided by comparing against it.
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserUid(pub String);

impl UserUid {
    pub fn stub() -> UserUid {
        UserUid(STUB_UID.to_string())
    }
}

/// Bearer token injected into every request when a session exists.
/// Issuance and refresh are owned by the session manager, not by this crate.
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken("stub-token".to_string())
    }
}
