use crate::api::{AuthToken, UserUid};

/// The only two things the core ever asks the authentication subsystem:
/// who am I (for ownership-gated actions) and what token do requests
/// carry. Storage, refresh scheduling and login flows live outside.
pub trait Session {
    fn current_uid(&self) -> Option<UserUid>;
    fn access_token(&self) -> Option<AuthToken>;
}

/// A session frozen at construction time. Enough for tests and for
/// embedders that re-create their state objects on auth changes.
#[derive(Clone, Debug, Default)]
pub struct FixedSession {
    pub uid: Option<UserUid>,
    pub token: Option<AuthToken>,
}

impl FixedSession {
    pub fn anonymous() -> FixedSession {
        FixedSession::default()
    }

    pub fn logged_in(uid: UserUid, token: AuthToken) -> FixedSession {
        FixedSession {
            uid: Some(uid),
            token: Some(token),
        }
    }
}

impl Session for FixedSession {
    fn current_uid(&self) -> Option<UserUid> {
        self.uid.clone()
    }

    fn access_token(&self) -> Option<AuthToken> {
        self.token.clone()
    }
}
