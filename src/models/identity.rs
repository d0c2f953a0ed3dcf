//! Requester identity used for eligibility lookups. Never stored on its own.
use types::{SessionMarker, UserId};

/// Raw request facts the identity is derived from
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestMeta {
    pub address: Option<String>,
    pub session_marker: Option<String>,
    pub user_id: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub address: String,
    pub session_marker: SessionMarker,
    pub user_id: Option<UserId>,
}

impl Identity {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Identity plus the marker the caller must hand back to the client, if one was minted
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIdentity {
    pub identity: Identity,
    pub minted: Option<SessionMarker>,
}
