use crate::db::store::DocumentStore;

/// The caller identity attached to a request.
///
/// # Trust boundary
///
/// The user token is caller-asserted and carried in the request body with no
/// session, signature, or existence validation of any kind. Anyone can claim
/// any identity, including an administrator's. Every call site must treat it
/// as untrusted input: it gates ownership and moderation *visibility*, not
/// confidentiality or integrity of anything security-critical. Deployments
/// that need real authentication must put it in front of this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(String),
}

impl Identity {
    /// Resolve a raw `user` field into an identity. Absent and empty tokens
    /// both resolve to anonymous.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            Some(token) if !token.is_empty() => Identity::User(token.to_string()),
            _ => Identity::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Anonymous => None,
        }
    }
}

/// Admin check against the user store.
///
/// Fails closed: anonymous callers and any storage error resolve to "not
/// admin". The error is logged and never propagated, so an unreachable user
/// table degrades privileges rather than availability.
pub async fn check_admin(store: &dyn DocumentStore, identity: &Identity) -> bool {
    let Some(user_id) = identity.user_id() else {
        return false;
    };
    match store.is_admin(user_id).await {
        Ok(flag) => flag,
        Err(e) => {
            tracing::warn!("admin check failed for {user_id}, treating as non-admin: {e}");
            false
        }
    }
}
