//! services/panel/src/web/sessions.rs
//!
//! In-memory store for operator sessions. The upstream recommendation
//! service is the system of record for everything the panel shows, so the
//! panel keeps no database of its own; a restart simply signs everyone out.
//!
//! A session binds a cookie id to the upstream `Identity`, bearer token
//! included. The token never reaches the browser.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use lead_review_core::domain::Identity;

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone)]
struct StoredSession {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

/// Shared, concurrency-safe session map.
#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
}

impl SessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes),
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stores a fresh identity and returns the new session id. The session
    /// ends at the panel TTL or the upstream token expiry, whichever is
    /// sooner.
    pub async fn create(&self, identity: Identity) -> Uuid {
        let session_id = Uuid::new_v4();
        let expires_at = (Utc::now() + self.ttl).min(identity.token_expiry);
        self.inner
            .write()
            .await
            .insert(session_id, StoredSession { identity, expires_at });
        session_id
    }

    /// Resolves a session id to its identity. An expired entry is removed
    /// on the spot and treated as absent.
    pub async fn lookup(&self, session_id: Uuid) -> Option<Identity> {
        let mut sessions = self.inner.write().await;
        match sessions.get(&session_id) {
            Some(stored) if stored.expires_at > Utc::now() => Some(stored.identity.clone()),
            Some(_) => {
                sessions.remove(&session_id);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, session_id: Uuid) {
        self.inner.write().await.remove(&session_id);
    }

    /// Maximum cookie age in seconds, matching the store TTL.
    pub fn cookie_max_age(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

/// Formats the session cookie the way the browser is expected to hold it.
pub fn session_cookie(session_id: Uuid, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_seconds
    )
}

/// A cookie that removes the session from the browser.
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Pulls the session id out of a `Cookie` request header.
pub fn session_id_from_cookies(cookie_header: &str) -> Option<Uuid> {
    cookie_header
        .split(';')
        .find_map(|part| part.trim().strip_prefix("session="))
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(token_expiry: DateTime<Utc>) -> Identity {
        Identity {
            user_id: 7,
            name: "Operator".to_string(),
            email: "op@example.com".to_string(),
            token: "bearer-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            token_expiry,
            refresh_token_expiry: token_expiry + Duration::days(1),
        }
    }

    #[tokio::test]
    async fn created_sessions_resolve_until_removed() {
        let store = SessionStore::new(60);
        let id = store.create(identity(Utc::now() + Duration::hours(2))).await;

        let found = store.lookup(id).await.unwrap();
        assert_eq!(found.user_id, 7);
        assert_eq!(found.token, "bearer-token");

        store.remove(id).await;
        assert!(store.lookup(id).await.is_none());
    }

    #[tokio::test]
    async fn upstream_token_expiry_caps_the_session() {
        let store = SessionStore::new(60);
        // Token already expired; lookup must fail closed and evict.
        let id = store.create(identity(Utc::now() - Duration::minutes(1))).await;
        assert!(store.lookup(id).await.is_none());
        assert!(store.lookup(id).await.is_none());
    }

    #[tokio::test]
    async fn unknown_ids_resolve_to_nothing() {
        let store = SessionStore::new(60);
        assert!(store.lookup(Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn cookie_round_trip() {
        let id = Uuid::new_v4();
        let cookie = session_cookie(id, 3600);
        assert!(cookie.starts_with(&format!("session={}", id)));
        assert_eq!(
            session_id_from_cookies(&format!("theme=dark; session={}", id)),
            Some(id)
        );
        assert_eq!(session_id_from_cookies("theme=dark"), None);
    }
}
