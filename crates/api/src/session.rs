//! Bearer-token sessions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::Session;
use store::Store;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

/// In-process map from bearer token to the session it was issued for.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session and returns its freshly issued token.
    pub async fn issue(&self, session: Session) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);
        metrics::gauge!("active_sessions").set(sessions.len() as f64);
        token
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Forgets a token, returning the session it carried.
    pub async fn revoke(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(token);
        metrics::gauge!("active_sessions").set(sessions.len() as f64);
        session
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// The session behind the request's `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Session);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        state
            .sessions
            .get(token)
            .await
            .map(Authenticated)
            .ok_or_else(|| ApiError::Unauthorized("unknown or expired session".to_string()))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
