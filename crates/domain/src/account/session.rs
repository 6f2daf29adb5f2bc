use chrono::{DateTime, Utc};
use common::UserId;
use serde::Serialize;

use super::{RoleKind, User};
use crate::error::{DomainError, Result};

/// Proof of a successful login, passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    user_id: UserId,
    name: String,
    role: RoleKind,
    started_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn start(user: &User) -> Self {
        Self::for_user(user.id(), user.name(), user.role().kind())
    }

    pub(crate) fn for_user(user_id: UserId, name: impl Into<String>, role: RoleKind) -> Self {
        Self {
            user_id,
            name: name.into(),
            role,
            started_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> RoleKind {
        self.role
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the customer's id, or `Forbidden` for an admin session.
    pub fn require_customer(&self) -> Result<UserId> {
        match self.role {
            RoleKind::Customer => Ok(self.user_id),
            RoleKind::Admin => Err(DomainError::Forbidden(
                "operation requires a customer session".into(),
            )),
        }
    }

    /// Returns the admin's id, or `Forbidden` for a customer session.
    pub fn require_admin(&self) -> Result<UserId> {
        match self.role {
            RoleKind::Admin => Ok(self.user_id),
            RoleKind::Customer => Err(DomainError::Forbidden(
                "operation requires an admin session".into(),
            )),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == RoleKind::Admin
    }
}
