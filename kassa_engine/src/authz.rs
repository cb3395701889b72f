//! Capability checks for privileged actions.
//!
//! Every privileged operation (operator decisions, admin management) calls through one of the
//! `require_*` predicates at its entry point rather than testing identities inline.

use thiserror::Error;

use crate::db_types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Actor {0} is not authorised for this action")]
pub struct Unauthorized(pub UserId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    admins: Vec<UserId>,
    operator: UserId,
}

impl AuthPolicy {
    pub fn new(admins: Vec<UserId>, operator: UserId) -> Self {
        Self { admins, operator }
    }

    /// The single fixed identity that approves or rejects orders.
    pub fn operator(&self) -> UserId {
        self.operator
    }

    pub fn is_admin(&self, actor: UserId) -> bool {
        self.admins.contains(&actor)
    }

    pub fn is_operator(&self, actor: UserId) -> bool {
        actor == self.operator
    }

    pub fn require_admin(&self, actor: UserId) -> Result<(), Unauthorized> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            Err(Unauthorized(actor))
        }
    }

    pub fn require_operator(&self, actor: UserId) -> Result<(), Unauthorized> {
        if self.is_operator(actor) {
            Ok(())
        } else {
            Err(Unauthorized(actor))
        }
    }
}
