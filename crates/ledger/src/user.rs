//! User records and registration input.

use chrono::{DateTime, Utc};
use common::UserId;
use domain::Tier;
use serde::{Deserialize, Serialize};

/// Input for registering a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
}

/// A registered platform user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: String,

    /// Entitlement classification, mutated only by the reconciliation
    /// engine and the first-run bootstrap.
    pub tier: Tier,

    /// True for the platform owner (the first registered user), whose
    /// account the commission total belongs to.
    pub is_owner: bool,

    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Builds the record for a fresh registration.
    ///
    /// The first registered user becomes the platform owner and receives
    /// a permanent `Forever` grant; everyone else starts on `Free`.
    pub fn register(new_user: NewUser, is_first: bool) -> Self {
        Self {
            id: UserId::new(),
            email: new_user.email,
            name: new_user.name,
            tier: if is_first { Tier::Forever } else { Tier::Free },
            is_owner: is_first,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test".to_string(),
        }
    }

    #[test]
    fn first_user_becomes_owner_with_forever_grant() {
        let user = UserRecord::register(new_user("owner@example.com"), true);
        assert!(user.is_owner);
        assert_eq!(user.tier, Tier::Forever);
    }

    #[test]
    fn later_users_start_free() {
        let user = UserRecord::register(new_user("user@example.com"), false);
        assert!(!user.is_owner);
        assert_eq!(user.tier, Tier::Free);
    }
}
