//! Operator records and the permission gate.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;

/// Operator permission tier (the "card" on the account).
///
/// | Card   | modify-id | clone-to-new |
/// |--------|-----------|--------------|
/// | `hour` | allowed   | denied       |
/// | `full` | allowed   | allowed      |
/// | `none` | denied    | denied       |
///
/// An `admin` operator passes the gate regardless of card, and an unverified
/// operator is denied everything regardless of card. See [`User::may_run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    /// Hourly ticket; may only rename the Local ID.
    Hour,
    /// Full card; may run either operation.
    Full,
    /// No card on record.
    #[default]
    None,
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardType::Hour => write!(f, "hour"),
            CardType::Full => write!(f, "full"),
            CardType::None => write!(f, "none"),
        }
    }
}

/// Operator class. `Admin` overrides card-tier restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    #[default]
    Normal,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::Normal => write!(f, "normal"),
        }
    }
}

/// The two mutually exclusive account operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Rename the Local ID of the logged-in source account.
    ModifyId,
    /// Clone the source account's data onto a target account under a new Local ID.
    CloneToNew,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::ModifyId => write!(f, "modify-id"),
            OperationKind::CloneToNew => write!(f, "clone-to-new"),
        }
    }
}

/// Operator record, handed to the workflow by the verification subsystem.
///
/// Immutable for the workflow's lifetime; all permission decisions derive
/// from it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub verified: bool,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub user_type: UserType,
}

impl User {
    /// Whether this operator may run `op` at all.
    pub fn may_run(&self, op: OperationKind) -> bool {
        if !self.verified {
            return false;
        }
        if self.user_type == UserType::Admin {
            return true;
        }
        match (self.card_type, op) {
            (CardType::Full, _) => true,
            (CardType::Hour, OperationKind::ModifyId) => true,
            (CardType::Hour, OperationKind::CloneToNew) => false,
            // No card on record means no tier at all.
            (CardType::None, _) => false,
        }
    }

    /// Gate check with an operator-facing denial message.
    pub fn check_permission(&self, op: OperationKind) -> Result<(), WorkflowError> {
        if !self.verified {
            return Err(WorkflowError::PermissionDenied(
                "operator is not verified".to_string(),
            ));
        }
        if self.may_run(op) {
            return Ok(());
        }
        let reason = match self.card_type {
            CardType::Hour => "hour-tier cards may only modify the Local ID".to_string(),
            CardType::None => "no card on record for this operator".to_string(),
            CardType::Full => format!("operator may not run {op}"),
        };
        Err(WorkflowError::PermissionDenied(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(verified: bool, card_type: CardType, user_type: UserType) -> User {
        User {
            id: 7,
            username: "operator".to_string(),
            verified,
            card_type,
            user_type,
        }
    }

    #[test]
    fn hour_tier_may_only_modify_id() {
        let user = operator(true, CardType::Hour, UserType::Normal);
        assert!(user.may_run(OperationKind::ModifyId));
        assert!(!user.may_run(OperationKind::CloneToNew));

        let denial = user.check_permission(OperationKind::CloneToNew).unwrap_err();
        assert!(matches!(denial, WorkflowError::PermissionDenied(_)));
    }

    #[test]
    fn full_tier_may_run_both() {
        let user = operator(true, CardType::Full, UserType::Normal);
        assert!(user.may_run(OperationKind::ModifyId));
        assert!(user.may_run(OperationKind::CloneToNew));
    }

    #[test]
    fn admin_overrides_card_tier() {
        for card in [CardType::Hour, CardType::Full, CardType::None] {
            let user = operator(true, card, UserType::Admin);
            assert!(user.may_run(OperationKind::ModifyId), "card {card}");
            assert!(user.may_run(OperationKind::CloneToNew), "card {card}");
        }
    }

    #[test]
    fn unverified_operator_is_denied_everything() {
        let user = operator(false, CardType::Full, UserType::Admin);
        assert!(!user.may_run(OperationKind::ModifyId));
        assert!(!user.may_run(OperationKind::CloneToNew));
    }

    #[test]
    fn cardless_normal_operator_is_denied_everything() {
        let user = operator(true, CardType::None, UserType::Normal);
        assert!(!user.may_run(OperationKind::ModifyId));
        assert!(!user.may_run(OperationKind::CloneToNew));
    }

    #[test]
    fn card_and_user_types_round_trip_lowercase() {
        let user = operator(true, CardType::Hour, UserType::Normal);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["card_type"], "hour");
        assert_eq!(json["user_type"], "normal");
    }
}
