//! Authenticated caller identity supplied by the upstream identity layer.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::types::{StudentId, TeacherId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Roles recognised at the attendance boundary.
pub enum PrincipalRole {
    Student,
    Teacher,
    Admin,
}

impl PrincipalRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalRole::Student => "student",
            PrincipalRole::Teacher => "teacher",
            PrincipalRole::Admin => "admin",
        }
    }
}

impl FromStr for PrincipalRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(PrincipalRole::Student),
            "teacher" => Ok(PrincipalRole::Teacher),
            "admin" => Ok(PrincipalRole::Admin),
            other => Err(format!("unknown principal role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Caller identity; trusted verbatim.
pub struct Principal {
    /// Account identifier of the caller.
    pub id: Uuid,
    /// Role the identity layer resolved for this account.
    pub role: PrincipalRole,
    /// Device identifier bound to the account, when supplied.
    pub device_id: Option<String>,
}

impl Principal {
    pub fn is_staff(&self) -> bool {
        matches!(self.role, PrincipalRole::Teacher | PrincipalRole::Admin)
    }

    pub fn as_student(&self) -> Option<StudentId> {
        (self.role == PrincipalRole::Student).then(|| StudentId::from_uuid(self.id))
    }

    pub fn as_teacher(&self) -> Option<TeacherId> {
        self.is_staff().then(|| TeacherId::from_uuid(self.id))
    }
}
