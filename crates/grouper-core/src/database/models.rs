use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Parent container, unique by name within a tenant. `name` is the
/// external lookup key; `id` never leaves the store/service layers.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Group {
    /// Assigned by the store on create; caller-supplied values are ignored.
    pub id: i32,
    pub name: String,
}

/// Closed set of member categories, stored by integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[repr(i32)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberCategory {
    Standard = 1001,
    Oversize = 1002,
}

impl MemberCategory {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MemberCategory::Standard => "STANDARD",
            MemberCategory::Oversize => "OVERSIZE",
        }
    }
}

impl fmt::Display for MemberCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid member category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for MemberCategory {
    type Err = ParseCategoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "STANDARD" => Ok(MemberCategory::Standard),
            "OVERSIZE" => Ok(MemberCategory::Oversize),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

/// Item owned by exactly one group. Looked up externally by
/// `external_id` plus the owning group's name, never by row id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Member {
    pub id: i32,
    /// Random token assigned at creation; the only identity exposed
    /// outside the service.
    pub external_id: Uuid,
    pub category: MemberCategory,
    pub size_mm: f32,
    pub group_id: i32,
}

/// Raw caller input for member creation. The category stays text so a
/// bad value surfaces as a validation failure rather than a
/// deserialization error at the boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMember {
    pub category: String,
    pub size_mm: f32,
}
