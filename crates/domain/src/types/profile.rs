//! Patient profiles attached to a user account

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Cghs,
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "SELF")]
    Myself,
    #[serde(rename = "SPOUSE")]
    Spouse,
    #[serde(rename = "CHILD")]
    Child,
    #[serde(rename = "PARENT")]
    Parent,
    #[serde(rename = "OTHER")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub relation: Relation,
    pub user_type: UserType,
    pub user_type_locked: bool,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pick the profile a fresh session should act for: the default one, else
/// the first.
pub fn select_active_profile(profiles: &[Profile]) -> Option<&Profile> {
    profiles.iter().find(|profile| profile.is_default).or_else(|| profiles.first())
}
