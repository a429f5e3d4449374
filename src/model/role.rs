use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    /// Parses the role name carried in tokens and the users table.
    pub fn from_name(name: &str) -> Option<Self> {
        name.trim().parse().ok()
    }
}
