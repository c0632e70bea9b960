use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Account types allowed to hold a subscription. The set is closed: plan names
/// at the billing provider must start with one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Vendor,
}

impl UserRole {
    pub const ALL: [UserRole; 2] = [UserRole::Customer, UserRole::Vendor];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Vendor => "vendor",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(UserRole::Customer),
            "vendor" => Some(UserRole::Vendor),
            _ => None,
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
