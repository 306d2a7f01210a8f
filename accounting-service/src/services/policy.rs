//! Role policy.
//!
//! There is exactly one place that decides whether a user is an admin:
//! [`AccessPolicy::resolve_role`]. Everything else asks the resolved [`Role`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
}

/// Areas of the application gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Sales,
    Customers,
    Expenses,
    Vendors,
    Categories,
    Reports,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }

    /// Managers work the sales desk only; admins see everything.
    pub fn can_access(&self, section: Section) -> bool {
        match self {
            Role::Admin => true,
            Role::Manager => matches!(section, Section::Sales | Section::Customers),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_email: Option<String>,
}

impl AccessPolicy {
    pub fn new(admin_email: Option<String>) -> Self {
        let admin_email = admin_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        Self { admin_email }
    }

    /// Admin when the email matches the configured admin address
    /// (case-insensitive, surrounding whitespace ignored). With no admin
    /// configured every user is a manager.
    pub fn resolve_role(&self, email: Option<&str>) -> Role {
        match (self.admin_email.as_deref(), email) {
            (Some(admin), Some(email)) if email.trim().to_lowercase() == admin => Role::Admin,
            _ => Role::Manager,
        }
    }
}
