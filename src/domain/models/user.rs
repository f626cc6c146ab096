use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trainer,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trainer => "trainer",
            Role::Member => "member",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Trainer)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "trainer" => Ok(Role::Trainer),
            "member" => Ok(Role::Member),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email: crate::domain::models::booking::normalize_email(&email),
            password_hash,
            role: role.as_str().to_string(),
            phone_number: None,
            bio: None,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Member)
    }
}

/// The authenticated caller, threaded explicitly into every ledger call.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl Requester {
    pub fn is_privileged(&self) -> bool {
        self.role.is_staff()
    }

    pub fn owns(&self, client_email: &str) -> bool {
        self.email.eq_ignore_ascii_case(client_email.trim())
    }
}
