use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in a verified token. Token issuance happens upstream;
/// this service only ever checks roles, it never mints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
    Arbitrator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Arbitrator => "arbitrator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "buyer" => Some(Role::Buyer),
            "seller" => Some(Role::Seller),
            "arbitrator" => Some(Role::Arbitrator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The authenticated caller, as extracted from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_arbitrator(&self) -> bool {
        self.role == Role::Arbitrator
    }
}
