//! Typed identifiers shared across the gate

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                $name(Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse a UUID string
            pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
                Ok($name(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                $name(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_str(s)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an authenticated principal
    UserId
);

uuid_id!(
    /// Identifier of a tenant organization
    OrganizationId
);

/// Outcome of a boolean security check.
///
/// Lookup failures collapse to `Denied`; callers must treat anything other
/// than `Allowed` as a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Allowed,
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        self == AccessDecision::Allowed
    }
}

impl From<bool> for AccessDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        }
    }
}

/// Organization every mock context is bound to
pub const MOCK_ORGANIZATION_ID: OrganizationId =
    OrganizationId(uuid::uuid!("47fba630-b113-4fe9-b68f-947d79c09fb2"));

/// User attached to mock contexts created by the middleware
pub const MOCK_USER_ID: UserId = UserId(uuid::uuid!("cc99e9f4-f68a-45f8-9d59-282cca1d0f94"));
