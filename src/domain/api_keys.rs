//! Domain types for API keys and scopes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// API permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiScope {
    PreprintRead,
    PreprintWrite,
    FileRender,
}

impl ApiScope {
    /// Returns the slug used for serialization and DB storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreprintRead => "preprint_read",
            Self::PreprintWrite => "preprint_write",
            Self::FileRender => "file_render",
        }
    }

    pub fn all() -> &'static [ApiScope] {
        &[Self::PreprintRead, Self::PreprintWrite, Self::FileRender]
    }
}

impl Display for ApiScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preprint_read" => Ok(Self::PreprintRead),
            "preprint_write" => Ok(Self::PreprintWrite),
            "file_render" => Ok(Self::FileRender),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    /// User the key acts on behalf of.
    pub user_id: String,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl ApiKeyRecord {
    pub fn is_revoked_at(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_some_and(|revoked_at| revoked_at <= now)
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}
