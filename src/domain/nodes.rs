//! Project nodes and the preprint state they can be promoted into.
//!
//! A node becomes a preprint once it references a primary file. Preprint
//! fields are changed through setters that check the acting user's
//! permission; setters only mutate the in-memory value and never persist,
//! so a caller can stage several changes, run [`Node::validate`], and write
//! the result once.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;
use super::files::{PRIMARY_STORAGE_PROVIDER, StoredFile};
use super::subjects::Subject;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_TAG_LENGTH: usize = 128;

/// Contributor permission level; later variants include earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub user_id: String,
    pub permission: Permission,
    pub visible: bool,
}

/// Identity of the user acting on a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub user_id: Option<String>,
}

impl Auth {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub contributors: Vec<Contributor>,
    pub preprint_file: Option<String>,
    pub preprint_subjects: Vec<String>,
    pub preprint_provider: Option<String>,
    pub preprint_doi: Option<String>,
    pub preprint_created: Option<OffsetDateTime>,
    pub date_created: OffsetDateTime,
    pub date_modified: OffsetDateTime,
}

impl Node {
    pub fn is_preprint(&self) -> bool {
        self.preprint_file.is_some()
    }

    pub fn has_permission(&self, user_id: &str, permission: Permission) -> bool {
        self.contributors
            .iter()
            .any(|contributor| contributor.user_id == user_id && contributor.permission >= permission)
    }

    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    fn require_admin(&self, auth: &Auth, message: &str) -> Result<(), DomainError> {
        match auth.user_id.as_deref() {
            Some(user_id) if self.has_permission(user_id, Permission::Admin) => Ok(()),
            _ => Err(DomainError::permission(message)),
        }
    }

    /// Updates that only touch simple fields still need an admin.
    pub fn authorize_preprint_update(&self, auth: &Auth) -> Result<(), DomainError> {
        self.require_admin(auth, "Only admins can update a preprint.")
    }

    /// Stage `file` as the preprint's primary file.
    ///
    /// The first assignment also stamps the preprint creation time.
    pub fn set_preprint_file(&mut self, file: &StoredFile, auth: &Auth) -> Result<(), DomainError> {
        self.require_admin(auth, "Only admins can change a preprint's primary file.")?;

        if file.node_id != self.id || file.provider != PRIMARY_STORAGE_PROVIDER || file.is_deleted {
            return Err(DomainError::value(
                "This file is not a valid primary file for this preprint.",
            ));
        }

        if self.preprint_file.is_none() {
            self.preprint_created = Some(OffsetDateTime::now_utc());
        }
        self.preprint_file = Some(file.id.clone());
        Ok(())
    }

    /// Stage the preprint's subjects from requested ids resolved against `known`.
    pub fn set_preprint_subjects(
        &mut self,
        requested: &[String],
        known: &[Subject],
        auth: &Auth,
    ) -> Result<(), DomainError> {
        self.require_admin(auth, "Only admins can change a preprint's subjects.")?;

        let mut subjects: Vec<String> = Vec::with_capacity(requested.len());
        for id in requested {
            if !known.iter().any(|subject| &subject.id == id) {
                return Err(DomainError::value(format!(
                    "Subject with id <{id}> could not be found."
                )));
            }
            if !subjects.contains(id) {
                subjects.push(id.clone());
            }
        }

        self.preprint_subjects = subjects;
        Ok(())
    }

    /// Persist-time validation of every field a preprint write can touch.
    pub fn validate(&self) -> Result<(), DomainError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("Title cannot be blank."));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(DomainError::validation(format!(
                "Title cannot exceed {MAX_TITLE_LENGTH} characters."
            )));
        }

        for tag in &self.tags {
            if tag.trim().is_empty() {
                return Err(DomainError::validation("Tag cannot be blank."));
            }
            if tag.chars().count() > MAX_TAG_LENGTH {
                return Err(DomainError::validation(format!(
                    "Tag cannot exceed {MAX_TAG_LENGTH} characters."
                )));
            }
        }

        Ok(())
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.date_modified = now;
    }
}
