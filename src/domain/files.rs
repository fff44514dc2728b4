//! Stored files attached to nodes.

use std::path::PathBuf;

use time::OffsetDateTime;

/// Storage provider whose files may serve as a preprint's primary file.
pub const PRIMARY_STORAGE_PROVIDER: &str = "osfstorage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub node_id: String,
    pub name: String,
    pub provider: String,
    /// On-disk location of the file's current version.
    pub location: PathBuf,
    pub is_deleted: bool,
    pub date_modified: OffsetDateTime,
}
