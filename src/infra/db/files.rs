use std::path::PathBuf;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{FilesRepo, RepoError};
use crate::domain::files::StoredFile;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct StoredFileRow {
    id: String,
    node_id: String,
    name: String,
    provider: String,
    location: String,
    is_deleted: bool,
    date_modified: OffsetDateTime,
}

impl From<StoredFileRow> for StoredFile {
    fn from(row: StoredFileRow) -> Self {
        Self {
            id: row.id,
            node_id: row.node_id,
            name: row.name,
            provider: row.provider,
            location: PathBuf::from(row.location),
            is_deleted: row.is_deleted,
            date_modified: row.date_modified,
        }
    }
}

#[async_trait]
impl FilesRepo for PostgresRepositories {
    async fn find_file(&self, id: &str) -> Result<Option<StoredFile>, RepoError> {
        let row = sqlx::query_as::<_, StoredFileRow>(
            "SELECT id, node_id, name, provider, location, is_deleted, date_modified \
             FROM stored_files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StoredFile::from))
    }
}
