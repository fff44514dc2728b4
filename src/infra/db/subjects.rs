use async_trait::async_trait;

use crate::application::repos::{RepoError, SubjectsRepo};
use crate::domain::subjects::Subject;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SubjectRow {
    id: String,
    text: String,
    parent_ids: Vec<String>,
}

#[async_trait]
impl SubjectsRepo for PostgresRepositories {
    async fn find_subjects(&self, ids: &[String]) -> Result<Vec<Subject>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, SubjectRow>(
            "SELECT id, text, parent_ids FROM subjects WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Subject {
                id: row.id,
                text: row.text,
                parent_ids: row.parent_ids,
            })
            .collect())
    }
}
