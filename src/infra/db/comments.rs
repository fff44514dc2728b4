use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::comments::{Comment, CommentReport, SpamStatus};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    spam_status: Option<i16>,
    reports: Json<BTreeMap<String, CommentReport>>,
    latest_report: Option<OffsetDateTime>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let spam_status = row
            .spam_status
            .map(|code| {
                SpamStatus::from_code(code).ok_or_else(|| RepoError::Integrity {
                    message: format!("unknown spam status {code} on comment {}", row.id),
                })
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            spam_status,
            reports: row.reports.0,
            latest_report: row.latest_report,
        })
    }
}

impl PostgresRepositories {
    async fn list_comments_where(&self, predicate: &str) -> Result<Vec<Comment>, RepoError> {
        let sql = format!(
            "SELECT id, spam_status, reports, latest_report FROM comments WHERE {predicate} ORDER BY id"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Comment::try_from).collect()
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_comments_without_status(&self) -> Result<Vec<Comment>, RepoError> {
        self.list_comments_where("spam_status IS NULL").await
    }

    async fn list_reported_comments_without_latest(&self) -> Result<Vec<Comment>, RepoError> {
        self.list_comments_where("latest_report IS NULL AND spam_status IN (1, 2)")
            .await
    }

    async fn update_spam_state(
        &self,
        id: &str,
        spam_status: Option<SpamStatus>,
        latest_report: Option<OffsetDateTime>,
    ) -> Result<(), RepoError> {
        let result =
            sqlx::query("UPDATE comments SET spam_status = $1, latest_report = $2 WHERE id = $3")
                .bind(spam_status.map(SpamStatus::code))
                .bind(latest_report)
                .bind(id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
