use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{NodesRepo, RepoError};
use crate::domain::nodes::{Contributor, Node, Permission};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    title: String,
    description: Option<String>,
    preprint_file_id: Option<String>,
    preprint_provider: Option<String>,
    preprint_doi: Option<String>,
    preprint_created: Option<OffsetDateTime>,
    date_created: OffsetDateTime,
    date_modified: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct ContributorRow {
    user_id: String,
    permission: String,
    visible: bool,
}

impl TryFrom<ContributorRow> for Contributor {
    type Error = RepoError;

    fn try_from(row: ContributorRow) -> Result<Self, Self::Error> {
        let permission = row
            .permission
            .parse::<Permission>()
            .map_err(|_| RepoError::Integrity {
                message: format!("unknown permission `{}`", row.permission),
            })?;
        Ok(Self {
            user_id: row.user_id,
            permission,
            visible: row.visible,
        })
    }
}

#[async_trait]
impl NodesRepo for PostgresRepositories {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RepoError> {
        let Some(row) = sqlx::query_as::<_, NodeRow>(
            "SELECT id, title, description, preprint_file_id, preprint_provider, preprint_doi, \
                    preprint_created, date_created, date_modified \
               FROM nodes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let contributors = sqlx::query_as::<_, ContributorRow>(
            "SELECT user_id, permission, visible FROM contributors \
              WHERE node_id = $1 ORDER BY position, user_id",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(Contributor::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let tags: Vec<(String,)> =
            sqlx::query_as("SELECT tag FROM node_tags WHERE node_id = $1 ORDER BY tag")
                .bind(id)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        let subjects: Vec<(String,)> = sqlx::query_as(
            "SELECT subject_id FROM node_subjects WHERE node_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(Node {
            id: row.id,
            title: row.title,
            description: row.description,
            tags: tags.into_iter().map(|(tag,)| tag).collect::<BTreeSet<_>>(),
            contributors,
            preprint_file: row.preprint_file_id,
            preprint_subjects: subjects.into_iter().map(|(id,)| id).collect(),
            preprint_provider: row.preprint_provider,
            preprint_doi: row.preprint_doi,
            preprint_created: row.preprint_created,
            date_created: row.date_created,
            date_modified: row.date_modified,
        }))
    }

    async fn save_node(&self, node: &Node) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            "UPDATE nodes SET title = $2, description = $3, preprint_file_id = $4, \
                    preprint_provider = $5, preprint_doi = $6, preprint_created = $7, \
                    date_modified = $8 \
              WHERE id = $1",
        )
        .bind(&node.id)
        .bind(&node.title)
        .bind(&node.description)
        .bind(&node.preprint_file)
        .bind(&node.preprint_provider)
        .bind(&node.preprint_doi)
        .bind(node.preprint_created)
        .bind(node.date_modified)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        sqlx::query("DELETE FROM node_tags WHERE node_id = $1")
            .bind(&node.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !node.tags.is_empty() {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO node_tags (node_id, tag) ");
            qb.push_values(node.tags.iter(), |mut row, tag| {
                row.push_bind(node.id.clone()).push_bind(tag.clone());
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        sqlx::query("DELETE FROM node_subjects WHERE node_id = $1")
            .bind(&node.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !node.preprint_subjects.is_empty() {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO node_subjects (node_id, subject_id, position) ");
            qb.push_values(
                node.preprint_subjects.iter().enumerate(),
                |mut row, (position, subject)| {
                    row.push_bind(node.id.clone())
                        .push_bind(subject.clone())
                        .push_bind(position as i32);
                },
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
