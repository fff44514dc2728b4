use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::api_keys::{ApiKeyRecord, ApiScope};

use super::{PostgresRepositories, map_sqlx_error};

const API_KEY_COLUMNS: &str = "id, name, user_id, prefix, hashed_secret, scopes, expires_at, \
     revoked_at, last_used_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    name: String,
    user_id: String,
    prefix: String,
    hashed_secret: Vec<u8>,
    scopes: Vec<String>,
    expires_at: Option<OffsetDateTime>,
    revoked_at: Option<OffsetDateTime>,
    last_used_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = RepoError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let scopes = row
            .scopes
            .iter()
            .map(|scope| {
                scope.parse::<ApiScope>().map_err(|_| RepoError::Integrity {
                    message: format!("unknown api scope `{scope}` on key {}", row.id),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApiKeyRecord {
            id: row.id,
            name: row.name,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            scopes,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait::async_trait]
impl ApiKeysRepo for PostgresRepositories {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let scopes: Vec<&str> = params.scopes.iter().map(|scope| scope.as_str()).collect();
        let sql = format!(
            "INSERT INTO api_keys (id, name, user_id, prefix, hashed_secret, scopes, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {API_KEY_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&params.name)
            .bind(&params.user_id)
            .bind(&params.prefix)
            .bind(&params.hashed_secret)
            .bind(&scopes)
            .bind(params.expires_at)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        ApiKeyRecord::try_from(row)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE prefix = $1");
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(prefix)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ApiKeyRecord::try_from).transpose()
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let result = query("UPDATE api_keys SET revoked_at = $1 WHERE id = $2 AND revoked_at IS NULL")
            .bind(revoked_at)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM api_keys WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
        }

        Ok(())
    }

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(last_used_at)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
