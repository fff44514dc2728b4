use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::api_keys::{ApiKeyRecord, ApiScope};
use crate::domain::nodes::Auth;

const TOKEN_PREFIX: &str = "qk";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid scope set")]
    InvalidScopes,
    #[error("user id must not be empty")]
    MissingUser,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("invalid api key")]
    Invalid,
    #[error("expired api key")]
    Expired,
    #[error("revoked api key")]
    Revoked,
}

#[derive(Debug, Clone)]
pub struct IssueApiKeyCommand {
    pub name: String,
    pub user_id: String,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ApiKeyIssued {
    pub record: ApiKeyRecord,
    pub token: String,
}

/// Authenticated caller resolved from an API key.
#[derive(Debug, Clone)]
pub struct ApiPrincipal {
    pub key_id: Uuid,
    pub user_id: String,
    pub scopes: Vec<ApiScope>,
}

impl ApiPrincipal {
    pub fn allows(&self, needed: ApiScope) -> bool {
        self.scopes.contains(&needed)
    }

    pub fn auth(&self) -> Auth {
        Auth::user(self.user_id.clone())
    }
}

#[derive(Clone)]
pub struct ApiKeyService {
    repo: Arc<dyn ApiKeysRepo>,
}

impl ApiKeyService {
    pub fn new(repo: Arc<dyn ApiKeysRepo>) -> Self {
        Self { repo }
    }

    pub async fn issue(&self, cmd: IssueApiKeyCommand) -> Result<ApiKeyIssued, ApiKeyError> {
        if cmd.scopes.is_empty() {
            return Err(ApiKeyError::InvalidScopes);
        }
        if cmd.user_id.trim().is_empty() {
            return Err(ApiKeyError::MissingUser);
        }

        let prefix = Self::generate_prefix();
        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let hashed_secret = Self::hash_secret(&secret);

        let record = self
            .repo
            .create_key(CreateApiKeyParams {
                name: cmd.name,
                user_id: cmd.user_id,
                prefix,
                hashed_secret,
                scopes: cmd.scopes,
                expires_at: cmd.expires_at,
            })
            .await?;

        Ok(ApiKeyIssued { record, token })
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), ApiKeyError> {
        self.repo
            .revoke_key(id, OffsetDateTime::now_utc())
            .await
            .map_err(ApiKeyError::from)
    }

    pub async fn authenticate(&self, token: &str) -> Result<ApiPrincipal, ApiAuthError> {
        let parsed = Self::parse_token(token).ok_or(ApiAuthError::Invalid)?;
        let record = self
            .repo
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| ApiAuthError::Invalid)?
            .ok_or(ApiAuthError::Invalid)?;

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(ApiAuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if record.is_revoked_at(now) {
            return Err(ApiAuthError::Revoked);
        }
        if record.is_expired_at(now) {
            return Err(ApiAuthError::Expired);
        }

        // best-effort last_used update; do not block auth
        let repo = self.repo.clone();
        let key_id = record.id;
        tokio::spawn(async move {
            let _ = repo.update_last_used(key_id, now).await;
        });

        Ok(ApiPrincipal {
            key_id: record.id,
            user_id: record.user_id,
            scopes: record.scopes,
        })
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_prefix() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.splitn(3, '_');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}
