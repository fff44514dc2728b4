#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use quire::application::api_keys::{ApiKeyService, IssueApiKeyCommand};
use quire::application::preprints::{PreprintLinks, PreprintSerializer, PreprintService};
use quire::application::render::RenderExecutor;
use quire::application::repos::{
    ApiKeysRepo, CommentsRepo, CreateApiKeyParams, FilesRepo, JobsRepo, NewJobRecord, NodesRepo,
    RepoError, SubjectsRepo,
};
use quire::domain::api_keys::{ApiKeyRecord, ApiScope};
use quire::domain::comments::{Comment, SpamStatus};
use quire::domain::files::StoredFile;
use quire::domain::nodes::{Contributor, Node, Permission};
use quire::domain::subjects::Subject;
use quire::infra::http::{ApiState, build_api_router};

/// Every repository the application needs, backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    pub nodes: Mutex<HashMap<String, Node>>,
    pub files: Mutex<HashMap<String, StoredFile>>,
    pub subjects: Mutex<Vec<Subject>>,
    pub comments: Mutex<BTreeMap<String, Comment>>,
    pub api_keys: Mutex<Vec<ApiKeyRecord>>,
    pub jobs: Mutex<Vec<NewJobRecord>>,
    pub node_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert_node(&self, node: Node) {
        self.nodes.lock().await.insert(node.id.clone(), node);
    }

    pub async fn insert_file(&self, file: StoredFile) {
        self.files.lock().await.insert(file.id.clone(), file);
    }

    pub async fn insert_subject(&self, subject: Subject) {
        self.subjects.lock().await.push(subject);
    }

    pub async fn insert_comment(&self, comment: Comment) {
        self.comments.lock().await.insert(comment.id.clone(), comment);
    }

    pub async fn node(&self, id: &str) -> Option<Node> {
        self.nodes.lock().await.get(id).cloned()
    }

    pub fn saves(&self) -> usize {
        self.node_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodesRepo for MemoryStore {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RepoError> {
        Ok(self.nodes.lock().await.get(id).cloned())
    }

    async fn save_node(&self, node: &Node) -> Result<(), RepoError> {
        let mut nodes = self.nodes.lock().await;
        let slot = nodes.get_mut(&node.id).ok_or(RepoError::NotFound)?;
        *slot = node.clone();
        self.node_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl FilesRepo for MemoryStore {
    async fn find_file(&self, id: &str) -> Result<Option<StoredFile>, RepoError> {
        Ok(self.files.lock().await.get(id).cloned())
    }
}

#[async_trait]
impl SubjectsRepo for MemoryStore {
    async fn find_subjects(&self, ids: &[String]) -> Result<Vec<Subject>, RepoError> {
        Ok(self
            .subjects
            .lock()
            .await
            .iter()
            .filter(|subject| ids.contains(&subject.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments_without_status(&self) -> Result<Vec<Comment>, RepoError> {
        Ok(self
            .comments
            .lock()
            .await
            .values()
            .filter(|comment| comment.spam_status.is_none())
            .cloned()
            .collect())
    }

    async fn list_reported_comments_without_latest(&self) -> Result<Vec<Comment>, RepoError> {
        Ok(self
            .comments
            .lock()
            .await
            .values()
            .filter(|comment| {
                comment.latest_report.is_none()
                    && matches!(
                        comment.spam_status,
                        Some(SpamStatus::Flagged) | Some(SpamStatus::Spam)
                    )
            })
            .cloned()
            .collect())
    }

    async fn update_spam_state(
        &self,
        id: &str,
        spam_status: Option<SpamStatus>,
        latest_report: Option<OffsetDateTime>,
    ) -> Result<(), RepoError> {
        let mut comments = self.comments.lock().await;
        let comment = comments.get_mut(id).ok_or(RepoError::NotFound)?;
        comment.spam_status = spam_status;
        comment.latest_report = latest_report;
        Ok(())
    }
}

#[async_trait]
impl ApiKeysRepo for MemoryStore {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: params.name,
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            scopes: params.scopes,
            expires_at: params.expires_at,
            revoked_at: None,
            last_used_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.api_keys.lock().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        Ok(self
            .api_keys
            .lock()
            .await
            .iter()
            .find(|record| record.prefix == prefix)
            .cloned())
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut keys = self.api_keys.lock().await;
        let record = keys
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepoError::NotFound)?;
        record.revoked_at = Some(revoked_at);
        Ok(())
    }

    async fn update_last_used(&self, id: Uuid, used_at: OffsetDateTime) -> Result<(), RepoError> {
        if let Some(record) = self
            .api_keys
            .lock()
            .await
            .iter_mut()
            .find(|record| record.id == id)
        {
            record.last_used_at = Some(used_at);
        }
        Ok(())
    }
}

#[async_trait]
impl JobsRepo for MemoryStore {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut jobs = self.jobs.lock().await;
        jobs.push(job);
        Ok(format!("job-{}", jobs.len()))
    }
}

pub const API_BASE: &str = "http://localhost:8000/";
pub const WEB_BASE: &str = "http://localhost:5000/";
pub const DOI_RESOLVER: &str = "https://dx.doi.org/";

pub fn api_state(
    store: Arc<MemoryStore>,
    render: Arc<dyn RenderExecutor>,
    cache_dir: &Path,
) -> ApiState {
    let links = PreprintLinks::new(API_BASE, WEB_BASE, DOI_RESOLVER);
    ApiState {
        api_keys: Arc::new(ApiKeyService::new(store.clone())),
        preprints: Arc::new(PreprintService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        )),
        serializer: Arc::new(PreprintSerializer::new(links)),
        files: store,
        render,
        render_cache_dir: cache_dir.to_path_buf(),
    }
}

pub fn router(store: Arc<MemoryStore>, render: Arc<dyn RenderExecutor>, cache_dir: &Path) -> Router {
    build_api_router(api_state(store, render, cache_dir))
}

/// Issue a token for `user_id` carrying `scopes`.
pub async fn issue_token(store: &Arc<MemoryStore>, user_id: &str, scopes: Vec<ApiScope>) -> String {
    ApiKeyService::new(store.clone())
        .issue(IssueApiKeyCommand {
            name: format!("{user_id} test key"),
            user_id: user_id.to_string(),
            scopes,
            expires_at: None,
        })
        .await
        .expect("issue api key")
        .token
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("utf-8 body")
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/vnd.api+json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request")
}

pub fn contributor(user_id: &str, permission: Permission) -> Contributor {
    Contributor {
        user_id: user_id.to_string(),
        permission,
        visible: true,
    }
}

/// A plain project node with one admin and one writer.
pub fn node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        title: "Tide gauges and sea level".to_string(),
        description: Some("Long-run trends.".to_string()),
        tags: BTreeSet::from(["ocean".to_string()]),
        contributors: vec![
            contributor("admin1", Permission::Admin),
            contributor("writer1", Permission::Write),
        ],
        preprint_file: None,
        preprint_subjects: Vec::new(),
        preprint_provider: None,
        preprint_doi: None,
        preprint_created: None,
        date_created: OffsetDateTime::UNIX_EPOCH,
        date_modified: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn stored_file(id: &str, node_id: &str, location: &Path) -> StoredFile {
    StoredFile {
        id: id.to_string(),
        node_id: node_id.to_string(),
        name: location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        provider: "osfstorage".to_string(),
        location: location.to_path_buf(),
        is_deleted: false,
        date_modified: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn subject(id: &str, text: &str) -> Subject {
    Subject {
        id: id.to_string(),
        text: text.to_string(),
        parent_ids: Vec::new(),
    }
}

pub fn immediate_executor() -> Arc<dyn RenderExecutor> {
    use quire::application::render::{ImmediateExecutor, RenderRunner, RendererRegistry};

    let runner = RenderRunner::new(
        Arc::new(RendererRegistry::new(None)),
        "/static/mfr",
        std::time::Duration::from_secs(30),
    );
    Arc::new(ImmediateExecutor::new(runner))
}
