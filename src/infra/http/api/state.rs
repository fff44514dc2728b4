use std::path::PathBuf;
use std::sync::Arc;

use crate::application::api_keys::ApiKeyService;
use crate::application::preprints::{PreprintSerializer, PreprintService};
use crate::application::render::RenderExecutor;
use crate::application::repos::FilesRepo;

#[derive(Clone)]
pub struct ApiState {
    pub api_keys: Arc<ApiKeyService>,
    pub preprints: Arc<PreprintService>,
    pub serializer: Arc<PreprintSerializer>,
    pub files: Arc<dyn FilesRepo>,
    pub render: Arc<dyn RenderExecutor>,
    pub render_cache_dir: PathBuf,
}
