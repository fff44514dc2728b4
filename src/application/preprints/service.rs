use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::application::repos::{FilesRepo, NodesRepo, RepoError, SubjectsRepo};
use crate::domain::error::DomainError;
use crate::domain::nodes::{Auth, Node};
use crate::domain::subjects::Subject;

use super::document::{DocumentError, PreprintChanges};

#[derive(Debug, Error)]
pub enum PreprintError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Unable to find Node with specified id.")]
    NodeNotFound,
    #[error("Not found.")]
    NotAPreprint,
    #[error("This node already stored as a preprint, use the update method instead.")]
    AlreadyPreprint,
    #[error("You must specify a primary_file to create a preprint.")]
    MissingPrimaryFile,
    #[error("You must specify at least one subject to create a preprint.")]
    MissingSubjects,
    #[error("Unable to find the specified primary_file.")]
    UnknownPrimaryFile,
    #[error("Not authorized to update this node.")]
    PermissionDenied,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for PreprintError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Permission { .. } => Self::PermissionDenied,
            DomainError::Value { message } | DomainError::Validation { message } => {
                Self::Invalid(message)
            }
        }
    }
}

/// A preprint node together with its resolved subjects.
#[derive(Debug, Clone)]
pub struct PreprintView {
    pub node: Node,
    pub subjects: Vec<Subject>,
}

#[derive(Clone)]
pub struct PreprintService {
    nodes: Arc<dyn NodesRepo>,
    files: Arc<dyn FilesRepo>,
    subjects: Arc<dyn SubjectsRepo>,
}

impl PreprintService {
    pub fn new(
        nodes: Arc<dyn NodesRepo>,
        files: Arc<dyn FilesRepo>,
        subjects: Arc<dyn SubjectsRepo>,
    ) -> Self {
        Self {
            nodes,
            files,
            subjects,
        }
    }

    pub async fn get(&self, id: &str) -> Result<PreprintView, PreprintError> {
        let node = self
            .nodes
            .find_node(id)
            .await?
            .filter(Node::is_preprint)
            .ok_or(PreprintError::NotAPreprint)?;
        self.view(node).await
    }

    /// Promote an existing node to a preprint.
    pub async fn create(
        &self,
        changes: PreprintChanges,
        auth: &Auth,
    ) -> Result<PreprintView, PreprintError> {
        let node_id = changes
            .node_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(PreprintError::NodeNotFound)?;
        let mut node = self
            .nodes
            .find_node(node_id)
            .await?
            .ok_or(PreprintError::NodeNotFound)?;

        if node.is_preprint() {
            return Err(PreprintError::AlreadyPreprint);
        }

        let file_id = changes
            .primary_file
            .as_deref()
            .ok_or(PreprintError::MissingPrimaryFile)?;
        let file = self
            .files
            .find_file(file_id)
            .await?
            .ok_or(PreprintError::MissingPrimaryFile)?;
        node.set_preprint_file(&file, auth)?;

        let subject_ids = changes
            .subjects
            .as_deref()
            .filter(|ids| !ids.is_empty())
            .ok_or(PreprintError::MissingSubjects)?;
        self.stage_subjects(&mut node, subject_ids, auth).await?;

        apply_simple_fields(&mut node, &changes);
        self.commit(&mut node).await?;

        info!(
            target = "quire::application::preprints",
            node_id = %node.id,
            "preprint created"
        );
        self.view(node).await
    }

    /// Apply the supplied changes to an existing preprint.
    pub async fn update(
        &self,
        id: &str,
        changes: PreprintChanges,
        auth: &Auth,
    ) -> Result<PreprintView, PreprintError> {
        let mut node = self
            .nodes
            .find_node(id)
            .await?
            .filter(Node::is_preprint)
            .ok_or(PreprintError::NotAPreprint)?;

        node.authorize_preprint_update(auth)?;

        if let Some(file_id) = changes.primary_file.as_deref() {
            let file = self
                .files
                .find_file(file_id)
                .await?
                .ok_or(PreprintError::UnknownPrimaryFile)?;
            node.set_preprint_file(&file, auth)?;
        }

        // An empty list leaves the current subjects in place.
        if let Some(subject_ids) = changes.subjects.as_deref().filter(|ids| !ids.is_empty()) {
            self.stage_subjects(&mut node, subject_ids, auth).await?;
        }

        apply_simple_fields(&mut node, &changes);
        self.commit(&mut node).await?;

        debug!(
            target = "quire::application::preprints",
            node_id = %node.id,
            "preprint updated"
        );
        self.view(node).await
    }

    async fn stage_subjects(
        &self,
        node: &mut Node,
        ids: &[String],
        auth: &Auth,
    ) -> Result<(), PreprintError> {
        let known = self.subjects.find_subjects(ids).await?;
        node.set_preprint_subjects(ids, &known, auth)?;
        Ok(())
    }

    async fn commit(&self, node: &mut Node) -> Result<(), PreprintError> {
        node.validate()?;
        node.touch(OffsetDateTime::now_utc());
        self.nodes.save_node(node).await?;
        Ok(())
    }

    async fn view(&self, node: Node) -> Result<PreprintView, PreprintError> {
        let mut subjects = self.subjects.find_subjects(&node.preprint_subjects).await?;
        subjects.sort_by_key(|subject| {
            node.preprint_subjects
                .iter()
                .position(|id| id == &subject.id)
                .unwrap_or(usize::MAX)
        });
        Ok(PreprintView { node, subjects })
    }
}

fn apply_simple_fields(node: &mut Node, changes: &PreprintChanges) {
    if let Some(title) = &changes.title {
        node.title = title.clone();
    }
    if let Some(description) = &changes.description {
        node.description = Some(description.clone());
    }
    if let Some(tags) = &changes.tags {
        node.tags = tags.iter().cloned().collect();
    }
    if let Some(provider) = &changes.provider {
        node.preprint_provider = Some(provider.clone());
    }
    if let Some(doi) = &changes.doi {
        node.preprint_doi = Some(doi.clone()).filter(|doi| !doi.trim().is_empty());
    }
}
