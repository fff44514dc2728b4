//! Backfill of comment spam status and latest-report timestamps.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::comments::Comment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpamMigrationReport {
    pub status_targets: usize,
    pub status_migrated: usize,
    pub latest_targets: usize,
    pub latest_migrated: usize,
}

#[derive(Clone)]
pub struct SpamMigration {
    comments: Arc<dyn CommentsRepo>,
}

impl SpamMigration {
    pub fn new(comments: Arc<dyn CommentsRepo>) -> Self {
        Self { comments }
    }

    /// Comments that have never been assigned a spam status.
    pub async fn no_status_targets(&self) -> Result<Vec<Comment>, RepoError> {
        let comments = self.comments.list_comments_without_status().await?;
        Ok(comments.into_iter().filter(Comment::needs_status).collect())
    }

    /// Flagged or spam comments missing their latest report timestamp.
    pub async fn no_latest_targets(&self) -> Result<Vec<Comment>, RepoError> {
        let comments = self.comments.list_reported_comments_without_latest().await?;
        Ok(comments
            .into_iter()
            .filter(Comment::needs_latest_report)
            .collect())
    }

    pub async fn migrate_status(&self, targets: &[Comment]) -> Result<usize, RepoError> {
        for comment in targets {
            let status = comment.inferred_status();
            self.comments
                .update_spam_state(&comment.id, Some(status), comment.latest_report)
                .await?;
            debug!(
                target = "quire::migrations::spam",
                comment_id = %comment.id,
                status = status.code(),
                "spam status set"
            );
        }
        Ok(targets.len())
    }

    /// Set `latest_report` to the newest report date; comments without reports are left alone.
    pub async fn migrate_latest(&self, targets: &[Comment]) -> Result<usize, RepoError> {
        let mut migrated = 0;
        for comment in targets {
            let Some(latest) = comment.newest_report_date() else {
                continue;
            };
            self.comments
                .update_spam_state(&comment.id, comment.spam_status, Some(latest))
                .await?;
            migrated += 1;
        }
        Ok(migrated)
    }

    /// Run the status backfill, then the latest-report backfill.
    ///
    /// With `dry_run` only the target counts are collected.
    pub async fn run(&self, dry_run: bool) -> Result<SpamMigrationReport, RepoError> {
        let mut report = SpamMigrationReport::default();

        let status_targets = self.no_status_targets().await?;
        report.status_targets = status_targets.len();
        if !dry_run {
            report.status_migrated = self.migrate_status(&status_targets).await?;
        }

        let latest_targets = self.no_latest_targets().await?;
        report.latest_targets = latest_targets.len();
        if !dry_run {
            report.latest_migrated = self.migrate_latest(&latest_targets).await?;
        }

        info!(
            target = "quire::migrations::spam",
            dry_run,
            status_targets = report.status_targets,
            status_migrated = report.status_migrated,
            latest_targets = report.latest_targets,
            latest_migrated = report.latest_migrated,
            "spam migration finished"
        );
        Ok(report)
    }
}
