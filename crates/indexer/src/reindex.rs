//! Full reindex from the primary store.
//!
//! A reindex job walks every searchable type the primary store knows, pages
//! through its rows with fixed-size offset pagination and emits an index
//! event per row. Working state is released after every page so memory stays
//! bounded regardless of table size. Jobs do not coordinate with live events;
//! writes are idempotent upserts, so both converge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{IndexerError, IndexerResult, ReindexError};
use crate::mapping::{MappingRegistry, ModelMapper};
use crate::model::ModelType;
use crate::pipeline::{DeliveryMode, IndexEventPipeline};
use crate::store::PrimaryStore;

/// Rows loaded per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Parameters of a reindex job.
#[derive(Debug, Clone)]
pub struct ReindexRequest {
    /// Rows per page; must be at least one.
    pub page_size: usize,
    /// Delivery used for the emitted events.
    pub delivery: DeliveryMode,
    /// Document types to reindex (`None` = every searchable type).
    pub document_types: Option<Vec<String>>,
}

impl Default for ReindexRequest {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            delivery: DeliveryMode::Synchronous,
            document_types: None,
        }
    }
}

impl ReindexRequest {
    /// Reindexes every searchable type.
    pub fn all() -> Self {
        Self::default()
    }

    /// Reindexes only the given document types.
    pub fn for_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document_types: Some(types.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the delivery mode.
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    fn includes(&self, document_type: &str) -> bool {
        self.document_types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == document_type))
    }
}

/// State of a job or of one type within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReindexStatus {
    /// Not started.
    Pending,
    /// In progress.
    Running,
    /// Finished; individual rows may still have failed.
    Completed,
    /// Aborted by an error.
    Failed,
}

impl ReindexStatus {
    /// Returns true once the job (or type) will make no more progress.
    pub fn is_finished(&self) -> bool {
        matches!(self, ReindexStatus::Completed | ReindexStatus::Failed)
    }
}

/// Progress of one type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeProgress {
    /// Document type.
    pub document_type: String,
    /// Rows counted at the start.
    pub total: u64,
    /// Rows whose event was delivered.
    pub processed: u64,
    /// Rows whose event failed.
    pub failed: u64,
    /// Current state.
    pub status: ReindexStatus,
}

/// Progress of a whole job.
#[derive(Debug, Clone, Serialize)]
pub struct ReindexProgress {
    /// Job id.
    pub job_id: Uuid,
    /// Overall state.
    pub status: ReindexStatus,
    /// Per-type progress in processing order.
    pub types: Vec<TypeProgress>,
    /// When the job started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Error that aborted the job.
    pub error_message: Option<String>,
}

impl ReindexProgress {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: ReindexStatus::Pending,
            types: Vec::new(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Rows counted across all types.
    pub fn total(&self) -> u64 {
        self.types.iter().map(|t| t.total).sum()
    }

    /// Rows delivered across all types.
    pub fn processed(&self) -> u64 {
        self.types.iter().map(|t| t.processed).sum()
    }

    /// Rows failed across all types.
    pub fn failed(&self) -> u64 {
        self.types.iter().map(|t| t.failed).sum()
    }

    /// Progress of one document type.
    pub fn type_progress(&self, document_type: &str) -> Option<&TypeProgress> {
        self.types.iter().find(|t| t.document_type == document_type)
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            ((self.processed() + self.failed()) as f64 / total as f64) * 100.0
        }
    }
}

/// A reindex job ready to run.
#[derive(Debug)]
pub struct ReindexJob {
    id: Uuid,
    registry: Arc<MappingRegistry>,
    pipeline: Arc<IndexEventPipeline>,
    store: Arc<dyn PrimaryStore>,
    request: ReindexRequest,
    progress: Arc<RwLock<ReindexProgress>>,
}

impl ReindexJob {
    /// Creates a job with a fresh id.
    pub fn new(
        registry: Arc<MappingRegistry>,
        pipeline: Arc<IndexEventPipeline>,
        store: Arc<dyn PrimaryStore>,
        request: ReindexRequest,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            registry,
            pipeline,
            store,
            request,
            progress: Arc::new(RwLock::new(ReindexProgress::new(id))),
        }
    }

    /// Job id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the job's progress.
    pub fn progress(&self) -> ReindexProgress {
        self.progress.read().clone()
    }

    /// Spawns the job on the current runtime.
    pub fn spawn(self) -> ReindexHandle {
        let id = self.id;
        let progress = Arc::clone(&self.progress);
        let task = tokio::spawn(self.run());
        ReindexHandle { id, progress, task }
    }

    /// Runs the job to completion.
    pub async fn run(self) -> IndexerResult<ReindexProgress> {
        {
            let mut progress = self.progress.write();
            progress.status = ReindexStatus::Running;
            progress.started_at = Some(Utc::now());
        }
        info!(job_id = %self.id, page_size = self.request.page_size, "Reindex started");

        let outcome = self.run_types().await;

        let mut progress = self.progress.write();
        progress.completed_at = Some(Utc::now());
        match outcome {
            Ok(()) => {
                progress.status = ReindexStatus::Completed;
                info!(
                    job_id = %self.id,
                    processed = progress.processed(),
                    failed = progress.failed(),
                    "Reindex completed"
                );
                Ok(progress.clone())
            }
            Err(e) => {
                progress.status = ReindexStatus::Failed;
                progress.error_message = Some(e.to_string());
                for t in progress.types.iter_mut().filter(|t| !t.status.is_finished()) {
                    t.status = ReindexStatus::Failed;
                }
                error!(job_id = %self.id, error = %e, "Reindex failed");
                Err(e)
            }
        }
    }

    async fn run_types(&self) -> IndexerResult<()> {
        if self.request.page_size == 0 {
            return Err(ReindexError::InvalidPageSize { page_size: 0 }.into());
        }
        let page_size = i64::try_from(self.request.page_size).map_err(|_| ReindexError::InvalidPageSize {
            page_size: self.request.page_size,
        })?;

        for model_type in self.store.model_types() {
            if !self.registry.is_searchable(model_type) {
                continue;
            }
            let mapper = self.registry.get_mapper_for(model_type)?;
            if !self.request.includes(mapper.document_type()) {
                continue;
            }
            self.reindex_type(model_type, &mapper, page_size).await?;
        }
        Ok(())
    }

    fn update_type(&self, slot: usize, f: impl FnOnce(&mut TypeProgress)) {
        if let Some(t) = self.progress.write().types.get_mut(slot) {
            f(t);
        }
    }

    async fn reindex_type(&self, model_type: ModelType, mapper: &ModelMapper, page_size: i64) -> IndexerResult<()> {
        let count = self.store.count(model_type).await?;
        let rows = i64::try_from(count).map_err(|_| ReindexError::CountOverflow {
            type_name: mapper.type_name().to_string(),
            count,
        })?;

        let slot = {
            let mut progress = self.progress.write();
            progress.types.push(TypeProgress {
                document_type: mapper.document_type().to_string(),
                total: count,
                processed: 0,
                failed: 0,
                status: ReindexStatus::Running,
            });
            progress.types.len() - 1
        };
        info!(
            job_id = %self.id,
            doc_type = %mapper.document_type(),
            rows,
            "Reindexing type"
        );

        self.pipeline.writer().ensure_schema(mapper).await?;

        let mut offset: i64 = 0;
        while offset < rows {
            let page = self.store.fetch_page(model_type, offset, self.request.page_size).await?;
            if page.is_empty() {
                break;
            }

            let (mut processed, mut failed) = (0u64, 0u64);
            for row in page {
                match self
                    .pipeline
                    .index_with(Arc::from(row), &self.request.delivery)
                    .await
                {
                    Ok(()) => processed += 1,
                    Err(e) => {
                        failed += 1;
                        error!(doc_type = %mapper.document_type(), error = %e, "Failed to reindex row");
                    }
                }
            }
            self.update_type(slot, |t| {
                t.processed += processed;
                t.failed += failed;
            });

            self.store.release_working_state().await;
            offset = offset.saturating_add(page_size);
        }

        self.update_type(slot, |t| t.status = ReindexStatus::Completed);
        Ok(())
    }
}

/// Completion signal of a spawned job.
#[derive(Debug)]
pub struct ReindexHandle {
    id: Uuid,
    progress: Arc<RwLock<ReindexProgress>>,
    task: JoinHandle<IndexerResult<ReindexProgress>>,
}

impl ReindexHandle {
    /// Job id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the job's progress.
    pub fn progress(&self) -> ReindexProgress {
        self.progress.read().clone()
    }

    /// Returns true once the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the job and returns its final progress.
    pub async fn wait(self) -> IndexerResult<ReindexProgress> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(IndexerError::Reindex(ReindexError::JobAborted {
                job_id: self.id.to_string(),
                message: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ReindexRequest::default();
        assert_eq!(request.page_size, 256);
        assert!(matches!(request.delivery, DeliveryMode::Synchronous));
        assert!(request.includes("anything"));

        let request = ReindexRequest::for_types(["blog_post"]).with_page_size(10);
        assert!(request.includes("blog_post"));
        assert!(!request.includes("blog_comment"));
        assert_eq!(request.page_size, 10);
    }

    #[test]
    fn test_progress_totals() {
        let mut progress = ReindexProgress::new(Uuid::new_v4());
        assert_eq!(progress.percentage(), 0.0);
        progress.types = vec![
            TypeProgress {
                document_type: "a".to_string(),
                total: 3,
                processed: 3,
                failed: 0,
                status: ReindexStatus::Completed,
            },
            TypeProgress {
                document_type: "b".to_string(),
                total: 1,
                processed: 0,
                failed: 1,
                status: ReindexStatus::Completed,
            },
        ];
        assert_eq!(progress.total(), 4);
        assert_eq!(progress.processed(), 3);
        assert_eq!(progress.failed(), 1);
        assert_eq!(progress.percentage(), 100.0);
        assert_eq!(progress.type_progress("b").unwrap().failed, 1);
    }

    #[test]
    fn test_status_is_finished() {
        assert!(!ReindexStatus::Pending.is_finished());
        assert!(!ReindexStatus::Running.is_finished());
        assert!(ReindexStatus::Completed.is_finished());
        assert!(ReindexStatus::Failed.is_finished());
    }
}
