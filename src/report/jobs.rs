//! Report job lifecycle.
//!
//! An in-process registry of report jobs keyed by UUID. Each job moves
//! monotonically through queued → running → complete | failed; only the
//! spawned worker writes the state, HTTP readers only observe it. A failed
//! run publishes no artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tracing::{error, info};
use uuid::Uuid;

use super::writer;
use super::{Report, ReportAggregator};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Complete { artifact: PathBuf },
    Failed { reason: String },
}

pub struct ReportJobs {
    storage: Arc<dyn Storage>,
    jobs: DashMap<Uuid, JobState>,
    output_dir: PathBuf,
    batch_size: usize,
}

impl ReportJobs {
    pub fn new(
        storage: Arc<dyn Storage>,
        output_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            jobs: DashMap::new(),
            output_dir: output_dir.into(),
            batch_size,
        })
    }

    /// Registers a new job and spawns its worker. Always creates a fresh
    /// job; the returned id is the handle for polling.
    pub fn start(self: &Arc<Self>) -> Uuid {
        let report_id = Uuid::new_v4();
        self.jobs.insert(report_id, JobState::Queued);

        let jobs = Arc::clone(self);
        tokio::spawn(async move { jobs.run(report_id).await });

        info!(%report_id, "report job queued");
        report_id
    }

    /// Current state of a job, or `None` for an unknown id.
    pub fn poll(&self, report_id: Uuid) -> Option<JobState> {
        self.jobs.get(&report_id).map(|state| state.clone())
    }

    async fn run(&self, report_id: Uuid) {
        self.jobs.insert(report_id, JobState::Running);
        let artifact = self.output_dir.join(format!("{report_id}.csv"));

        match self.generate(&artifact).await {
            Ok(report) => {
                info!(
                    %report_id,
                    rows = report.rows.len(),
                    skipped_sites = report.skipped_sites,
                    assumed_active_sites = report.assumed_active_sites,
                    rule_warnings = report.rule_warnings,
                    "report job complete"
                );
                self.jobs.insert(report_id, JobState::Complete { artifact });
            }
            Err(e) => {
                error!(%report_id, error = %e, "report job failed");
                let _ = tokio::fs::remove_file(&artifact).await;
                self.jobs
                    .insert(report_id, JobState::Failed { reason: e.to_string() });
            }
        }
    }

    async fn generate(&self, artifact: &Path) -> anyhow::Result<Report> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!("failed to create report directory: {}", self.output_dir.display())
            })?;

        let report = ReportAggregator::new(Arc::clone(&self.storage))
            .with_batch_size(self.batch_size)
            .generate()
            .await?;
        writer::write_csv(artifact, &report.rows)?;
        Ok(report)
    }
}
