//! Storage layer for analysis record persistence.
//!
//! One [`AnalysisRecord`] per analysis request holds the configuration,
//! validation detail, raw engine output, interpretation, recommendations,
//! status and timing. Downstream readers (reports, dashboards, citation
//! suggestions) consume completed records only.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisConfiguration;
use crate::engine::AnalysisExecutionResult;
use crate::error::StorageResult;
use crate::interpretation::Interpretation;
use crate::validation::ComprehensiveValidationResult;

/// Lifecycle state of an analysis record.
///
/// `Pending → Validating → Executing → Interpreting → Completed`, with
/// `Executing` also able to end in `Failed` or `Cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Created, nothing run yet.
    #[default]
    Pending,
    /// Prerequisite checks running.
    Validating,
    /// Waiting on the compute engine.
    Executing,
    /// Building interpretation and recommendations.
    Interpreting,
    /// Finished with results.
    Completed,
    /// Compute engine reported an error.
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl AnalysisStatus {
    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Validating => "validating",
            AnalysisStatus::Executing => "executing",
            AnalysisStatus::Interpreting => "interpreting",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::Failed | AnalysisStatus::Cancelled
        )
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AnalysisStatus::Pending),
            "validating" => Ok(AnalysisStatus::Validating),
            "executing" => Ok(AnalysisStatus::Executing),
            "interpreting" => Ok(AnalysisStatus::Interpreting),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            "cancelled" => Ok(AnalysisStatus::Cancelled),
            _ => Err(format!("Unknown analysis status: {}", s)),
        }
    }
}

/// The persisted unit of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Unique record identifier, also used as the engine execution id.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// The request as submitted.
    pub configuration: AnalysisConfiguration,
    /// Current lifecycle state.
    pub status: AnalysisStatus,
    /// Prerequisite check outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ComprehensiveValidationResult>,
    /// Raw compute engine output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<AnalysisExecutionResult>,
    /// Generated interpretation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
    /// Merged recommendations.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Failure or cancellation message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
    /// When the compute engine call started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the record reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock time from start of execution to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
}

impl AnalysisRecord {
    /// Create a new pending record for a configuration
    pub fn new(configuration: AnalysisConfiguration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: configuration.project_id.clone(),
            configuration,
            status: AnalysisStatus::Pending,
            validation: None,
            execution_result: None,
            interpretation: None,
            recommendations: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
        }
    }

    /// Recommendations joined one per line, as read by report generation.
    pub fn recommendations_text(&self) -> String {
        self.recommendations.join("\n")
    }

    /// Move to a new status and stamp `updated_at` (and `completed_at` when terminal).
    pub fn set_status(&mut self, status: AnalysisStatus) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
    }
}

/// Storage trait for analysis record persistence
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a new record.
    async fn create_record(&self, record: &AnalysisRecord) -> StorageResult<()>;
    /// Fetch a record by id.
    async fn get_record(&self, id: &str) -> StorageResult<Option<AnalysisRecord>>;
    /// Overwrite a record unconditionally.
    async fn update_record(&self, record: &AnalysisRecord) -> StorageResult<()>;
    /// Overwrite a record only if its stored status is still `expected`.
    ///
    /// Returns `false` when another writer changed the status first.
    async fn transition_record(
        &self,
        record: &AnalysisRecord,
        expected: AnalysisStatus,
    ) -> StorageResult<bool>;
    /// All records of a project, newest first.
    async fn list_project_records(&self, project_id: &str) -> StorageResult<Vec<AnalysisRecord>>;
    /// Remove a record.
    async fn delete_record(&self, id: &str) -> StorageResult<()>;
}
