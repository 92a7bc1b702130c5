//! CLI commands for driving the pipeline from request files.
//!
//! Request files hold a JSON-encoded [`AnalysisConfiguration`]. Every command
//! prints JSON on success so output can be piped into other tools.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use crate::analysis::{AnalysisConfiguration, AnalysisOrchestrator};
use crate::validation::ValidationEngine;

/// Pipeline CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate, execute and interpret a request, then print the final record
    Run {
        /// Path to the JSON request file
        request: PathBuf,
    },

    /// Run the prerequisite checks only; nothing is persisted
    Validate {
        /// Path to the JSON request file
        request: PathBuf,
    },

    /// Print one stored record
    Show {
        /// Record id
        id: String,
    },

    /// List the records of a project, newest first
    List {
        /// Project id
        project: String,
    },

    /// Cancel an executing record
    Cancel {
        /// Record id
        id: String,
    },

    /// Print the estimated completion percentage of a record
    Progress {
        /// Record id
        id: String,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a pipeline CLI command.
pub async fn execute_command(command: Commands, orchestrator: &AnalysisOrchestrator) -> CliResult {
    match command {
        Commands::Run { request } => match read_request(&request) {
            Ok(config) => match orchestrator.run(config).await {
                Ok(record) => to_json(&record),
                Err(e) => CliResult::error(e.to_string()),
            },
            Err(result) => result,
        },
        Commands::Validate { request } => match read_request(&request) {
            Ok(config) => execute_validate(&config),
            Err(result) => result,
        },
        Commands::Show { id } => match orchestrator.record(&id).await {
            Ok(record) => to_json(&record),
            Err(e) => CliResult::error(e.to_string()),
        },
        Commands::List { project } => match orchestrator.records_for_project(&project).await {
            Ok(records) => {
                let summaries: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();
                to_json(&summaries)
            }
            Err(e) => CliResult::error(e.to_string()),
        },
        Commands::Cancel { id } => match orchestrator.cancel(&id).await {
            Ok(record) => to_json(&record),
            Err(e) => CliResult::error(e.to_string()),
        },
        Commands::Progress { id } => match orchestrator.progress(&id).await {
            Ok(progress) => CliResult::success(format!("{:.1}", progress)),
            Err(e) => CliResult::error(e.to_string()),
        },
    }
}

fn execute_validate(config: &AnalysisConfiguration) -> CliResult {
    if let Err(e) = config.check_roles() {
        return CliResult::error(e.to_string());
    }
    let context = config.validation_context();
    let result = ValidationEngine::new().validate(&config.dataset, config.analysis_type, &context);
    to_json(&result)
}

fn read_request(path: &Path) -> Result<AnalysisConfiguration, CliResult> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliResult::error(format!("Cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| CliResult::error(format!("Invalid request file {}: {}", path.display(), e)))
}

fn to_json<T: Serialize>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => CliResult::success(text),
        Err(e) => CliResult::error(format!("Failed to encode output: {}", e)),
    }
}

/// One line of `list` output.
#[derive(Debug, Serialize)]
struct RecordSummary<'a> {
    id: &'a str,
    analysis_name: &'a str,
    analysis_type: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    overall_severity: Option<String>,
    created_at: String,
}

impl<'a> From<&'a crate::storage::AnalysisRecord> for RecordSummary<'a> {
    fn from(record: &'a crate::storage::AnalysisRecord) -> Self {
        Self {
            id: &record.id,
            analysis_name: &record.configuration.analysis_name,
            analysis_type: record.configuration.analysis_type.to_string(),
            status: record.status.to_string(),
            overall_severity: record
                .validation
                .as_ref()
                .map(|v| v.overall_severity.to_string()),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}
