use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use super::AnalysisConfiguration;
use crate::config::RequestConfig;
use crate::engine::{AnalysisExecutionResult, ComputeEngine, EngineRequest};
use crate::error::{AppError, AppResult, EngineError, EngineResult};
use crate::interpretation::InterpretationEngine;
use crate::recommendations::RecommendationGenerator;
use crate::storage::{AnalysisRecord, AnalysisStatus, SqliteStorage, Storage};
use crate::validation::{ValidationEngine, ValidationSeverity};

/// Message stored on records stopped through [`AnalysisOrchestrator::cancel`].
pub const CANCELLED_MESSAGE: &str = "Analysis cancelled by user request";

/// Progress reported while a record is interpreting, and the cap while executing.
const PROGRESS_CAP: f64 = 95.0;

/// Drives analysis records through their lifecycle.
///
/// Each request gets its own record; runs for the same project share nothing
/// but the storage pool and the table of in-flight cancel signals.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    engine: Arc<dyn ComputeEngine>,
    storage: SqliteStorage,
    validator: ValidationEngine,
    interpreter: InterpretationEngine,
    recommender: RecommendationGenerator,
    timeout: Duration,
    active: Arc<RwLock<HashMap<String, watch::Sender<bool>>>>,
}

impl AnalysisOrchestrator {
    /// Create a new orchestrator
    pub fn new(engine: Arc<dyn ComputeEngine>, storage: SqliteStorage, request: &RequestConfig) -> Self {
        Self {
            engine,
            storage,
            validator: ValidationEngine::new(),
            interpreter: InterpretationEngine::new(),
            recommender: RecommendationGenerator::new(),
            timeout: Duration::from_millis(request.timeout_ms),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Override the compute call budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a request to a terminal state and return the final record.
    ///
    /// Only a [`ConfigurationError`](crate::error::ConfigurationError) aborts
    /// before a record exists. Engine failures are recorded, not returned.
    pub async fn run(&self, configuration: AnalysisConfiguration) -> AppResult<AnalysisRecord> {
        let record = self.create(configuration).await?;
        self.execute(record).await
    }

    /// Persist a request and drive it on a background task.
    ///
    /// Returns the record id for use with [`progress`](Self::progress) and
    /// [`cancel`](Self::cancel).
    pub async fn submit(&self, configuration: AnalysisConfiguration) -> AppResult<String> {
        let record = self.create(configuration).await?;
        let id = record.id.clone();

        let this = self.clone();
        tokio::spawn(async move {
            let record_id = record.id.clone();
            if let Err(e) = this.execute(record).await {
                error!(record_id = %record_id, error = %e, "Background analysis failed");
            }
        });

        Ok(id)
    }

    /// Stop an executing record.
    pub async fn cancel(&self, record_id: &str) -> AppResult<AnalysisRecord> {
        let mut record = self.load(record_id).await?;
        if record.status != AnalysisStatus::Executing {
            return Err(invalid_transition(&record));
        }

        record.set_status(AnalysisStatus::Cancelled);
        record.error_message = Some(CANCELLED_MESSAGE.to_string());
        record.execution_time_ms = elapsed_ms(&record);

        if !self
            .storage
            .transition_record(&record, AnalysisStatus::Executing)
            .await?
        {
            let current = self.load(record_id).await?;
            return Err(invalid_transition(&current));
        }

        if let Some(signal) = self.active.read().await.get(record_id) {
            let _ = signal.send(true);
        }

        if let Err(e) = self.engine.abort(record_id).await {
            warn!(record_id = %record_id, error = %e, "Abort signal not delivered");
        }

        warn!(record_id = %record_id, "Analysis cancelled");
        Ok(record)
    }

    /// Estimated completion percentage in `[0, 100]`.
    pub async fn progress(&self, record_id: &str) -> AppResult<f64> {
        let record = self.load(record_id).await?;
        let progress = match record.status {
            AnalysisStatus::Executing => {
                let expected_ms = record.configuration.analysis_type.profile().expected_secs * 1000;
                let elapsed = elapsed_ms(&record).unwrap_or(0).max(0) as f64;
                (elapsed / expected_ms as f64 * 100.0).min(PROGRESS_CAP)
            }
            AnalysisStatus::Interpreting => PROGRESS_CAP,
            AnalysisStatus::Completed => 100.0,
            AnalysisStatus::Pending
            | AnalysisStatus::Validating
            | AnalysisStatus::Failed
            | AnalysisStatus::Cancelled => 0.0,
        };
        Ok(progress)
    }

    /// Fetch one record.
    pub async fn record(&self, record_id: &str) -> AppResult<AnalysisRecord> {
        self.load(record_id).await
    }

    /// All records of a project, newest first.
    pub async fn records_for_project(&self, project_id: &str) -> AppResult<Vec<AnalysisRecord>> {
        Ok(self.storage.list_project_records(project_id).await?)
    }

    async fn load(&self, record_id: &str) -> AppResult<AnalysisRecord> {
        self.storage
            .get_record(record_id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound {
                record_id: record_id.to_string(),
            })
    }

    async fn create(&self, configuration: AnalysisConfiguration) -> AppResult<AnalysisRecord> {
        configuration.check_roles()?;

        let record = AnalysisRecord::new(configuration);
        self.storage.create_record(&record).await?;

        info!(
            record_id = %record.id,
            project_id = %record.project_id,
            analysis_type = %record.configuration.analysis_type,
            rows = record.configuration.sample_size(),
            "Analysis record created"
        );
        Ok(record)
    }

    async fn execute(&self, mut record: AnalysisRecord) -> AppResult<AnalysisRecord> {
        // Validating
        record.set_status(AnalysisStatus::Validating);
        if !self.storage.transition_record(&record, AnalysisStatus::Pending).await? {
            return self.load(&record.id).await;
        }

        let config = &record.configuration;
        let context = config.validation_context();
        let validation = self.validator.validate(&config.dataset, config.analysis_type, &context);
        if validation.overall_severity == ValidationSeverity::Critical {
            warn!(
                record_id = %record.id,
                summary = %validation.summary,
                "Proceeding despite critical validation issues"
            );
        }
        record.validation = Some(validation);

        // Executing
        let (signal, cancel_rx) = watch::channel(false);
        self.active.write().await.insert(record.id.clone(), signal);

        record.set_status(AnalysisStatus::Executing);
        record.started_at = Some(Utc::now());
        if !self.storage.transition_record(&record, AnalysisStatus::Validating).await? {
            self.active.write().await.remove(&record.id);
            return self.load(&record.id).await;
        }

        let request = EngineRequest::build(&record.configuration, &record.id);
        debug!(
            record_id = %record.id,
            operation = %request.operation,
            rows = request.dataset.rows.len(),
            columns = request.dataset.columns.len(),
            "Dispatching to compute engine"
        );

        let start = Instant::now();
        let outcome = self.call_engine(request, cancel_rx).await;
        self.active.write().await.remove(&record.id);

        info!(
            record_id = %record.id,
            latency_ms = start.elapsed().as_millis(),
            success = outcome.is_ok(),
            "Compute engine returned"
        );

        self.finish(record, outcome).await
    }

    async fn call_engine(
        &self,
        request: EngineRequest,
        cancel_rx: watch::Receiver<bool>,
    ) -> EngineResult<AnalysisExecutionResult> {
        let timeout_ms = self.timeout.as_millis() as u64;
        tokio::select! {
            result = tokio::time::timeout(self.timeout, self.engine.execute(request)) => {
                result.unwrap_or(Err(EngineError::Timeout { timeout_ms }))
            }
            _ = cancellation(cancel_rx) => Err(EngineError::Cancelled),
        }
    }

    /// Apply an engine outcome to an executing record.
    ///
    /// Every write is conditional on the status this task last wrote, so a
    /// record cancelled in the meantime keeps its terminal state.
    async fn finish(
        &self,
        mut record: AnalysisRecord,
        outcome: EngineResult<AnalysisExecutionResult>,
    ) -> AppResult<AnalysisRecord> {
        let execution = match outcome {
            Ok(execution) => execution,
            Err(EngineError::Cancelled) => return self.load(&record.id).await,
            Err(e) => {
                let message = match &e {
                    EngineError::Remote { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                error!(record_id = %record.id, error = %e, "Analysis failed");

                record.set_status(AnalysisStatus::Failed);
                record.error_message = Some(message);
                record.execution_time_ms = elapsed_ms(&record);
                if !self.storage.transition_record(&record, AnalysisStatus::Executing).await? {
                    warn!(record_id = %record.id, "Discarding late failure");
                    return self.load(&record.id).await;
                }
                return Ok(record);
            }
        };

        // Interpreting
        record.execution_result = Some(execution);
        record.set_status(AnalysisStatus::Interpreting);
        if !self.storage.transition_record(&record, AnalysisStatus::Executing).await? {
            warn!(record_id = %record.id, "Discarding late result");
            return self.load(&record.id).await;
        }

        let (interpretation, recommendations) = match (&record.execution_result, &record.validation) {
            (Some(execution), Some(validation)) => {
                let config = &record.configuration;
                (
                    self.interpreter.interpret(
                        execution,
                        config.analysis_type,
                        &config.research_context,
                        validation,
                    ),
                    self.recommender.generate(config.analysis_type, execution, validation),
                )
            }
            _ => {
                return Err(AppError::Internal {
                    message: format!("Record {} reached interpretation without results", record.id),
                })
            }
        };
        record.interpretation = Some(interpretation);
        record.recommendations = recommendations;

        // Completed
        record.set_status(AnalysisStatus::Completed);
        record.execution_time_ms = elapsed_ms(&record);
        if !self.storage.transition_record(&record, AnalysisStatus::Interpreting).await? {
            return self.load(&record.id).await;
        }

        info!(
            record_id = %record.id,
            analysis_type = %record.configuration.analysis_type,
            execution_time_ms = record.execution_time_ms,
            recommendations = record.recommendations.len(),
            "Analysis completed"
        );
        Ok(record)
    }
}

/// Resolves once the cancel flag is raised. Never resolves if the sender is gone.
async fn cancellation(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn elapsed_ms(record: &AnalysisRecord) -> Option<i64> {
    record
        .started_at
        .map(|started| (Utc::now() - started).num_milliseconds())
}

fn invalid_transition(record: &AnalysisRecord) -> AppError {
    AppError::InvalidTransition {
        record_id: record.id.clone(),
        status: record.status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisType;
    use crate::dataset::{Dataset, VariableRole, VariableRoleMap};
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;
    use tokio::sync::Notify;

    mock! {
        pub Engine {}

        #[async_trait]
        impl ComputeEngine for Engine {
            async fn execute(&self, request: EngineRequest) -> EngineResult<AnalysisExecutionResult>;
            async fn abort(&self, execution_id: &str) -> EngineResult<()>;
        }
    }

    /// Blocks in `execute` until released, then reports success.
    struct GatedEngine {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ComputeEngine for GatedEngine {
        async fn execute(&self, _request: EngineRequest) -> EngineResult<AnalysisExecutionResult> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(AnalysisExecutionResult::new(json!({ "r_squared": 0.4 })))
        }

        async fn abort(&self, _execution_id: &str) -> EngineResult<()> {
            Ok(())
        }
    }

    fn regression_config(n: usize) -> AnalysisConfiguration {
        let mut rows = vec![vec![
            "satisfaction".to_string(),
            "price".to_string(),
            "quality".to_string(),
        ]];
        for i in 0..n {
            let x = i as f64;
            rows.push(vec![
                format!("{}", 2.0 + 0.3 * x + (x * 1.7).sin()),
                format!("{}", 10.0 + (x * 0.9).cos() * 3.0),
                format!("{}", 5.0 + (x * 2.3).sin() * 2.0),
            ]);
        }
        let dataset = Dataset::from_rows(&rows).unwrap();
        AnalysisConfiguration::new("proj-1", AnalysisType::Regression, "drivers", dataset).with_variables(
            VariableRoleMap::new()
                .with_role(VariableRole::Dependent, ["satisfaction"])
                .with_role(VariableRole::Independent, ["price", "quality"]),
        )
    }

    async fn orchestrator(engine: Arc<dyn ComputeEngine>) -> AnalysisOrchestrator {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        AnalysisOrchestrator::new(engine, storage, &RequestConfig::default())
    }

    #[tokio::test]
    async fn test_missing_roles_fail_before_engine_call() {
        let mut engine = MockEngine::new();
        engine.expect_execute().never();
        let orch = orchestrator(Arc::new(engine)).await;

        let mut config = regression_config(40);
        config.variables = VariableRoleMap::new();
        let err = orch.run(config).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(orch.records_for_project("proj-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_reaches_completed_with_interpretation() {
        let mut engine = MockEngine::new();
        engine
            .expect_execute()
            .withf(|req| req.operation == "linear_regression" && req.formula.is_some())
            .times(1)
            .returning(|_| {
                Ok(AnalysisExecutionResult::new(json!({
                    "r_squared": 0.42, "f_statistic": 12.1, "f_pvalue": 0.0004
                })))
            });
        let orch = orchestrator(Arc::new(engine)).await;

        let record = orch.run(regression_config(40)).await.unwrap();
        assert_eq!(record.status, AnalysisStatus::Completed);
        assert!(record.interpretation.is_some());
        assert!(record.execution_time_ms.is_some());
        assert_eq!(
            record.validation.as_ref().unwrap().severity_of("sample_size"),
            Some(ValidationSeverity::Critical)
        );

        let stored = orch.record(&record.id).await.unwrap();
        assert_eq!(stored, record);
        assert_eq!(orch.progress(&record.id).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_remote_failure_stores_message_verbatim() {
        let mut engine = MockEngine::new();
        engine.expect_execute().returning(|req| {
            Err(EngineError::Remote {
                operation: req.operation,
                message: "singular design matrix".to_string(),
            })
        });
        let orch = orchestrator(Arc::new(engine)).await;

        let record = orch.run(regression_config(60)).await.unwrap();
        assert_eq!(record.status, AnalysisStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("singular design matrix"));
        assert!(record.interpretation.is_none());
        assert!(record.recommendations.is_empty());
        assert_eq!(orch.progress(&record.id).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let engine = Arc::new(GatedEngine {
            started: Notify::new(),
            release: Notify::new(),
        });
        let orch = orchestrator(engine).await.with_timeout(Duration::from_millis(50));

        let record = orch.run(regression_config(60)).await.unwrap();
        assert_eq!(record.status, AnalysisStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("Request timeout after 50ms"));
    }

    #[tokio::test]
    async fn test_cancel_while_executing() {
        let engine = Arc::new(GatedEngine {
            started: Notify::new(),
            release: Notify::new(),
        });
        let orch = orchestrator(engine.clone()).await;

        let id = orch.submit(regression_config(60)).await.unwrap();
        engine.started.notified().await;

        let progress = orch.progress(&id).await.unwrap();
        assert!((0.0..=PROGRESS_CAP).contains(&progress));

        let cancelled = orch.cancel(&id).await.unwrap();
        assert_eq!(cancelled.status, AnalysisStatus::Cancelled);
        assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_MESSAGE));

        engine.release.notify_one();
        tokio::task::yield_now().await;

        let stored = orch.record(&id).await.unwrap();
        assert_eq!(stored.status, AnalysisStatus::Cancelled);
        assert!(stored.execution_result.is_none());

        let again = orch.cancel(&id).await.unwrap_err();
        assert!(matches!(again, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_late_result_after_cancel_is_discarded() {
        let mut engine = MockEngine::new();
        engine.expect_abort().returning(|_| Ok(()));
        let orch = orchestrator(Arc::new(engine)).await;

        let mut record = AnalysisRecord::new(regression_config(60));
        record.set_status(AnalysisStatus::Executing);
        record.started_at = Some(Utc::now());
        orch.storage.create_record(&record).await.unwrap();

        orch.cancel(&record.id).await.unwrap();

        let late = AnalysisExecutionResult::new(json!({ "r_squared": 0.9 }));
        let after = orch.finish(record.clone(), Ok(late)).await.unwrap();
        assert_eq!(after.status, AnalysisStatus::Cancelled);
        assert!(after.execution_result.is_none());

        let failure = Err(EngineError::Timeout { timeout_ms: 1 });
        let after = orch.finish(record, failure).await.unwrap();
        assert_eq!(after.status, AnalysisStatus::Cancelled);
        assert_eq!(after.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    }

    #[tokio::test]
    async fn test_cancel_rejected_unless_executing() {
        let engine = MockEngine::new();
        let orch = orchestrator(Arc::new(engine)).await;

        let record = AnalysisRecord::new(regression_config(60));
        orch.storage.create_record(&record).await.unwrap();

        let err = orch.cancel(&record.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { ref status, .. } if status == "pending"));

        let err = orch.cancel("missing").await.unwrap_err();
        assert!(matches!(err, AppError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_abort_failure_does_not_undo_cancel() {
        let mut engine = MockEngine::new();
        engine.expect_abort().returning(|_| {
            Err(EngineError::Api {
                status: 503,
                message: "busy".to_string(),
            })
        });
        let orch = orchestrator(Arc::new(engine)).await;

        let mut record = AnalysisRecord::new(regression_config(60));
        record.set_status(AnalysisStatus::Executing);
        orch.storage.create_record(&record).await.unwrap();

        let cancelled = orch.cancel(&record.id).await.unwrap();
        assert_eq!(cancelled.status, AnalysisStatus::Cancelled);
    }
}
