//! End-to-end tests of the analysis pipeline
//!
//! Runs the orchestrator against a wiremock compute engine and in-memory
//! SQLite storage.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use analysis_pipeline::config::{EngineConfig, RequestConfig};
use analysis_pipeline::dataset::{Dataset, VariableRole, VariableRoleMap};
use analysis_pipeline::engine::HttpComputeEngine;
use analysis_pipeline::recommendations::MAX_RECOMMENDATIONS;
use analysis_pipeline::storage::{AnalysisStatus, SqliteStorage};
use analysis_pipeline::validation::ValidationSeverity;
use analysis_pipeline::{
    AnalysisConfiguration, AnalysisOrchestrator, AnalysisType, AppError, ResearchContext,
};

async fn create_orchestrator(base_url: &str) -> AnalysisOrchestrator {
    let request = RequestConfig {
        timeout_ms: 5000,
        connect_timeout_ms: 1000,
    };
    let engine = HttpComputeEngine::new(
        &EngineConfig {
            base_url: base_url.to_string(),
            api_key: None,
        },
        request.clone(),
    )
    .expect("Failed to create client");
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage");
    AnalysisOrchestrator::new(Arc::new(engine), storage, &request)
}

/// Customer survey with `n` respondents.
fn survey_config(n: usize) -> AnalysisConfiguration {
    let mut rows = vec![vec![
        "satisfaction".to_string(),
        "price".to_string(),
        "quality".to_string(),
    ]];
    for i in 0..n {
        let price = ((i * 7) % 10) as f64 + 1.0;
        let quality = ((i * 3) % 7) as f64 + 1.0;
        let satisfaction = 0.2 * price + 0.5 * quality + ((i * 11) % 4) as f64;
        rows.push(vec![satisfaction.to_string(), price.to_string(), quality.to_string()]);
    }
    let dataset = Dataset::from_rows(&rows).unwrap();

    AnalysisConfiguration::new("survey-2024", AnalysisType::Regression, "Satisfaction drivers", dataset)
        .with_variables(
            VariableRoleMap::new()
                .with_role(VariableRole::Dependent, ["satisfaction"])
                .with_role(VariableRole::Independent, ["price", "quality"]),
        )
        .with_research_context(ResearchContext {
            theoretical_framework: Some("Expectation-Confirmation Theory".to_string()),
            hypotheses: vec!["Quality predicts satisfaction".to_string()],
            ..Default::default()
        })
}

#[tokio::test]
async fn test_regression_completes_despite_critical_sample_size() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analysis/linear_regression"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "results": {
                "r_squared": 0.06,
                "adj_r_squared": 0.01,
                "f_statistic": 1.2,
                "f_pvalue": 0.31,
                "vif": { "price": 6.4, "quality": 6.4 }
            },
            "session_info": { "engine": "statsmodels" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = create_orchestrator(&mock_server.uri()).await;
    let record = orchestrator.run(survey_config(40)).await.unwrap();

    assert_eq!(record.status, AnalysisStatus::Completed);
    let validation = record.validation.as_ref().unwrap();
    assert_eq!(validation.severity_of("sample_size"), Some(ValidationSeverity::Critical));
    assert_eq!(validation.overall_severity, ValidationSeverity::Critical);

    let interpretation = record.interpretation.as_ref().unwrap();
    assert!(!interpretation.statistical.is_empty());
    assert!(interpretation.limitations.contains("Sample size (CRITICAL)"));
    assert!(interpretation.academic.contains("Expectation-Confirmation Theory"));

    assert!(record.recommendations.len() <= MAX_RECOMMENDATIONS);
    let mut unique = record.recommendations.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), record.recommendations.len());
    assert!(record
        .recommendations
        .iter()
        .any(|r| r.starts_with("price has VIF above 5")));

    let stored = orchestrator.record(&record.id).await.unwrap();
    assert_eq!(stored.status, AnalysisStatus::Completed);
    assert_eq!(orchestrator.progress(&record.id).await.unwrap(), 100.0);
}

#[tokio::test]
async fn test_engine_error_marks_failed_without_interpretation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analysis/linear_regression"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "Design matrix is singular"
        })))
        .mount(&mock_server)
        .await;

    let orchestrator = create_orchestrator(&mock_server.uri()).await;
    let record = orchestrator.run(survey_config(80)).await.unwrap();

    assert_eq!(record.status, AnalysisStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("Design matrix is singular"));
    assert!(record.interpretation.is_none());
    assert!(record.validation.is_some());
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn test_missing_roles_rejected_before_dispatch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let orchestrator = create_orchestrator(&mock_server.uri()).await;
    let config = survey_config(80).with_variables(
        VariableRoleMap::new().with_role(VariableRole::Dependent, ["satisfaction"]),
    );

    let err = orchestrator.run(config).await.unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
    assert!(orchestrator
        .records_for_project("survey-2024")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cancel_discards_late_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analysis/linear_regression"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "results": { "r_squared": 0.5 } }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;

    let orchestrator = create_orchestrator(&mock_server.uri()).await;
    let id = orchestrator.submit(survey_config(80)).await.unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/analysis/{}/abort", id)))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut executing = false;
    for _ in 0..200 {
        if orchestrator.record(&id).await.unwrap().status == AnalysisStatus::Executing {
            executing = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(executing, "record never reached executing");

    let cancelled = orchestrator.cancel(&id).await.unwrap();
    assert_eq!(cancelled.status, AnalysisStatus::Cancelled);
    assert!(!cancelled.error_message.as_deref().unwrap_or_default().is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;

    let stored = orchestrator.record(&id).await.unwrap();
    assert_eq!(stored.status, AnalysisStatus::Cancelled);
    assert!(stored.execution_result.is_none());
    assert!(stored.interpretation.is_none());
    assert_eq!(orchestrator.progress(&id).await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_project_records_listed_newest_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analysis/linear_regression"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "results": { "r_squared": 0.3 }
        })))
        .mount(&mock_server)
        .await;

    let orchestrator = create_orchestrator(&mock_server.uri()).await;
    let first = orchestrator.run(survey_config(60)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = orchestrator.run(survey_config(60)).await.unwrap();

    let ids: Vec<String> = orchestrator
        .records_for_project("survey-2024")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}
