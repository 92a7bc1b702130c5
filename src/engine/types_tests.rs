//! Unit tests for compute engine request building and envelope handling.

use super::*;
use crate::dataset::Dataset;
use pretty_assertions::assert_eq;
use serde_json::json;

fn dataset() -> Dataset {
    Dataset::from_rows(&[
        vec!["satisfaction", "price", "quality", "age", "group", "t1", "t2", "l1", "l2"],
        vec!["4", "10", "3", "31", "a", "1", "2", "3", "4"],
        vec!["5", "12", "4", "45", "b", "2", "3", "4", "5"],
    ])
    .unwrap()
}

fn config(analysis_type: AnalysisType, roles: VariableRoleMap) -> AnalysisConfiguration {
    AnalysisConfiguration::new("p1", analysis_type, "test", dataset()).with_variables(roles)
}

// Formula derivation

#[test]
fn test_regression_formula_includes_controls() {
    let roles = VariableRoleMap::new()
        .with_role(VariableRole::Dependent, ["satisfaction"])
        .with_role(VariableRole::Independent, ["price", "quality"])
        .with_role(VariableRole::Control, ["age"]);
    let request = EngineRequest::build(&config(AnalysisType::Regression, roles), "exec-1");
    assert_eq!(request.operation, "linear_regression");
    assert_eq!(request.formula.as_deref(), Some("satisfaction ~ price + quality + age"));
    assert!(request.model_syntax.is_none());
}

#[test]
fn test_anova_formula_marks_groups_categorical() {
    let roles = VariableRoleMap::new()
        .with_role(VariableRole::Dependent, ["satisfaction"])
        .with_role(VariableRole::Independent, ["group"]);
    let request = EngineRequest::build(&config(AnalysisType::Anova, roles), "exec-1");
    assert_eq!(request.formula.as_deref(), Some("satisfaction ~ C(group)"));
}

#[test]
fn test_moderation_formula_has_interaction() {
    let roles = VariableRoleMap::new()
        .with_role(VariableRole::Dependent, ["satisfaction"])
        .with_role(VariableRole::Independent, ["price"])
        .with_role(VariableRole::Moderator, ["age"]);
    let request = EngineRequest::build(&config(AnalysisType::Moderation, roles), "exec-1");
    assert_eq!(request.formula.as_deref(), Some("satisfaction ~ price * age"));
}

#[test]
fn test_mediation_spec() {
    let roles = VariableRoleMap::new()
        .with_role(VariableRole::Dependent, ["satisfaction"])
        .with_role(VariableRole::Independent, ["price"])
        .with_role(VariableRole::Mediator, ["quality"]);
    let request = EngineRequest::build(&config(AnalysisType::Mediation, roles), "exec-1");
    assert_eq!(
        request.mediation,
        Some(MediationSpec {
            x: "price".to_string(),
            m: "quality".to_string(),
            y: "satisfaction".to_string(),
        })
    );
}

// Model syntax

#[test]
fn test_cfa_syntax_per_construct() {
    let roles = VariableRoleMap::new()
        .with_construct("trust", ["t1", "t2"])
        .with_construct("loyalty", ["l1", "l2"]);
    let request = EngineRequest::build(&config(AnalysisType::Cfa, roles), "exec-1");
    assert_eq!(
        request.model_syntax.as_deref(),
        Some("loyalty =~ l1 + l2\ntrust =~ t1 + t2")
    );
}

#[test]
fn test_cfa_single_factor_without_construct_map() {
    let roles = VariableRoleMap::new().with_role(VariableRole::Constructs, ["t1", "t2", "l1"]);
    let request = EngineRequest::build(&config(AnalysisType::Cfa, roles), "exec-1");
    assert_eq!(request.model_syntax.as_deref(), Some("F1 =~ t1 + t2 + l1"));
}

#[test]
fn test_sem_syntax_adds_structural_paths() {
    let roles = VariableRoleMap::new()
        .with_construct("trust", ["t1", "t2"])
        .with_construct("loyalty", ["l1", "l2"])
        .with_role(VariableRole::Independent, ["trust"])
        .with_role(VariableRole::Dependent, ["loyalty"]);
    let request = EngineRequest::build(&config(AnalysisType::Sem, roles), "exec-1");
    assert_eq!(request.operation, "structural_equation_model");
    assert_eq!(
        request.model_syntax.as_deref(),
        Some("loyalty =~ l1 + l2\ntrust =~ t1 + t2\nloyalty ~ trust")
    );
}

#[test]
fn test_request_serialization_omits_operation() {
    let request = EngineRequest::new("t_test", "exec-9", dataset().to_wire())
        .with_formula("y ~ C(g)")
        .with_parameter("alpha", json!(0.05));
    let value = serde_json::to_value(&request).unwrap();
    assert!(value.get("operation").is_none());
    assert_eq!(value["execution_id"], json!("exec-9"));
    assert_eq!(value["formula"], json!("y ~ C(g)"));
    assert_eq!(value["parameters"]["alpha"], json!(0.05));
    assert!(value.get("model_syntax").is_none());
    assert_eq!(value["dataset"]["columns"][0], json!("satisfaction"));
}

// Envelope

#[test]
fn test_success_envelope() {
    let response: EngineResponse = serde_json::from_value(json!({
        "status": "success",
        "results": { "r_squared": 0.42 },
        "session_info": { "engine": "r" }
    }))
    .unwrap();
    let result = response.into_execution_result("linear_regression").unwrap();
    assert_eq!(result.results["r_squared"], json!(0.42));
    assert_eq!(result.session_info["engine"], json!("r"));
}

#[test]
fn test_error_envelope_surfaces_message_verbatim() {
    let response: EngineResponse = serde_json::from_value(json!({
        "status": "error",
        "message": "model did not converge"
    }))
    .unwrap();
    let err = response.into_execution_result("confirmatory_factor_analysis").unwrap_err();
    match err {
        EngineError::Remote { operation, message } => {
            assert_eq!(operation, "confirmatory_factor_analysis");
            assert_eq!(message, "model did not converge");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_error_envelope_falls_back_to_error_field() {
    let response: EngineResponse =
        serde_json::from_value(json!({ "status": "failed", "error": "singular matrix" })).unwrap();
    let err = response.into_execution_result("anova").unwrap_err();
    assert_eq!(err.to_string(), "anova failed: singular matrix");
}
