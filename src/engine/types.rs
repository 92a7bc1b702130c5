use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::{AnalysisConfiguration, AnalysisType};
use crate::dataset::{DatasetWire, VariableRole, VariableRoleMap};
use crate::error::{EngineError, EngineResult};

/// Status value the compute engine uses for a successful call.
pub const SUCCESS_STATUS: &str = "success";

/// Variables of a simple mediation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationSpec {
    /// Predictor
    pub x: String,
    /// Mediator
    pub m: String,
    /// Outcome
    pub y: String,
}

/// Request for one compute engine operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineRequest {
    /// Correlates the call with an analysis record; also the abort handle.
    pub execution_id: String,
    /// Engine operation name, sent as part of the URL.
    #[serde(skip)]
    pub operation: String,
    /// Columns and rows in wire form.
    pub dataset: DatasetWire,
    /// Role name → columns.
    pub variables: BTreeMap<String, Vec<String>>,
    /// Patsy-style formula for model-based operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// lavaan model syntax for CFA/SEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_syntax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediation: Option<MediationSpec>,
    /// Free-form options from the request.
    pub parameters: Map<String, Value>,
}

impl EngineRequest {
    /// Build the request for an analysis configuration.
    pub fn build(config: &AnalysisConfiguration, execution_id: impl Into<String>) -> Self {
        let roles = &config.variables;
        let (formula, model_syntax, mediation) = match config.analysis_type {
            AnalysisType::Regression => (regression_formula(roles), None, None),
            AnalysisType::Anova | AnalysisType::Ttest => (group_formula(roles), None, None),
            AnalysisType::Moderation => (moderation_formula(roles), None, None),
            AnalysisType::Mediation => (None, None, mediation_spec(roles)),
            AnalysisType::Cfa => (None, Some(measurement_syntax(config)), None),
            AnalysisType::Sem => {
                let mut lines = vec![measurement_syntax(config)];
                lines.extend(structural_syntax(roles));
                (None, Some(lines.join("\n")), None)
            }
            _ => (None, None, None),
        };

        Self {
            execution_id: execution_id.into(),
            operation: config.analysis_type.profile().operation.to_string(),
            dataset: config.dataset.to_wire(),
            variables: roles.as_map(),
            formula,
            model_syntax,
            mediation,
            parameters: config.parameters.clone(),
        }
    }

    /// Create a request with the dataset and parameters only
    pub fn new(operation: impl Into<String>, execution_id: impl Into<String>, dataset: DatasetWire) -> Self {
        Self {
            execution_id: execution_id.into(),
            operation: operation.into(),
            dataset,
            variables: BTreeMap::new(),
            formula: None,
            model_syntax: None,
            mediation: None,
            parameters: Map::new(),
        }
    }

    /// Set the formula
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

fn first(roles: &VariableRoleMap, role: VariableRole) -> Option<&str> {
    roles.get(role).first().map(String::as_str)
}

fn regression_formula(roles: &VariableRoleMap) -> Option<String> {
    let y = first(roles, VariableRole::Dependent)?;
    let terms: Vec<&str> = roles
        .get(VariableRole::Independent)
        .iter()
        .chain(roles.get(VariableRole::Control))
        .map(String::as_str)
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(format!("{} ~ {}", y, terms.join(" + ")))
}

fn group_formula(roles: &VariableRoleMap) -> Option<String> {
    let y = first(roles, VariableRole::Dependent)?;
    let terms: Vec<String> = roles
        .get(VariableRole::Independent)
        .iter()
        .map(|g| format!("C({})", g))
        .chain(roles.get(VariableRole::Control).iter().cloned())
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(format!("{} ~ {}", y, terms.join(" + ")))
}

fn moderation_formula(roles: &VariableRoleMap) -> Option<String> {
    let y = first(roles, VariableRole::Dependent)?;
    let x = first(roles, VariableRole::Independent)?;
    let m = first(roles, VariableRole::Moderator)?;
    let mut formula = format!("{} ~ {} * {}", y, x, m);
    for c in roles.get(VariableRole::Control) {
        formula.push_str(" + ");
        formula.push_str(c);
    }
    Some(formula)
}

fn mediation_spec(roles: &VariableRoleMap) -> Option<MediationSpec> {
    Some(MediationSpec {
        x: first(roles, VariableRole::Independent)?.to_string(),
        m: first(roles, VariableRole::Mediator)?.to_string(),
        y: first(roles, VariableRole::Dependent)?.to_string(),
    })
}

/// lavaan measurement model: one `F =~ a + b + c` line per construct.
fn measurement_syntax(config: &AnalysisConfiguration) -> String {
    let roles = &config.variables;
    if roles.construct_items.is_empty() {
        let items = if roles.has(VariableRole::Constructs) {
            roles.get(VariableRole::Constructs).to_vec()
        } else {
            config.dataset.numeric_columns()
        };
        return format!("F1 =~ {}", items.join(" + "));
    }
    roles
        .construct_items
        .iter()
        .map(|(name, items)| format!("{} =~ {}", name, items.join(" + ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// lavaan regressions: each dependent on all independents, mediators and controls.
fn structural_syntax(roles: &VariableRoleMap) -> Vec<String> {
    let predictors: Vec<&str> = [VariableRole::Independent, VariableRole::Mediator, VariableRole::Control]
        .iter()
        .flat_map(|r| roles.get(*r))
        .map(String::as_str)
        .collect();
    if predictors.is_empty() {
        return Vec::new();
    }
    roles
        .get(VariableRole::Dependent)
        .iter()
        .map(|y| format!("{} ~ {}", y, predictors.join(" + ")))
        .collect()
}

/// Envelope returned by every compute engine operation
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponse {
    /// `"success"` or an engine-specific failure status.
    pub status: String,
    #[serde(default)]
    pub results: Value,
    #[serde(default)]
    pub session_info: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EngineResponse {
    /// Unwrap a successful envelope.
    ///
    /// Any status other than `"success"` becomes [`EngineError::Remote`]
    /// carrying the engine's own message unchanged.
    pub fn into_execution_result(self, operation: &str) -> EngineResult<AnalysisExecutionResult> {
        if self.status == SUCCESS_STATUS {
            return Ok(AnalysisExecutionResult {
                results: self.results,
                session_info: self.session_info,
            });
        }
        let message = self
            .message
            .or(self.error)
            .unwrap_or_else(|| format!("compute engine returned status '{}'", self.status));
        Err(EngineError::Remote {
            operation: operation.to_string(),
            message,
        })
    }
}

/// Raw numeric output of a successful operation.
///
/// Only the fields read by interpretation and recommendations have meaning
/// here; everything else is stored as returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisExecutionResult {
    /// Operation output as returned by the engine.
    pub results: Value,
    /// Engine and package versions, when reported.
    #[serde(default)]
    pub session_info: Value,
}

impl AnalysisExecutionResult {
    /// Wrap a results payload without session info
    pub fn new(results: Value) -> Self {
        Self {
            results,
            session_info: Value::Null,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
