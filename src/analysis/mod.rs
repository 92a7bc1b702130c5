//! Analysis requests and the per-type reference table.
//!
//! [`AnalysisType`] is a closed set of the eleven supported procedures. Every
//! type-dependent constant (minimum sample, compute-engine operation, expected
//! duration, mandatory roles, applicable assumption checks) lives in one
//! static [`AnalysisProfile`] per variant, so adding a variant forces every
//! table to be filled in.

mod orchestrator;

pub use orchestrator::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::{Dataset, VariableRole, VariableRoleMap};
use crate::error::ConfigurationError;
use crate::validation::ValidationContext;

/// Supported statistical procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Means, spread and distribution shape.
    Descriptive,
    /// Internal consistency (Cronbach's alpha).
    Reliability,
    /// Exploratory factor analysis.
    Efa,
    /// Confirmatory factor analysis.
    Cfa,
    /// Structural equation modelling.
    Sem,
    /// Multiple linear regression.
    Regression,
    /// Analysis of variance.
    Anova,
    /// Two-group mean comparison.
    Ttest,
    /// Bivariate correlations.
    Correlation,
    /// Indirect-effect (mediation) analysis.
    Mediation,
    /// Interaction (moderation) analysis.
    Moderation,
}

/// Static facts about one analysis type.
#[derive(Debug)]
pub struct AnalysisProfile {
    /// Human-readable name.
    pub label: &'static str,
    /// Minimum number of rows before type-specific adjustments.
    pub min_sample: usize,
    /// Compute engine operation name.
    pub operation: &'static str,
    /// Typical wall-clock duration, used for progress estimates.
    pub expected_secs: u64,
    /// Roles that must be assigned.
    pub required_roles: &'static [VariableRole],
    /// Minimum number of analysis variables.
    pub min_variables: usize,
    /// Univariate normality of outcome variables matters.
    pub checks_normality: bool,
    /// Equal error variance across predictor levels matters.
    pub checks_homoscedasticity: bool,
    /// Independence of observations matters.
    pub checks_independence: bool,
    /// Factor-analytic prerequisites (KMO, sphericity) apply.
    pub checks_factorability: bool,
    /// SEM prerequisites (multivariate normality, parameter ratio) apply.
    pub checks_sem: bool,
}

const DV_IV: &[VariableRole] = &[VariableRole::Dependent, VariableRole::Independent];

static DESCRIPTIVE: AnalysisProfile = AnalysisProfile {
    label: "Descriptive Statistics",
    min_sample: 30,
    operation: "descriptive_statistics",
    expected_secs: 5,
    required_roles: &[],
    min_variables: 1,
    checks_normality: false,
    checks_homoscedasticity: false,
    checks_independence: false,
    checks_factorability: false,
    checks_sem: false,
};

static RELIABILITY: AnalysisProfile = AnalysisProfile {
    label: "Reliability Analysis",
    min_sample: 100,
    operation: "reliability_analysis",
    expected_secs: 10,
    required_roles: &[],
    min_variables: 2,
    checks_normality: false,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static EFA: AnalysisProfile = AnalysisProfile {
    label: "Exploratory Factor Analysis",
    min_sample: 100,
    operation: "exploratory_factor_analysis",
    expected_secs: 30,
    required_roles: &[],
    min_variables: 3,
    checks_normality: false,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: true,
    checks_sem: false,
};

static CFA: AnalysisProfile = AnalysisProfile {
    label: "Confirmatory Factor Analysis",
    min_sample: 200,
    operation: "confirmatory_factor_analysis",
    expected_secs: 60,
    required_roles: &[],
    min_variables: 3,
    checks_normality: false,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: true,
    checks_sem: false,
};

static SEM: AnalysisProfile = AnalysisProfile {
    label: "Structural Equation Modeling",
    min_sample: 200,
    operation: "structural_equation_model",
    expected_secs: 120,
    required_roles: DV_IV,
    min_variables: 2,
    checks_normality: false,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: true,
};

static REGRESSION: AnalysisProfile = AnalysisProfile {
    label: "Multiple Regression",
    min_sample: 50,
    operation: "linear_regression",
    expected_secs: 10,
    required_roles: DV_IV,
    min_variables: 2,
    checks_normality: true,
    checks_homoscedasticity: true,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static ANOVA: AnalysisProfile = AnalysisProfile {
    label: "Analysis of Variance",
    min_sample: 30,
    operation: "anova",
    expected_secs: 10,
    required_roles: DV_IV,
    min_variables: 2,
    checks_normality: true,
    checks_homoscedasticity: true,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static TTEST: AnalysisProfile = AnalysisProfile {
    label: "Independent Samples t-test",
    min_sample: 30,
    operation: "t_test",
    expected_secs: 5,
    required_roles: DV_IV,
    min_variables: 2,
    checks_normality: true,
    checks_homoscedasticity: true,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static CORRELATION: AnalysisProfile = AnalysisProfile {
    label: "Correlation Analysis",
    min_sample: 30,
    operation: "correlation_analysis",
    expected_secs: 5,
    required_roles: &[],
    min_variables: 2,
    checks_normality: true,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static MEDIATION: AnalysisProfile = AnalysisProfile {
    label: "Mediation Analysis",
    min_sample: 200,
    operation: "mediation_analysis",
    expected_secs: 60,
    required_roles: &[
        VariableRole::Independent,
        VariableRole::Mediator,
        VariableRole::Dependent,
    ],
    min_variables: 3,
    checks_normality: true,
    checks_homoscedasticity: false,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

static MODERATION: AnalysisProfile = AnalysisProfile {
    label: "Moderation Analysis",
    min_sample: 200,
    operation: "moderation_analysis",
    expected_secs: 30,
    required_roles: &[
        VariableRole::Independent,
        VariableRole::Moderator,
        VariableRole::Dependent,
    ],
    min_variables: 3,
    checks_normality: true,
    checks_homoscedasticity: true,
    checks_independence: true,
    checks_factorability: false,
    checks_sem: false,
};

impl AnalysisType {
    /// Every supported type.
    pub const ALL: [AnalysisType; 11] = [
        AnalysisType::Descriptive,
        AnalysisType::Reliability,
        AnalysisType::Efa,
        AnalysisType::Cfa,
        AnalysisType::Sem,
        AnalysisType::Regression,
        AnalysisType::Anova,
        AnalysisType::Ttest,
        AnalysisType::Correlation,
        AnalysisType::Mediation,
        AnalysisType::Moderation,
    ];

    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Descriptive => "descriptive",
            AnalysisType::Reliability => "reliability",
            AnalysisType::Efa => "efa",
            AnalysisType::Cfa => "cfa",
            AnalysisType::Sem => "sem",
            AnalysisType::Regression => "regression",
            AnalysisType::Anova => "anova",
            AnalysisType::Ttest => "ttest",
            AnalysisType::Correlation => "correlation",
            AnalysisType::Mediation => "mediation",
            AnalysisType::Moderation => "moderation",
        }
    }

    /// Reference data for this type.
    pub fn profile(&self) -> &'static AnalysisProfile {
        match self {
            AnalysisType::Descriptive => &DESCRIPTIVE,
            AnalysisType::Reliability => &RELIABILITY,
            AnalysisType::Efa => &EFA,
            AnalysisType::Cfa => &CFA,
            AnalysisType::Sem => &SEM,
            AnalysisType::Regression => &REGRESSION,
            AnalysisType::Anova => &ANOVA,
            AnalysisType::Ttest => &TTEST,
            AnalysisType::Correlation => &CORRELATION,
            AnalysisType::Mediation => &MEDIATION,
            AnalysisType::Moderation => &MODERATION,
        }
    }

    /// Whether this is a factor-analytic type.
    pub fn is_factor_analytic(&self) -> bool {
        matches!(self, AnalysisType::Efa | AnalysisType::Cfa)
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "descriptive" | "descriptives" => Ok(AnalysisType::Descriptive),
            "reliability" => Ok(AnalysisType::Reliability),
            "efa" | "exploratory_factor_analysis" => Ok(AnalysisType::Efa),
            "cfa" | "confirmatory_factor_analysis" => Ok(AnalysisType::Cfa),
            "sem" | "structural_equation_modeling" => Ok(AnalysisType::Sem),
            "regression" => Ok(AnalysisType::Regression),
            "anova" => Ok(AnalysisType::Anova),
            "ttest" | "t_test" => Ok(AnalysisType::Ttest),
            "correlation" => Ok(AnalysisType::Correlation),
            "mediation" => Ok(AnalysisType::Mediation),
            "moderation" => Ok(AnalysisType::Moderation),
            _ => Err(ConfigurationError::UnsupportedAnalysisType {
                name: s.to_string(),
            }),
        }
    }
}

/// Study-level context supplied by project management.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchContext {
    /// Planned or reported sample size; defaults to the dataset row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    /// Name of the guiding theoretical framework.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theoretical_framework: Option<String>,
    /// Declared hypotheses, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hypotheses: Vec<String>,
    /// Research questions, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub research_questions: Vec<String>,
    /// Academic discipline (e.g. "marketing").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
}

/// One analysis request. Built once per request and not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfiguration {
    /// Owning project.
    pub project_id: String,
    /// Requested procedure.
    pub analysis_type: AnalysisType,
    /// Display name.
    pub analysis_name: String,
    /// Data to analyse.
    pub dataset: Dataset,
    /// Variable role assignments.
    #[serde(default)]
    pub variables: VariableRoleMap,
    /// Free-form options passed through to the compute engine.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Study context used by interpretation.
    #[serde(default)]
    pub research_context: ResearchContext,
}

impl AnalysisConfiguration {
    /// Create a configuration with no roles, parameters or context.
    pub fn new(
        project_id: impl Into<String>,
        analysis_type: AnalysisType,
        analysis_name: impl Into<String>,
        dataset: Dataset,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            analysis_type,
            analysis_name: analysis_name.into(),
            dataset,
            variables: VariableRoleMap::default(),
            parameters: Map::new(),
            research_context: ResearchContext::default(),
        }
    }

    /// Set the variable role map
    pub fn with_variables(mut self, variables: VariableRoleMap) -> Self {
        self.variables = variables;
        self
    }

    /// Add one engine parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the research context
    pub fn with_research_context(mut self, context: ResearchContext) -> Self {
        self.research_context = context;
        self
    }

    /// Dataset columns used by the analysis.
    pub fn analysis_variables(&self) -> Vec<String> {
        self.variables.resolve_columns(&self.dataset)
    }

    /// Sample size for narrative purposes.
    pub fn sample_size(&self) -> usize {
        self.research_context
            .sample_size
            .unwrap_or_else(|| self.dataset.n_rows())
    }

    /// Roles plus the optional `parameter_count` engine parameter.
    pub fn validation_context(&self) -> ValidationContext {
        let context = ValidationContext::new(self.variables.clone());
        match self.parameters.get("parameter_count").and_then(Value::as_u64) {
            Some(count) => context.with_parameter_count(count as usize),
            None => context,
        }
    }

    /// Pre-flight check of the role assignment.
    ///
    /// Fails when a mandatory role is missing, when a role names something
    /// that is neither a column nor a defined construct, or when too few
    /// variables are available for the procedure.
    pub fn check_roles(&self) -> Result<(), ConfigurationError> {
        let profile = self.analysis_type.profile();

        let missing: Vec<String> = profile
            .required_roles
            .iter()
            .filter(|r| !self.variables.has(**r))
            .map(|r| r.as_str().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingRoles {
                analysis_type: self.analysis_type.to_string(),
                roles: missing,
            });
        }

        let unknown: Vec<String> = self
            .variables
            .all_variables()
            .into_iter()
            .filter(|v| !self.dataset.has_column(v) && !self.variables.construct_items.contains_key(v))
            .collect();
        let unknown_items: Vec<String> = self
            .variables
            .construct_items
            .values()
            .flatten()
            .filter(|v| !self.dataset.has_column(v))
            .cloned()
            .collect();
        let mut unknown = unknown;
        for item in unknown_items {
            if !unknown.contains(&item) {
                unknown.push(item);
            }
        }
        if !unknown.is_empty() {
            return Err(ConfigurationError::UnknownVariables {
                analysis_type: self.analysis_type.to_string(),
                variables: unknown,
            });
        }

        let found = if self.analysis_type.is_factor_analytic() && self.variables.has(VariableRole::Constructs) {
            self.variables.get(VariableRole::Constructs).len()
        } else {
            self.analysis_variables().len()
        };
        if found < profile.min_variables {
            return Err(ConfigurationError::InsufficientVariables {
                analysis_type: self.analysis_type.to_string(),
                found,
                required: profile.min_variables,
            });
        }

        Ok(())
    }
}
