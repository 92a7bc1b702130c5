use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ColumnKind, Dataset};

/// Role a column plays in an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    Dependent,
    Independent,
    Mediator,
    Moderator,
    Control,
    Constructs,
}

impl VariableRole {
    /// All roles in canonical order.
    pub const ALL: [VariableRole; 6] = [
        VariableRole::Dependent,
        VariableRole::Independent,
        VariableRole::Mediator,
        VariableRole::Moderator,
        VariableRole::Control,
        VariableRole::Constructs,
    ];

    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableRole::Dependent => "dependent",
            VariableRole::Independent => "independent",
            VariableRole::Mediator => "mediator",
            VariableRole::Moderator => "moderator",
            VariableRole::Control => "control",
            VariableRole::Constructs => "constructs",
        }
    }
}

impl std::fmt::Display for VariableRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mapping from role to the columns assigned to it.
///
/// `construct_items` optionally groups the `constructs` columns by latent
/// construct (construct name → indicator items); it drives CFA/SEM model
/// syntax. When it is empty, all `constructs` columns load on one factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableRoleMap {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub independent: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mediator: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moderator: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub construct_items: BTreeMap<String, Vec<String>>,
}

impl VariableRoleMap {
    /// Create an empty role map
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign columns to a role, replacing any previous assignment.
    pub fn with_role<I, S>(mut self, role: VariableRole, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.slot_mut(role) = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Define a latent construct and its indicator items.
    ///
    /// Items are also appended to the `constructs` role.
    pub fn with_construct<I, S>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        for item in &items {
            if !self.constructs.contains(item) {
                self.constructs.push(item.clone());
            }
        }
        self.construct_items.insert(name.into(), items);
        self
    }

    /// Columns assigned to a role.
    pub fn get(&self, role: VariableRole) -> &[String] {
        match role {
            VariableRole::Dependent => &self.dependent,
            VariableRole::Independent => &self.independent,
            VariableRole::Mediator => &self.mediator,
            VariableRole::Moderator => &self.moderator,
            VariableRole::Control => &self.control,
            VariableRole::Constructs => &self.constructs,
        }
    }

    fn slot_mut(&mut self, role: VariableRole) -> &mut Vec<String> {
        match role {
            VariableRole::Dependent => &mut self.dependent,
            VariableRole::Independent => &mut self.independent,
            VariableRole::Mediator => &mut self.mediator,
            VariableRole::Moderator => &mut self.moderator,
            VariableRole::Control => &mut self.control,
            VariableRole::Constructs => &mut self.constructs,
        }
    }

    /// Whether at least one column is assigned to the role.
    pub fn has(&self, role: VariableRole) -> bool {
        !self.get(role).is_empty()
    }

    /// Whether no role has any column.
    pub fn is_empty(&self) -> bool {
        VariableRole::ALL.iter().all(|r| !self.has(*r))
    }

    /// Every assigned column once, in role order then assignment order.
    pub fn all_variables(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for role in VariableRole::ALL {
            for column in self.get(role) {
                if !out.contains(column) {
                    out.push(column.clone());
                }
            }
        }
        out
    }

    /// Dataset columns the analysis touches.
    ///
    /// Construct names used in structural roles expand to their items; names
    /// that are not dataset columns are dropped. With no usable assignment,
    /// every numeric column is an analysis variable.
    pub fn resolve_columns(&self, dataset: &Dataset) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.all_variables() {
            let expanded = match self.construct_items.get(&name) {
                Some(items) => items.clone(),
                None => vec![name],
            };
            for column in expanded {
                if dataset.has_column(&column) && !out.contains(&column) {
                    out.push(column);
                }
            }
        }
        if out.is_empty() {
            dataset.numeric_columns()
        } else {
            out
        }
    }

    /// Numeric subset of [`Self::resolve_columns`].
    pub fn resolve_numeric_columns(&self, dataset: &Dataset) -> Vec<String> {
        self.resolve_columns(dataset)
            .into_iter()
            .filter(|c| dataset.kind(c) == Some(ColumnKind::Numeric))
            .collect()
    }

    /// Role → columns for the roles that are set, for engine requests.
    pub fn as_map(&self) -> BTreeMap<String, Vec<String>> {
        VariableRole::ALL
            .iter()
            .filter(|r| self.has(**r))
            .map(|r| (r.as_str().to_string(), self.get(*r).to_vec()))
            .collect()
    }
}
