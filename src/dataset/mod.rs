//! Tabular datasets handed to the pipeline by the ingestion collaborator.
//!
//! A [`Dataset`] is built once from a header row plus data rows and never
//! mutated afterwards. Each column is typed at construction time as numeric,
//! categorical or free text; the validation checks and the compute engine
//! request builder only ever read from it.

mod roles;

pub use roles::{VariableRole, VariableRoleMap};

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;

/// Text columns with at most this many distinct values are treated as categorical.
pub const CATEGORICAL_MAX_LEVELS: usize = 20;

/// Tokens (case-insensitive, trimmed) read as a missing cell.
const MISSING_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "."];

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// No value recorded.
    Missing,
    /// A finite numeric value.
    Number(f64),
    /// A non-numeric value (category label or free text).
    Text(String),
}

impl Cell {
    /// Whether the cell holds no value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric value, if the cell holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Stable textual form used for grouping and duplicate detection.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(v) => Some(format_number(*v)),
            Cell::Text(s) => Some(s.clone()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Missing => Value::Null,
            Cell::Number(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Column type assigned when the dataset is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Every non-missing value parses as a finite number.
    Numeric,
    /// Non-numeric with a small set of repeated levels.
    Categorical,
    /// Anything else, including columns with no values at all.
    Text,
}

/// An immutable, typed table with a header of unique column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetWire", into = "DatasetWire")]
pub struct Dataset {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    rows: Vec<Vec<Cell>>,
}

/// Wire form shared with the compute engine: `{columns, rows}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetWire {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset from raw rows where the first row is the header.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Result<Self, ConfigurationError> {
        let (header, body) = rows.split_first().ok_or_else(|| invalid("dataset has no header row"))?;
        let header: Vec<String> = header.iter().map(|h| h.as_ref().trim().to_string()).collect();
        let body: Vec<Vec<Option<String>>> = body
            .iter()
            .map(|row| row.iter().map(|c| parse_raw(c.as_ref())).collect())
            .collect();
        Self::build(header, body)
    }

    /// Build a dataset from a header and JSON-valued rows.
    pub fn from_json_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ConfigurationError> {
        let body = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| match v {
                        Value::Null => None,
                        Value::String(s) => parse_raw(&s),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .collect();
        Self::build(columns, body)
    }

    fn build(header: Vec<String>, body: Vec<Vec<Option<String>>>) -> Result<Self, ConfigurationError> {
        if header.is_empty() {
            return Err(invalid("header row is empty"));
        }
        let mut seen = HashSet::new();
        for name in &header {
            if name.is_empty() {
                return Err(invalid("header contains an empty column name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("duplicate column name '{}'", name)));
            }
        }
        for (i, row) in body.iter().enumerate() {
            if row.len() != header.len() {
                return Err(invalid(format!(
                    "row {} has {} values, expected {}",
                    i + 1,
                    row.len(),
                    header.len()
                )));
            }
        }

        let kinds: Vec<ColumnKind> = (0..header.len())
            .map(|col| classify(body.iter().map(|row| row[col].as_deref())))
            .collect();

        let rows = body
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&kinds)
                    .map(|(raw, kind)| match (raw, kind) {
                        (None, _) => Cell::Missing,
                        (Some(s), ColumnKind::Numeric) => s
                            .parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .map(Cell::Number)
                            .unwrap_or(Cell::Missing),
                        (Some(s), _) => Cell::Text(s),
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            columns: header,
            kinds,
            rows,
        })
    }

    /// Number of data rows (the header is not counted).
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Position of a column in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether the header contains `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Kind assigned to a column.
    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|i| self.kinds[i])
    }

    /// Names of all numeric columns in header order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == ColumnKind::Numeric)
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Cells of one column.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Non-missing values of a numeric column, in row order.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        if self.kinds[idx] != ColumnKind::Numeric {
            return None;
        }
        Some(self.rows.iter().filter_map(|row| row[idx].as_f64()).collect())
    }

    /// Number of distinct non-missing values in a column.
    pub fn distinct_count(&self, name: &str) -> usize {
        self.column(name)
            .map(|cells| {
                cells
                    .into_iter()
                    .filter_map(Cell::label)
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }

    /// Rows where every listed numeric column is present, projected onto those columns.
    pub fn complete_cases(&self, names: &[String]) -> Vec<Vec<f64>> {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        if indices.len() != names.len() {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter_map(|row| indices.iter().map(|&i| row[i].as_f64()).collect::<Option<Vec<_>>>())
            .collect()
    }

    /// Pairs of (x, y) where both numeric columns are present.
    pub fn paired_values(&self, x: &str, y: &str) -> Vec<(f64, f64)> {
        self.complete_cases(&[x.to_string(), y.to_string()])
            .into_iter()
            .map(|r| (r[0], r[1]))
            .collect()
    }

    /// Wire form sent to the compute engine.
    pub fn to_wire(&self) -> DatasetWire {
        DatasetWire {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(Cell::to_json).collect())
                .collect(),
        }
    }
}

impl TryFrom<DatasetWire> for Dataset {
    type Error = ConfigurationError;

    fn try_from(wire: DatasetWire) -> Result<Self, Self::Error> {
        Dataset::from_json_rows(wire.columns, wire.rows)
    }
}

impl From<Dataset> for DatasetWire {
    fn from(dataset: Dataset) -> Self {
        dataset.to_wire()
    }
}

fn invalid(message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidDataset {
        message: message.into(),
    }
}

fn parse_raw(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn classify<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ColumnKind {
    let present: Vec<&str> = values.flatten().collect();
    if present.is_empty() {
        return ColumnKind::Text;
    }
    if present
        .iter()
        .all(|v| v.parse::<f64>().map(f64::is_finite).unwrap_or(false))
    {
        return ColumnKind::Numeric;
    }
    let levels: BTreeSet<&str> = present.iter().copied().collect();
    if levels.len() <= CATEGORICAL_MAX_LEVELS && levels.len() < present.len() {
        ColumnKind::Categorical
    } else {
        ColumnKind::Text
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
