use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{AnalysisRecord, AnalysisStatus, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// In-memory database on a single connection, for tests and dry runs
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_json<T: Serialize>(field: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn to_json_opt<T: Serialize>(field: &str, value: Option<&T>) -> StorageResult<Option<String>> {
    value.map(|v| to_json(field, v)).transpose()
}

fn from_json<T: DeserializeOwned>(field: &str, raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn from_json_opt<T: DeserializeOwned>(field: &str, raw: Option<String>) -> StorageResult<Option<T>> {
    raw.map(|r| from_json(field, &r)).transpose()
}

fn parse_time(field: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization {
            field: field.to_string(),
            message: e.to_string(),
        })
}

/// Column values of a record, serialized once per write.
struct RecordColumns {
    analysis_type: String,
    analysis_name: String,
    configuration: String,
    validation: Option<String>,
    execution_result: Option<String>,
    interpretation: Option<String>,
    recommendations: String,
    recommendations_text: String,
}

impl RecordColumns {
    fn from_record(record: &AnalysisRecord) -> StorageResult<Self> {
        Ok(Self {
            analysis_type: record.configuration.analysis_type.to_string(),
            analysis_name: record.configuration.analysis_name.clone(),
            configuration: to_json("configuration", &record.configuration)?,
            validation: to_json_opt("validation", record.validation.as_ref())?,
            execution_result: to_json_opt("execution_result", record.execution_result.as_ref())?,
            interpretation: to_json_opt("interpretation", record.interpretation.as_ref())?,
            recommendations: to_json("recommendations", &record.recommendations)?,
            recommendations_text: record.recommendations_text(),
        })
    }
}

const UPDATE_SQL: &str = r#"
    UPDATE analysis_records
    SET status = ?, validation = ?, execution_result = ?, interpretation = ?,
        recommendations = ?, recommendations_text = ?, error_message = ?,
        updated_at = ?, started_at = ?, completed_at = ?, execution_time_ms = ?
    WHERE id = ?
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT id, project_id, status, configuration, validation, execution_result,
           interpretation, recommendations, error_message, created_at, updated_at,
           started_at, completed_at, execution_time_ms
    FROM analysis_records
"#;

impl SqliteStorage {
    async fn write_update(
        &self,
        record: &AnalysisRecord,
        expected: Option<AnalysisStatus>,
    ) -> StorageResult<u64> {
        let cols = RecordColumns::from_record(record)?;
        let sql = match expected {
            Some(_) => format!("{} AND status = ?", UPDATE_SQL.trim_end()),
            None => UPDATE_SQL.to_string(),
        };

        let mut query = sqlx::query(&sql)
            .bind(record.status.as_str())
            .bind(&cols.validation)
            .bind(&cols.execution_result)
            .bind(&cols.interpretation)
            .bind(&cols.recommendations)
            .bind(&cols.recommendations_text)
            .bind(&record.error_message)
            .bind(record.updated_at.to_rfc3339())
            .bind(record.started_at.map(|t| t.to_rfc3339()))
            .bind(record.completed_at.map(|t| t.to_rfc3339()))
            .bind(record.execution_time_ms)
            .bind(&record.id);
        if let Some(status) = expected {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_record(&self, record: &AnalysisRecord) -> StorageResult<()> {
        let cols = RecordColumns::from_record(record)?;

        sqlx::query(
            r#"
            INSERT INTO analysis_records (
                id, project_id, analysis_type, analysis_name, status, configuration,
                validation, execution_result, interpretation, recommendations,
                recommendations_text, error_message, created_at, updated_at,
                started_at, completed_at, execution_time_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(&cols.analysis_type)
        .bind(&cols.analysis_name)
        .bind(record.status.as_str())
        .bind(&cols.configuration)
        .bind(&cols.validation)
        .bind(&cols.execution_result)
        .bind(&cols.interpretation)
        .bind(&cols.recommendations)
        .bind(&cols.recommendations_text)
        .bind(&record.error_message)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .bind(record.started_at.map(|t| t.to_rfc3339()))
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .bind(record.execution_time_ms)
        .execute(&self.pool)
        .await?;

        debug!(record_id = %record.id, status = %record.status, "Analysis record created");
        Ok(())
    }

    async fn get_record(&self, id: &str) -> StorageResult<Option<AnalysisRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn update_record(&self, record: &AnalysisRecord) -> StorageResult<()> {
        if self.write_update(record, None).await? == 0 {
            return Err(StorageError::RecordNotFound {
                record_id: record.id.clone(),
            });
        }
        Ok(())
    }

    async fn transition_record(
        &self,
        record: &AnalysisRecord,
        expected: AnalysisStatus,
    ) -> StorageResult<bool> {
        let applied = self.write_update(record, Some(expected)).await? == 1;
        debug!(
            record_id = %record.id,
            from = %expected,
            to = %record.status,
            applied,
            "Analysis record transition"
        );
        Ok(applied)
    }

    async fn list_project_records(&self, project_id: &str) -> StorageResult<Vec<AnalysisRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "{} WHERE project_id = ? ORDER BY created_at DESC, id",
            SELECT_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn delete_record(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM analysis_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    project_id: String,
    status: String,
    configuration: String,
    validation: Option<String>,
    execution_result: Option<String>,
    interpretation: Option<String>,
    recommendations: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    execution_time_ms: Option<i64>,
}

impl TryFrom<RecordRow> for AnalysisRecord {
    type Error = StorageError;

    fn try_from(row: RecordRow) -> StorageResult<Self> {
        let status = AnalysisStatus::from_str(&row.status).map_err(|message| {
            StorageError::Serialization {
                field: "status".to_string(),
                message,
            }
        })?;

        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            configuration: from_json("configuration", &row.configuration)?,
            status,
            validation: from_json_opt("validation", row.validation)?,
            execution_result: from_json_opt("execution_result", row.execution_result)?,
            interpretation: from_json_opt("interpretation", row.interpretation)?,
            recommendations: from_json_opt("recommendations", row.recommendations)?.unwrap_or_default(),
            error_message: row.error_message,
            created_at: parse_time("created_at", &row.created_at)?,
            updated_at: parse_time("updated_at", &row.updated_at)?,
            started_at: row.started_at.map(|t| parse_time("started_at", &t)).transpose()?,
            completed_at: row.completed_at.map(|t| parse_time("completed_at", &t)).transpose()?,
            execution_time_ms: row.execution_time_ms,
        })
    }
}
