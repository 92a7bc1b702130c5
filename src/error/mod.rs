use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid analysis configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Compute engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Record {record_id} cannot be changed while {status}")]
    InvalidTransition { record_id: String, status: String },

    #[error("Analysis record not found: {record_id}")]
    RecordNotFound { record_id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Problems with an analysis request detected before any remote call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{analysis_type} requires variable roles: {}", roles.join(", "))]
    MissingRoles {
        analysis_type: String,
        roles: Vec<String>,
    },

    #[error("Unsupported analysis type: {name}")]
    UnsupportedAnalysisType { name: String },

    #[error("{analysis_type} requires at least {required} variables, found {found}")]
    InsufficientVariables {
        analysis_type: String,
        found: usize,
        required: usize,
    },

    #[error("Unknown variables for {analysis_type}: {}", variables.join(", "))]
    UnknownVariables {
        analysis_type: String,
        variables: Vec<String>,
    },

    #[error("Invalid dataset: {message}")]
    InvalidDataset { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed for {field}: {message}")]
    Serialization { field: String, message: String },

    #[error("Record not found: {record_id}")]
    RecordNotFound { record_id: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Compute engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for compute engine operations
pub type EngineResult<T> = Result<T, EngineError>;
