//! # Analysis Pipeline
//!
//! Statistical-analysis pipeline that checks a dataset against the
//! prerequisites of a requested procedure, delegates the numeric work to a
//! remote compute engine, and turns the raw output into graded,
//! human-readable interpretation and recommendations.
//!
//! ## Features
//!
//! - **Validation**: sample size, missing data, outliers, and assumption checks
//!   (normality, homoscedasticity, independence, factorability, SEM prerequisites)
//! - **Orchestration**: persisted record lifecycle with timeout, cancellation and
//!   progress estimates
//! - **Interpretation**: statistical, practical, methodological, limitation and
//!   academic readings of each result
//! - **Recommendations**: bounded, de-duplicated advice merged from validation and results
//!
//! ## Architecture
//!
//! ```text
//! Dataset + request → ValidationEngine → AnalysisOrchestrator → Compute engine (HTTP)
//!                                              ↓
//!                          InterpretationEngine + RecommendationGenerator
//!                                              ↓
//!                                       SQLite (records)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use analysis_pipeline::{Config, AnalysisOrchestrator};
//! use analysis_pipeline::engine::HttpComputeEngine;
//! use analysis_pipeline::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let engine = HttpComputeEngine::new(&config.engine, config.request.clone())?;
//!     let orchestrator = AnalysisOrchestrator::new(Arc::new(engine), storage, &config.request);
//!     let record = orchestrator.run(load_request()?).await?;
//!     println!("{}", record.status);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Analysis types, request configuration and the lifecycle orchestrator.
pub mod analysis;
/// Command-line interface commands.
pub mod cli;
/// Configuration management loaded from the environment.
pub mod config;
/// Typed tabular datasets and variable roles.
pub mod dataset;
/// Compute engine contract and HTTP client.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Interpretation of compute engine output.
pub mod interpretation;
/// Recommendation list generation.
pub mod recommendations;
/// Numeric routines used by the validation checks.
pub mod stats;
/// SQLite storage layer for analysis records.
pub mod storage;
/// Prerequisite checks run before execution.
pub mod validation;

pub use analysis::{AnalysisConfiguration, AnalysisOrchestrator, AnalysisType, ResearchContext};
pub use config::Config;
pub use error::{AppError, AppResult};
