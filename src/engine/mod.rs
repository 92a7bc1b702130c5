//! Compute engine contract and its HTTP implementation.
//!
//! The numeric procedures run remotely. The pipeline talks to them only
//! through [`ComputeEngine`], so tests and alternative transports can stand
//! in for [`HttpComputeEngine`].

mod client;
mod types;

pub use client::HttpComputeEngine;
pub use types::{
    AnalysisExecutionResult, EngineRequest, EngineResponse, MediationSpec, SUCCESS_STATUS,
};

use async_trait::async_trait;

use crate::error::EngineResult;

/// Executes named statistical procedures.
#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Run one operation and return its raw output.
    async fn execute(&self, request: EngineRequest) -> EngineResult<AnalysisExecutionResult>;

    /// Ask the engine to stop work for an execution. Best effort.
    async fn abort(&self, execution_id: &str) -> EngineResult<()>;
}
