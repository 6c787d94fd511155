//! Types for the submission orchestrator.

use thiserror::Error;

use crate::context::ContextError;
use crate::transport::TransportError;

/// Why one submission task produced no response.
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// The context was done before the task started.
    #[error("task not started: {0}")]
    Cancelled(#[from] ContextError),

    #[error("primary submission failed: {0}")]
    Primary(TransportError),

    #[error("auxiliary upload failed: {0}")]
    Auxiliary(TransportError),

    /// The task panicked or was aborted by the runtime.
    #[error("submission task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of one auxiliary endpoint.
#[derive(Debug, Clone)]
pub struct AuxiliaryResult {
    /// Endpoint path as configured.
    pub endpoint: String,
    pub outcome: Result<Vec<u8>, SubmissionError>,
}

impl AuxiliaryResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Aggregate outcome of one reading submission.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub primary: Result<Vec<u8>, SubmissionError>,
    /// One entry per configured auxiliary endpoint, in configuration order.
    pub auxiliary: Vec<AuxiliaryResult>,
}

impl SubmissionResult {
    pub fn primary_succeeded(&self) -> bool {
        self.primary.is_ok()
    }

    /// Primary and every auxiliary upload succeeded.
    pub fn is_complete_success(&self) -> bool {
        self.primary.is_ok() && self.auxiliary.iter().all(AuxiliaryResult::is_success)
    }

    /// Successful submissions out of `total()`.
    pub fn succeeded_count(&self) -> usize {
        usize::from(self.primary.is_ok())
            + self.auxiliary.iter().filter(|r| r.is_success()).count()
    }

    pub fn total(&self) -> usize {
        1 + self.auxiliary.len()
    }

    pub fn failed_endpoints(&self) -> Vec<&str> {
        self.auxiliary
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.endpoint.as_str())
            .collect()
    }
}
