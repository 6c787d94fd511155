//! Submission orchestrator.
//!
//! One reading fans out into concurrent tokio tasks:
//! - **Primary**: the meter reading report
//! - **Auxiliary**: one photo upload per configured endpoint, each in its own task
//!
//! Every task fails on its own; the aggregate result always carries one
//! outcome for the primary and one per auxiliary endpoint, in configuration
//! order.

mod runner;
mod types;

pub use runner::SubmissionOrchestrator;
pub use types::{AuxiliaryResult, SubmissionError, SubmissionResult};
