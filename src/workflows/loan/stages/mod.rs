//! The four scoring stages and the seam the orchestrator drives them through.

mod credit_scoring;
mod decision;
mod risk;
mod verification;

pub use credit_scoring::{CreditAssessment, CreditBreakdown, CreditScoringStage};
pub use decision::{DecisionOutcome, LoanDecisionStage};
pub use risk::{RiskAssessment, RiskMonitoringStage};
pub use verification::{VerificationReport, VerificationStage};

use super::rules::PipelineRules;
use super::state::{PipelineStage, StageOutput, StateSnapshot};

/// Error raised by a stage's computation.
///
/// A rejected loan is a business outcome, never an error; this type only
/// carries genuine computation failures, which the orchestrator records on
/// the stage result without aborting the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    Computation(String),
}

/// One pure computation step of the loan pipeline.
///
/// Implementations read the snapshot (input plus aggregates published by
/// earlier stages) and return a typed payload. They never touch the live
/// state; publishing is the orchestrator's job.
pub trait LoanStage: Send + Sync {
    fn stage(&self) -> PipelineStage;

    fn execute(
        &self,
        snapshot: &StateSnapshot,
        rules: &PipelineRules,
    ) -> Result<StageOutput, StageError>;
}
