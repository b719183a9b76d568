//! Loan application processing workflow.
//!
//! Four deterministic scoring stages run in a fixed order over one mutable
//! [`ProcessingState`]: credit scoring, loan decision, verification, and risk
//! monitoring. Each stage records a [`StageResult`] and may publish aggregate
//! fields that later stages and the finalizer read back. A stage failure is
//! captured locally and never blocks the stages behind it.

pub mod domain;
pub mod intake;
pub mod pipeline;
pub mod repository;
pub mod rules;
pub mod stages;
pub mod state;

pub use domain::{
    ApplicantId, ApplicationId, ApplicationInput, CreditTier, EmploymentStatus, LoanDecision,
    RepaymentHistory, RiskLevel, VerificationStatus, WorkflowStatus,
};
pub use intake::{IntakeError, IntakeRecord, LoanIntakeImporter};
pub use pipeline::{LoanPipeline, PipelineError};
pub use repository::{
    InMemoryRepository, ProcessingRecord, ProcessingRepository, ProcessingStatusView,
    RepositoryError,
};
pub use rules::PipelineRules;
pub use stages::{
    CreditAssessment, CreditBreakdown, CreditScoringStage, DecisionOutcome, LoanDecisionStage,
    LoanStage, RiskAssessment, RiskMonitoringStage, StageError, VerificationReport,
    VerificationStage,
};
pub use state::{
    PipelineStage, ProcessingState, StageOutput, StageResult, StageStatus, StateSnapshot,
};
