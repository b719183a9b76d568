use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::domain::{
    ApplicantId, ApplicationId, ApplicationInput, LoanDecision, RiskLevel, WorkflowStatus,
};
use super::stages::{CreditAssessment, DecisionOutcome, RiskAssessment, VerificationReport};

/// The four pipeline stages in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    CreditScoring,
    LoanDecision,
    Verification,
    RiskMonitoring,
}

impl PipelineStage {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::CreditScoring,
            Self::LoanDecision,
            Self::Verification,
            Self::RiskMonitoring,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CreditScoring => "credit_scoring",
            Self::LoanDecision => "loan_decision",
            Self::Verification => "verification",
            Self::RiskMonitoring => "risk_monitoring",
        }
    }
}

/// Outcome classification for a single stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Failed,
    Timeout,
}

impl StageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
            StageStatus::Timeout => "timeout",
        }
    }
}

/// Typed payload produced by a successful stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    CreditScoring(CreditAssessment),
    LoanDecision(DecisionOutcome),
    Verification(VerificationReport),
    RiskMonitoring(RiskAssessment),
}

/// Record of one stage invocation. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub output: Option<StageOutput>,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

impl StageResult {
    pub fn success(stage: PipelineStage, output: StageOutput, elapsed: Duration) -> Self {
        Self {
            stage,
            status: StageStatus::Success,
            output: Some(output),
            error: None,
            elapsed,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(stage: PipelineStage, error: String, elapsed: Duration) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            output: None,
            error: Some(error),
            elapsed,
            completed_at: Utc::now(),
        }
    }

    pub fn timed_out(stage: PipelineStage, budget: Duration) -> Self {
        Self {
            stage,
            status: StageStatus::Timeout,
            output: None,
            error: Some(format!(
                "stage exceeded its {:.1}s budget",
                budget.as_secs_f64()
            )),
            elapsed: budget,
            completed_at: Utc::now(),
        }
    }
}

/// Read-only view of the state a stage is allowed to consume: the immutable
/// application input plus the aggregates published by earlier stages.
///
/// Owned and cheap to clone so stage execution can be moved onto the blocking
/// pool without borrowing the live state.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub application_id: ApplicationId,
    pub input: ApplicationInput,
    pub calculated_credit_score: Option<u16>,
    pub final_decision: Option<LoanDecision>,
}

impl StateSnapshot {
    /// The single place the "score unset" default lives. A failed scoring
    /// stage leaves the published score empty and downstream stages treat
    /// the applicant as unscored, which bottoms out every score band.
    pub fn credit_score_or_default(&self) -> u16 {
        self.calculated_credit_score.unwrap_or(0)
    }
}

/// Central mutable record threaded through the pipeline.
///
/// Created `Pending`, moved to `InProgress` when the first stage starts, and
/// finalized exactly once into `Completed` or `Failed`. After finalization
/// the record is handed off read-only to the storage collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingState {
    pub application_id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub application_data: ApplicationInput,

    // Per-stage result slots, one per pipeline stage.
    pub credit_scoring_result: Option<StageResult>,
    pub loan_decision_result: Option<StageResult>,
    pub verification_result: Option<StageResult>,
    pub risk_monitoring_result: Option<StageResult>,

    // Aggregates published by stages for downstream consumption.
    pub calculated_credit_score: Option<u16>,
    pub final_decision: Option<LoanDecision>,
    pub risk_level: Option<RiskLevel>,
    pub approved_amount: Option<f64>,
    pub interest_rate: Option<f64>,
    pub rejection_reasons: Option<Vec<String>>,

    // Workflow metadata.
    pub workflow_status: WorkflowStatus,
    pub current_step: String,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_processing_time: Option<Duration>,
}

impl ProcessingState {
    pub fn new(
        application_id: ApplicationId,
        applicant_id: ApplicantId,
        application_data: ApplicationInput,
    ) -> Self {
        Self {
            application_id,
            applicant_id,
            application_data,
            credit_scoring_result: None,
            loan_decision_result: None,
            verification_result: None,
            risk_monitoring_result: None,
            calculated_credit_score: None,
            final_decision: None,
            risk_level: None,
            approved_amount: None,
            interest_rate: None,
            rejection_reasons: None,
            workflow_status: WorkflowStatus::Pending,
            current_step: "initialized".to_string(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            total_processing_time: None,
        }
    }

    /// Transition `Pending` -> `InProgress` at pipeline start.
    pub fn begin(&mut self) {
        if self.workflow_status == WorkflowStatus::Pending {
            self.workflow_status = WorkflowStatus::InProgress;
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            application_id: self.application_id.clone(),
            input: self.application_data.clone(),
            calculated_credit_score: self.calculated_credit_score,
            final_decision: self.final_decision,
        }
    }

    /// Store a stage result in its slot, publish its aggregates, and append
    /// any stage error to the workflow error list.
    pub fn record(&mut self, result: StageResult) {
        self.current_step = result.stage.label().to_string();

        if let Some(error) = &result.error {
            self.errors
                .push(format!("{}: {}", result.stage.label(), error));
        }

        if let Some(output) = &result.output {
            self.publish(output);
        }

        let slot = match result.stage {
            PipelineStage::CreditScoring => &mut self.credit_scoring_result,
            PipelineStage::LoanDecision => &mut self.loan_decision_result,
            PipelineStage::Verification => &mut self.verification_result,
            PipelineStage::RiskMonitoring => &mut self.risk_monitoring_result,
        };
        *slot = Some(result);
    }

    fn publish(&mut self, output: &StageOutput) {
        match output {
            StageOutput::CreditScoring(assessment) => {
                self.calculated_credit_score = Some(assessment.calculated_credit_score);
            }
            StageOutput::LoanDecision(outcome) => {
                self.final_decision = Some(outcome.final_decision);
                self.approved_amount = Some(outcome.approved_amount);
                self.interest_rate = outcome.interest_rate;
                self.rejection_reasons = outcome.rejection_reasons.clone();
            }
            StageOutput::Verification(_) => {
                // Informational only; publishes nothing.
            }
            StageOutput::RiskMonitoring(assessment) => {
                self.risk_level = Some(assessment.risk_level);
            }
        }
    }

    /// Append an orchestrator-level error (not tied to a stage slot).
    pub fn push_error(&mut self, message: String) {
        self.errors.push(message);
    }

    /// Close the workflow: stamp the completion time, derive the terminal
    /// status from the error list, and compute the total wall-clock time.
    /// Idempotent; a second call is a no-op.
    pub fn finalize(&mut self) {
        if self.completed_at.is_some() {
            return;
        }

        let completed = Utc::now();
        self.completed_at = Some(completed);
        self.workflow_status = if self.errors.is_empty() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        self.total_processing_time = Some(
            (completed - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn stage_result(&self, stage: PipelineStage) -> Option<&StageResult> {
        match stage {
            PipelineStage::CreditScoring => self.credit_scoring_result.as_ref(),
            PipelineStage::LoanDecision => self.loan_decision_result.as_ref(),
            PipelineStage::Verification => self.verification_result.as_ref(),
            PipelineStage::RiskMonitoring => self.risk_monitoring_result.as_ref(),
        }
    }

    pub fn credit_assessment(&self) -> Option<&CreditAssessment> {
        match self.credit_scoring_result.as_ref()?.output.as_ref()? {
            StageOutput::CreditScoring(assessment) => Some(assessment),
            _ => None,
        }
    }

    pub fn decision_outcome(&self) -> Option<&DecisionOutcome> {
        match self.loan_decision_result.as_ref()?.output.as_ref()? {
            StageOutput::LoanDecision(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn verification_report(&self) -> Option<&VerificationReport> {
        match self.verification_result.as_ref()?.output.as_ref()? {
            StageOutput::Verification(report) => Some(report),
            _ => None,
        }
    }

    pub fn risk_assessment(&self) -> Option<&RiskAssessment> {
        match self.risk_monitoring_result.as_ref()?.output.as_ref()? {
            StageOutput::RiskMonitoring(assessment) => Some(assessment),
            _ => None,
        }
    }
}
