use std::sync::Arc;
use std::time::Instant;

use tokio::task::{self, JoinError};
use tokio::time;
use tracing::{info, warn};

use super::domain::{ApplicantId, ApplicationId, ApplicationInput};
use super::rules::PipelineRules;
use super::stages::{
    CreditScoringStage, LoanDecisionStage, LoanStage, RiskMonitoringStage, VerificationStage,
};
use super::state::{ProcessingState, StageResult};

/// Fault at the orchestration layer itself, as opposed to a failure inside a
/// stage's computation. Stage failures are recorded on the stage result and
/// never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage could not be joined: {source}")]
    Join {
        stage: &'static str,
        source: JoinError,
    },
    #[error("pipeline execution exceeded the {0:.1}s budget")]
    Budget(f64),
}

/// Sequences the four scoring stages over one [`ProcessingState`].
///
/// Stages run in a fixed linear order with no branching: a failed stage is
/// recorded and the remaining stages still run against whatever partial
/// state exists. The returned state is always finalized, so callers can
/// persist partial results instead of surfacing a hard error.
pub struct LoanPipeline {
    stages: Vec<Arc<dyn LoanStage>>,
    rules: PipelineRules,
}

impl LoanPipeline {
    pub fn new(rules: PipelineRules) -> Self {
        Self::with_stages(
            rules,
            vec![
                Arc::new(CreditScoringStage),
                Arc::new(LoanDecisionStage),
                Arc::new(VerificationStage),
                Arc::new(RiskMonitoringStage),
            ],
        )
    }

    /// Build a pipeline over a caller-supplied stage sequence. The stages run
    /// in the given order; production code uses [`LoanPipeline::new`].
    pub fn with_stages(rules: PipelineRules, stages: Vec<Arc<dyn LoanStage>>) -> Self {
        Self { stages, rules }
    }

    pub fn rules(&self) -> &PipelineRules {
        &self.rules
    }

    /// Run the full pipeline for one application and return the finalized
    /// state. Never fails: stage errors and orchestrator faults alike end up
    /// in the state's error list.
    pub async fn process(
        &self,
        application_id: ApplicationId,
        applicant_id: ApplicantId,
        input: ApplicationInput,
    ) -> ProcessingState {
        let mut state = ProcessingState::new(application_id, applicant_id, input);
        state.begin();
        info!(application_id = %state.application_id, "starting loan processing workflow");

        match self.rules.pipeline_timeout {
            Some(budget) => {
                if time::timeout(budget, self.run_stages(&mut state))
                    .await
                    .is_err()
                {
                    let error = PipelineError::Budget(budget.as_secs_f64());
                    warn!(application_id = %state.application_id, %error, "forcing finalization");
                    state.push_error(error.to_string());
                }
            }
            None => self.run_stages(&mut state).await,
        }

        state.finalize();
        info!(
            application_id = %state.application_id,
            status = state.workflow_status.label(),
            "loan processing workflow finalized"
        );
        state
    }

    async fn run_stages(&self, state: &mut ProcessingState) {
        for stage in &self.stages {
            match self.invoke(Arc::clone(stage), state).await {
                Ok(result) => {
                    info!(
                        application_id = %state.application_id,
                        stage = result.stage.label(),
                        status = result.status.label(),
                        "stage finished"
                    );
                    state.record(result);
                }
                Err(error) => {
                    // Orchestration fault, not a stage outcome: stop the
                    // sequence and let the caller finalize as failed.
                    warn!(application_id = %state.application_id, %error, "pipeline fault");
                    state.push_error(error.to_string());
                    return;
                }
            }
        }
    }

    /// Execute one stage on the blocking pool, capturing timing, panics, and
    /// the configured budget. A lapsed budget abandons the worker thread and
    /// records a timeout result; the abandoned computation can never write
    /// back into the state.
    async fn invoke(
        &self,
        stage: Arc<dyn LoanStage>,
        state: &ProcessingState,
    ) -> Result<StageResult, PipelineError> {
        let kind = stage.stage();
        let snapshot = state.snapshot();
        let rules = self.rules.clone();
        let started = Instant::now();

        let handle = task::spawn_blocking(move || stage.execute(&snapshot, &rules));

        let joined = match self.rules.stage_timeout {
            Some(budget) => match time::timeout(budget, handle).await {
                Ok(joined) => joined,
                Err(_) => return Ok(StageResult::timed_out(kind, budget)),
            },
            None => handle.await,
        };
        let elapsed = started.elapsed();

        match joined {
            Ok(Ok(output)) => Ok(StageResult::success(kind, output, elapsed)),
            Ok(Err(error)) => Ok(StageResult::failed(kind, error.to_string(), elapsed)),
            Err(join_error) if join_error.is_panic() => Ok(StageResult::failed(
                kind,
                panic_message(join_error),
                elapsed,
            )),
            Err(join_error) => Err(PipelineError::Join {
                stage: kind.label(),
                source: join_error,
            }),
        }
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "stage panicked".to_string()),
        Err(_) => "stage cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::domain::{
        EmploymentStatus, LoanDecision, RepaymentHistory, WorkflowStatus,
    };
    use crate::workflows::loan::stages::StageError;
    use crate::workflows::loan::state::{PipelineStage, StageOutput, StageStatus, StateSnapshot};
    use std::time::Duration;

    fn strong_input() -> ApplicationInput {
        ApplicationInput {
            full_name: "Asha Rao".to_string(),
            email: "asha.rao@example.com".to_string(),
            phone_number: "+91-98450-00123".to_string(),
            credit_history_length_months: 96,
            number_of_credit_accounts: 6,
            credit_utilization_percent: 15.0,
            recent_credit_inquiries_6m: 1,
            repayment_history: RepaymentHistory {
                on_time_payments: 90,
                late_payments: 1,
                defaults: 0,
                write_offs: 0,
            },
            employment_status: EmploymentStatus::Employed,
            employment_duration_months: 60,
            monthly_income: 9000.0,
            income_verified: true,
            loan_amount_requested: 40000.0,
            loan_purpose: "home".to_string(),
            loan_tenure_months: 60,
        }
    }

    fn ids() -> (ApplicationId, ApplicantId) {
        (
            ApplicationId("loan-000001".to_string()),
            ApplicantId("APP001".to_string()),
        )
    }

    struct FailingStage(PipelineStage);

    impl LoanStage for FailingStage {
        fn stage(&self) -> PipelineStage {
            self.0
        }

        fn execute(
            &self,
            _snapshot: &StateSnapshot,
            _rules: &PipelineRules,
        ) -> Result<StageOutput, StageError> {
            Err(StageError::Computation(
                "simulated verification outage".to_string(),
            ))
        }
    }

    struct PanickingStage(PipelineStage);

    impl LoanStage for PanickingStage {
        fn stage(&self) -> PipelineStage {
            self.0
        }

        fn execute(
            &self,
            _snapshot: &StateSnapshot,
            _rules: &PipelineRules,
        ) -> Result<StageOutput, StageError> {
            panic!("stage blew up");
        }
    }

    struct SlowStage(PipelineStage);

    impl LoanStage for SlowStage {
        fn stage(&self) -> PipelineStage {
            self.0
        }

        fn execute(
            &self,
            _snapshot: &StateSnapshot,
            _rules: &PipelineRules,
        ) -> Result<StageOutput, StageError> {
            std::thread::sleep(Duration::from_millis(250));
            Err(StageError::Computation("should have timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn full_run_completes_with_all_stages_successful() {
        let pipeline = LoanPipeline::new(PipelineRules::default());
        let (application_id, applicant_id) = ids();

        let state = pipeline
            .process(application_id, applicant_id, strong_input())
            .await;

        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert!(state.is_finalized());
        for stage in PipelineStage::ordered() {
            let result = state.stage_result(stage).expect("stage slot populated");
            assert_eq!(result.status, StageStatus::Success, "{}", stage.label());
        }
        assert_eq!(state.final_decision, Some(LoanDecision::Approved));
        assert!(state.calculated_credit_score.is_some());
        assert!(state.risk_level.is_some());
        assert!(state.total_processing_time.is_some());
    }

    #[tokio::test]
    async fn stage_failure_does_not_block_downstream_stages() {
        let rules = PipelineRules::default();
        let pipeline = LoanPipeline::with_stages(
            rules,
            vec![
                Arc::new(CreditScoringStage),
                Arc::new(LoanDecisionStage),
                Arc::new(FailingStage(PipelineStage::Verification)),
                Arc::new(RiskMonitoringStage),
            ],
        );
        let (application_id, applicant_id) = ids();

        let state = pipeline
            .process(application_id, applicant_id, strong_input())
            .await;

        assert_eq!(state.workflow_status, WorkflowStatus::Failed);
        assert_eq!(
            state
                .stage_result(PipelineStage::Verification)
                .expect("verification recorded")
                .status,
            StageStatus::Failed
        );
        for stage in [
            PipelineStage::CreditScoring,
            PipelineStage::LoanDecision,
            PipelineStage::RiskMonitoring,
        ] {
            assert_eq!(
                state.stage_result(stage).expect("slot populated").status,
                StageStatus::Success,
                "{}",
                stage.label()
            );
        }
        // Aggregates computed upstream of the failure survive.
        assert_eq!(state.final_decision, Some(LoanDecision::Approved));
        assert!(state.approved_amount.is_some());
        assert!(state
            .errors
            .iter()
            .any(|error| error.starts_with("verification:")));
    }

    #[tokio::test]
    async fn panicking_stage_is_recorded_as_failed() {
        let pipeline = LoanPipeline::with_stages(
            PipelineRules::default(),
            vec![
                Arc::new(CreditScoringStage),
                Arc::new(PanickingStage(PipelineStage::LoanDecision)),
                Arc::new(VerificationStage),
                Arc::new(RiskMonitoringStage),
            ],
        );
        let (application_id, applicant_id) = ids();

        let state = pipeline
            .process(application_id, applicant_id, strong_input())
            .await;

        let result = state
            .stage_result(PipelineStage::LoanDecision)
            .expect("decision recorded");
        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("stage blew up"));
        assert_eq!(state.workflow_status, WorkflowStatus::Failed);
        // The failed decision stage published nothing.
        assert!(state.final_decision.is_none());
        // Later stages still ran.
        assert_eq!(
            state
                .stage_result(PipelineStage::RiskMonitoring)
                .expect("risk recorded")
                .status,
            StageStatus::Success
        );
    }

    #[tokio::test]
    async fn lapsed_stage_budget_records_timeout() {
        let rules = PipelineRules {
            stage_timeout: Some(Duration::from_millis(25)),
            ..PipelineRules::default()
        };
        let pipeline = LoanPipeline::with_stages(
            rules,
            vec![
                Arc::new(CreditScoringStage),
                Arc::new(SlowStage(PipelineStage::LoanDecision)),
                Arc::new(VerificationStage),
                Arc::new(RiskMonitoringStage),
            ],
        );
        let (application_id, applicant_id) = ids();

        let state = pipeline
            .process(application_id, applicant_id, strong_input())
            .await;

        let result = state
            .stage_result(PipelineStage::LoanDecision)
            .expect("slot populated");
        assert_eq!(result.status, StageStatus::Timeout);
        assert_eq!(state.workflow_status, WorkflowStatus::Failed);
        assert_eq!(
            state
                .stage_result(PipelineStage::RiskMonitoring)
                .expect("risk recorded")
                .status,
            StageStatus::Success
        );
    }

    #[tokio::test]
    async fn reprocessing_the_same_input_yields_identical_outputs() {
        let pipeline = LoanPipeline::new(PipelineRules::default());
        let (application_id, applicant_id) = ids();

        let first = pipeline
            .process(application_id.clone(), applicant_id.clone(), strong_input())
            .await;
        let second = pipeline
            .process(application_id, applicant_id, strong_input())
            .await;

        assert_eq!(first.credit_assessment(), second.credit_assessment());
        assert_eq!(first.decision_outcome(), second.decision_outcome());
        assert_eq!(first.verification_report(), second.verification_report());
        assert_eq!(first.risk_assessment(), second.risk_assessment());
        assert_eq!(first.workflow_status, second.workflow_status);
    }
}
