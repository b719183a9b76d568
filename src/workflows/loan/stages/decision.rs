use serde::Serialize;

use super::{LoanStage, StageError};
use crate::workflows::loan::domain::{CreditTier, EmploymentStatus, LoanDecision};
use crate::workflows::loan::rules::PipelineRules;
use crate::workflows::loan::state::{PipelineStage, StageOutput, StateSnapshot};

/// Conditional approvals disburse a reduced share of the requested amount.
const CONDITIONAL_AMOUNT_FACTOR: f64 = 0.85;

/// Flat rate margin applied to self-employed applicants.
const SELF_EMPLOYED_RATE_MARGIN: f64 = 0.5;

/// Payload of the loan decision stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub final_decision: LoanDecision,
    pub approved_amount: f64,
    pub interest_rate: Option<f64>,
    pub decision_rationale: String,
    pub rejection_reasons: Option<Vec<String>>,
    pub conditions: Option<Vec<String>>,
    pub dti_ratio: f64,
}

pub struct LoanDecisionStage;

impl LoanStage for LoanDecisionStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::LoanDecision
    }

    fn execute(
        &self,
        snapshot: &StateSnapshot,
        rules: &PipelineRules,
    ) -> Result<StageOutput, StageError> {
        Ok(StageOutput::LoanDecision(decide(snapshot, rules)))
    }
}

/// Monthly obligation relative to monthly income. Non-positive tenure or
/// income resolves to maximal risk (1.0) so such applications are rejected on
/// the DTI gate instead of dividing by zero.
fn debt_to_income(loan_amount: f64, tenure_months: u32, monthly_income: f64) -> f64 {
    if tenure_months > 0 && monthly_income > 0.0 {
        (loan_amount / f64::from(tenure_months)) / monthly_income
    } else {
        1.0
    }
}

/// Annual rate from the credit tier band.
fn base_rate(tier: CreditTier) -> f64 {
    match tier {
        CreditTier::Excellent => 8.5,
        CreditTier::VeryGood => 9.5,
        CreditTier::Good => 11.0,
        CreditTier::Fair => 13.0,
        CreditTier::Poor => 15.5,
        CreditTier::VeryPoor => 18.0,
    }
}

pub(crate) fn decide(snapshot: &StateSnapshot, rules: &PipelineRules) -> DecisionOutcome {
    let input = &snapshot.input;
    let credit_score = snapshot.credit_score_or_default();

    let dti_ratio = debt_to_income(
        input.loan_amount_requested,
        input.loan_tenure_months,
        input.monthly_income,
    );

    let mut rejection_reasons = Vec::new();

    if credit_score < rules.hard_score_floor {
        rejection_reasons.push(format!(
            "Credit score below minimum threshold ({})",
            rules.hard_score_floor
        ));
    }
    let conditional =
        credit_score >= rules.hard_score_floor && credit_score < rules.soft_score_floor;

    if input.employment_status == EmploymentStatus::Unemployed {
        rejection_reasons.push("Unemployed applicants not eligible".to_string());
    }

    if dti_ratio > rules.max_dti_ratio {
        rejection_reasons.push(format!(
            "DTI ratio ({:.1}%) exceeds maximum ({:.1}%)",
            dti_ratio * 100.0,
            rules.max_dti_ratio * 100.0
        ));
    }

    if !rejection_reasons.is_empty() {
        let decision_rationale =
            format!("Application rejected: {}", rejection_reasons.join("; "));
        return DecisionOutcome {
            final_decision: LoanDecision::Rejected,
            approved_amount: 0.0,
            interest_rate: None,
            decision_rationale,
            rejection_reasons: Some(rejection_reasons),
            conditions: None,
            dti_ratio,
        };
    }

    let (final_decision, approved_amount) = if conditional {
        (
            LoanDecision::Conditional,
            input.loan_amount_requested * CONDITIONAL_AMOUNT_FACTOR,
        )
    } else {
        (LoanDecision::Approved, input.loan_amount_requested)
    };

    let mut interest_rate = base_rate(CreditTier::from_score(credit_score));
    if input.employment_status == EmploymentStatus::SelfEmployed {
        interest_rate += SELF_EMPLOYED_RATE_MARGIN;
    }

    let mut conditions = Vec::new();
    if conditional {
        conditions.push(format!(
            "Approved amount reduced to {approved_amount:.0} (85% of requested)"
        ));
        conditions.push("Requires co-applicant or additional collateral".to_string());
        conditions.push(format!(
            "Higher interest rate due to credit score below {}",
            rules.soft_score_floor
        ));
    }
    conditions.extend([
        "Income verification required".to_string(),
        "Valid identity documents required".to_string(),
        "Bank statements for last 6 months required".to_string(),
    ]);

    let decision_rationale = format!(
        "Application {} based on credit score ({}), monthly income ({:.0}), and DTI ratio ({:.1}%)",
        if conditional {
            "conditionally approved"
        } else {
            "approved"
        },
        credit_score,
        input.monthly_income,
        dti_ratio * 100.0
    );

    DecisionOutcome {
        final_decision,
        approved_amount,
        interest_rate: Some(interest_rate),
        decision_rationale,
        rejection_reasons: None,
        conditions: Some(conditions),
        dti_ratio,
    }
}
