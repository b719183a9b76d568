use serde::Serialize;

use super::{LoanStage, StageError};
use crate::workflows::loan::domain::RiskLevel;
use crate::workflows::loan::rules::PipelineRules;
use crate::workflows::loan::state::{PipelineStage, StageOutput, StateSnapshot};

const HIGH_RISK_FLOOR: u32 = 60;
const MEDIUM_RISK_FLOOR: u32 = 30;

const WRITE_OFF_PENALTY: u32 = 30;
const DEFAULT_PENALTY: u32 = 20;
const EXCESSIVE_LATE_THRESHOLD: u32 = 5;
const EXCESSIVE_INQUIRY_THRESHOLD: u32 = 6;

/// Payload of the risk monitoring stage.
///
/// `risk_score` is deliberately uncapped: out-of-range inputs surface as
/// scores beyond the usual bands rather than getting silently clamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub risk_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
}

pub struct RiskMonitoringStage;

impl LoanStage for RiskMonitoringStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::RiskMonitoring
    }

    fn execute(
        &self,
        snapshot: &StateSnapshot,
        _rules: &PipelineRules,
    ) -> Result<StageOutput, StageError> {
        Ok(StageOutput::RiskMonitoring(monitor(snapshot)))
    }
}

pub(crate) fn monitor(snapshot: &StateSnapshot) -> RiskAssessment {
    let input = &snapshot.input;
    let repayment = &input.repayment_history;
    let credit_score = snapshot.credit_score_or_default();

    let mut risk_score: u32 = 0;
    let mut risk_factors = Vec::new();

    if credit_score < 600 {
        risk_score += 40;
        risk_factors.push("Low credit score".to_string());
    } else if credit_score < 650 {
        risk_score += 25;
        risk_factors.push("Below-average credit score".to_string());
    } else if credit_score < 700 {
        risk_score += 10;
    }

    let utilization = input.credit_utilization_percent;
    if utilization > 80.0 {
        risk_score += 20;
        risk_factors.push("High credit utilization".to_string());
    } else if utilization > 50.0 {
        risk_score += 10;
    }

    if repayment.write_offs > 0 {
        risk_score += WRITE_OFF_PENALTY;
        risk_factors.push(format!("{} loan write-off(s)", repayment.write_offs));
    }
    if repayment.defaults > 0 {
        risk_score += DEFAULT_PENALTY;
        risk_factors.push(format!("{} default(s)", repayment.defaults));
    }

    if repayment.late_payments > EXCESSIVE_LATE_THRESHOLD {
        risk_score += 15;
        risk_factors.push(format!("{} late payments", repayment.late_payments));
    }

    if input.recent_credit_inquiries_6m > EXCESSIVE_INQUIRY_THRESHOLD {
        risk_score += 10;
        risk_factors.push("Multiple recent credit inquiries".to_string());
    }

    let risk_level = if risk_score >= HIGH_RISK_FLOOR {
        RiskLevel::High
    } else if risk_score >= MEDIUM_RISK_FLOOR {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let recommended_actions = match risk_level {
        RiskLevel::High => vec![
            "Require additional collateral".to_string(),
            "Consider co-signer requirement".to_string(),
            "Implement enhanced monitoring".to_string(),
        ],
        RiskLevel::Medium => vec![
            "Regular payment monitoring".to_string(),
            "Consider payment protection insurance".to_string(),
        ],
        RiskLevel::Low => vec!["Standard monitoring protocol".to_string()],
    };

    RiskAssessment {
        risk_level,
        risk_score,
        risk_factors,
        recommended_actions,
    }
}
