use serde::Serialize;

use super::{LoanStage, StageError};
use crate::workflows::loan::domain::{ApplicationInput, VerificationStatus};
use crate::workflows::loan::rules::PipelineRules;
use crate::workflows::loan::state::{PipelineStage, StageOutput, StateSnapshot};

const PHONE_MIN_LEN: usize = 10;

/// Payload of the verification stage. Informational only: nothing here feeds
/// the decision stage or the published aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub verification_status: VerificationStatus,
    pub verified_fields: Vec<String>,
    pub pending_verifications: Vec<String>,
    pub verification_notes: String,
}

pub struct VerificationStage;

impl LoanStage for VerificationStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Verification
    }

    fn execute(
        &self,
        snapshot: &StateSnapshot,
        _rules: &PipelineRules,
    ) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Verification(verify(&snapshot.input)))
    }
}

pub(crate) fn verify(input: &ApplicationInput) -> VerificationReport {
    let mut verified_fields = Vec::new();
    let mut pending_verifications = Vec::new();

    if !input.email.is_empty() && input.email.contains('@') {
        verified_fields.push("email".to_string());
    } else {
        pending_verifications.push("email".to_string());
    }

    if input.phone_number.chars().count() >= PHONE_MIN_LEN {
        verified_fields.push("phone".to_string());
    } else {
        pending_verifications.push("phone".to_string());
    }

    if input.income_verified {
        verified_fields.push("income".to_string());
    } else {
        pending_verifications.push("income".to_string());
    }

    // Employment evidence is additive only: a non-working status is not a
    // pending verification, it simply contributes nothing.
    if input.employment_status.is_working() {
        verified_fields.push("employment".to_string());
    }

    let verification_status = if pending_verifications.is_empty() {
        VerificationStatus::Verified
    } else if verified_fields.is_empty() {
        VerificationStatus::Failed
    } else {
        VerificationStatus::Pending
    };

    let verification_notes = format!(
        "Verified {} fields, {} pending",
        verified_fields.len(),
        pending_verifications.len()
    );

    VerificationReport {
        verification_status,
        verified_fields,
        pending_verifications,
        verification_notes,
    }
}
