use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use super::domain::ApplicationId;
use super::state::ProcessingState;

/// Finalized pipeline output in the shape the storage collaborator keeps.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingRecord {
    pub state: ProcessingState,
}

impl ProcessingRecord {
    pub fn application_id(&self) -> &ApplicationId {
        &self.state.application_id
    }

    pub fn status_view(&self) -> ProcessingStatusView {
        let state = &self.state;
        ProcessingStatusView {
            application_id: state.application_id.clone(),
            applicant_id: state.applicant_id.0.clone(),
            workflow_status: state.workflow_status.label(),
            final_decision: state.final_decision.map(|decision| decision.label()),
            calculated_credit_score: state.calculated_credit_score,
            risk_level: state.risk_level.map(|level| level.label()),
            approved_amount: state.approved_amount,
            interest_rate: state.interest_rate,
            errors: state.errors.clone(),
        }
    }
}

/// Sanitized representation of a processed application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStatusView {
    pub application_id: ApplicationId,
    pub applicant_id: String,
    pub workflow_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_credit_score: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    pub errors: Vec<String>,
}

/// Storage abstraction so the service glue can be exercised in isolation.
/// The pipeline itself only produces records; persistence semantics live
/// behind this seam.
pub trait ProcessingRepository: Send + Sync {
    fn insert(&self, record: ProcessingRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ProcessingRecord>, RepositoryError>;
    fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded map keeping finalized records for the demo service.
#[derive(Default)]
pub struct InMemoryRepository {
    records: Mutex<BTreeMap<String, ProcessingRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessingRepository for InMemoryRepository {
    fn insert(&self, record: ProcessingRecord) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store poisoned".to_string()))?;
        let key = record.application_id().0.clone();
        if records.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(key, record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ProcessingRecord>, RepositoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store poisoned".to_string()))?;
        Ok(records.get(&id.0).cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>, RepositoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store poisoned".to_string()))?;
        Ok(records.values().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::domain::{
        ApplicantId, ApplicationInput, EmploymentStatus, RepaymentHistory,
    };

    fn finalized_record(id: &str) -> ProcessingRecord {
        let mut state = ProcessingState::new(
            ApplicationId(id.to_string()),
            ApplicantId("APP001".to_string()),
            ApplicationInput {
                full_name: "Test Applicant".to_string(),
                email: "test@example.com".to_string(),
                phone_number: "+1-555-0100".to_string(),
                credit_history_length_months: 48,
                number_of_credit_accounts: 3,
                credit_utilization_percent: 30.0,
                recent_credit_inquiries_6m: 1,
                repayment_history: RepaymentHistory {
                    on_time_payments: 30,
                    late_payments: 1,
                    defaults: 0,
                    write_offs: 0,
                },
                employment_status: EmploymentStatus::Employed,
                employment_duration_months: 24,
                monthly_income: 4200.0,
                income_verified: true,
                loan_amount_requested: 20000.0,
                loan_purpose: "vehicle".to_string(),
                loan_tenure_months: 36,
            },
        );
        state.begin();
        state.finalize();
        ProcessingRecord { state }
    }

    #[test]
    fn insert_then_fetch_round_trips() {
        let repository = InMemoryRepository::new();
        repository
            .insert(finalized_record("loan-000001"))
            .expect("insert succeeds");

        let fetched = repository
            .fetch(&ApplicationId("loan-000001".to_string()))
            .expect("fetch succeeds")
            .expect("record present");
        assert_eq!(fetched.application_id().0, "loan-000001");
        assert_eq!(fetched.status_view().workflow_status, "completed");
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let repository = InMemoryRepository::new();
        repository
            .insert(finalized_record("loan-000002"))
            .expect("first insert succeeds");

        let error = repository
            .insert(finalized_record("loan-000002"))
            .expect_err("duplicate rejected");
        assert!(matches!(error, RepositoryError::Conflict));
    }

    #[test]
    fn recent_returns_newest_first_up_to_limit() {
        let repository = InMemoryRepository::new();
        for id in ["loan-000001", "loan-000002", "loan-000003"] {
            repository.insert(finalized_record(id)).expect("inserts");
        }

        let recent = repository.recent(2).expect("listing succeeds");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].application_id().0, "loan-000003");
        assert_eq!(recent[1].application_id().0, "loan-000002");
    }

    #[test]
    fn missing_record_fetches_none() {
        let repository = InMemoryRepository::new();
        let fetched = repository
            .fetch(&ApplicationId("loan-999999".to_string()))
            .expect("fetch succeeds");
        assert!(fetched.is_none());
    }
}
