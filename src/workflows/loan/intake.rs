use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use super::domain::{ApplicantId, ApplicationInput, EmploymentStatus, RepaymentHistory};

/// One parsed intake row: the applicant identifier plus the validated
/// application record the pipeline consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRecord {
    pub applicant_id: ApplicantId,
    pub input: ApplicationInput,
}

#[derive(Debug)]
pub enum IntakeError {
    Io(std::io::Error),
    Csv(csv::Error),
    Constraint { row: usize, message: String },
}

impl std::fmt::Display for IntakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeError::Io(err) => write!(f, "failed to read intake export: {}", err),
            IntakeError::Csv(err) => write!(f, "invalid intake CSV data: {}", err),
            IntakeError::Constraint { row, message } => {
                write!(f, "intake row {} violates a field constraint: {}", row, message)
            }
        }
    }
}

impl std::error::Error for IntakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntakeError::Io(err) => Some(err),
            IntakeError::Csv(err) => Some(err),
            IntakeError::Constraint { .. } => None,
        }
    }
}

impl From<std::io::Error> for IntakeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for IntakeError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct IntakeRow {
    applicant_id: String,
    full_name: String,
    email: String,
    phone_number: String,
    credit_history_length_months: u32,
    number_of_credit_accounts: u32,
    credit_utilization_percent: f64,
    recent_credit_inquiries_6m: u32,
    on_time_payments: u32,
    late_payments: u32,
    defaults: u32,
    write_offs: u32,
    #[serde(deserialize_with = "employment_from_text")]
    employment_status: EmploymentStatus,
    employment_duration_months: u32,
    monthly_income: f64,
    #[serde(deserialize_with = "flag_from_text")]
    income_verified: bool,
    loan_amount_requested: f64,
    loan_purpose: String,
    loan_tenure_months: u32,
}

fn employment_from_text<'de, D>(deserializer: D) -> Result<EmploymentStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "employed" => Ok(EmploymentStatus::Employed),
        "self-employed" | "self employed" | "self_employed" => Ok(EmploymentStatus::SelfEmployed),
        "unemployed" => Ok(EmploymentStatus::Unemployed),
        other => Err(serde::de::Error::custom(format!(
            "unknown employment status '{other}'"
        ))),
    }
}

fn flag_from_text<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "unrecognized boolean flag '{other}'"
        ))),
    }
}

impl IntakeRow {
    /// Apply the field constraints the HTTP validation layer would have
    /// enforced, then build the pipeline input.
    fn into_record(self, row: usize) -> Result<IntakeRecord, IntakeError> {
        if !(0.0..=100.0).contains(&self.credit_utilization_percent) {
            return Err(IntakeError::Constraint {
                row,
                message: format!(
                    "credit_utilization_percent {} outside [0, 100]",
                    self.credit_utilization_percent
                ),
            });
        }
        if self.loan_tenure_months < 1 {
            return Err(IntakeError::Constraint {
                row,
                message: "loan_tenure_months must be at least 1".to_string(),
            });
        }
        if self.monthly_income < 0.0 {
            return Err(IntakeError::Constraint {
                row,
                message: format!("monthly_income {} is negative", self.monthly_income),
            });
        }
        if self.loan_amount_requested < 0.0 {
            return Err(IntakeError::Constraint {
                row,
                message: format!(
                    "loan_amount_requested {} is negative",
                    self.loan_amount_requested
                ),
            });
        }

        Ok(IntakeRecord {
            applicant_id: ApplicantId(self.applicant_id),
            input: ApplicationInput {
                full_name: self.full_name,
                email: self.email,
                phone_number: self.phone_number,
                credit_history_length_months: self.credit_history_length_months,
                number_of_credit_accounts: self.number_of_credit_accounts,
                credit_utilization_percent: self.credit_utilization_percent,
                recent_credit_inquiries_6m: self.recent_credit_inquiries_6m,
                repayment_history: RepaymentHistory {
                    on_time_payments: self.on_time_payments,
                    late_payments: self.late_payments,
                    defaults: self.defaults,
                    write_offs: self.write_offs,
                },
                employment_status: self.employment_status,
                employment_duration_months: self.employment_duration_months,
                monthly_income: self.monthly_income,
                income_verified: self.income_verified,
                loan_amount_requested: self.loan_amount_requested,
                loan_purpose: self.loan_purpose,
                loan_tenure_months: self.loan_tenure_months,
            },
        })
    }
}

/// Reads a CSV export of loan applications into pipeline-ready records, one
/// row per application.
pub struct LoanIntakeImporter;

impl LoanIntakeImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<IntakeRecord>, IntakeError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<IntakeRecord>, IntakeError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (index, row) in csv_reader.deserialize::<IntakeRow>().enumerate() {
            let row = row?;
            records.push(row.into_record(index + 1)?);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "applicant_id,full_name,email,phone_number,credit_history_length_months,number_of_credit_accounts,credit_utilization_percent,recent_credit_inquiries_6m,on_time_payments,late_payments,defaults,write_offs,employment_status,employment_duration_months,monthly_income,income_verified,loan_amount_requested,loan_purpose,loan_tenure_months";

    fn csv_with(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn parses_a_complete_row() {
        let csv = csv_with(&[
            "APP001,Asha Rao,asha@example.com,+91-98450-00123,72,5,25.0,1,48,2,0,0,Employed,36,5000,true,50000,home,60",
        ]);

        let records = LoanIntakeImporter::from_reader(csv.as_bytes()).expect("csv parses");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.applicant_id.0, "APP001");
        assert_eq!(record.input.credit_history_length_months, 72);
        assert_eq!(record.input.repayment_history.on_time_payments, 48);
        assert_eq!(record.input.employment_status, EmploymentStatus::Employed);
        assert!(record.input.income_verified);
        assert_eq!(record.input.loan_tenure_months, 60);
    }

    #[test]
    fn accepts_loose_employment_and_flag_spellings() {
        let csv = csv_with(&[
            "APP002,Ben Ortiz,ben@example.com,+1-555-0111,24,2,45.0,3,10,1,0,0,self employed,18,3800,yes,15000,vehicle,36",
        ]);

        let records = LoanIntakeImporter::from_reader(csv.as_bytes()).expect("csv parses");

        assert_eq!(
            records[0].input.employment_status,
            EmploymentStatus::SelfEmployed
        );
        assert!(records[0].input.income_verified);
    }

    #[test]
    fn rejects_out_of_range_utilization() {
        let csv = csv_with(&[
            "APP003,Cara Singh,cara@example.com,+1-555-0112,24,2,140.0,3,10,1,0,0,Employed,18,3800,no,15000,vehicle,36",
        ]);

        let error = LoanIntakeImporter::from_reader(csv.as_bytes()).expect_err("constraint trips");

        match error {
            IntakeError::Constraint { row, message } => {
                assert_eq!(row, 1);
                assert!(message.contains("credit_utilization_percent"));
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_tenure() {
        let csv = csv_with(&[
            "APP004,Dev Patel,dev@example.com,+1-555-0113,24,2,40.0,3,10,1,0,0,Employed,18,3800,no,15000,vehicle,0",
        ]);

        let error = LoanIntakeImporter::from_reader(csv.as_bytes()).expect_err("constraint trips");
        assert!(matches!(error, IntakeError::Constraint { .. }));
    }

    #[test]
    fn unknown_employment_status_is_a_csv_error() {
        let csv = csv_with(&[
            "APP005,Eli North,eli@example.com,+1-555-0114,24,2,40.0,3,10,1,0,0,Retired,18,3800,no,15000,vehicle,36",
        ]);

        let error = LoanIntakeImporter::from_reader(csv.as_bytes()).expect_err("parse fails");
        assert!(matches!(error, IntakeError::Csv(_)));
    }
}
