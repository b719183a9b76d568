use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for the applicant behind an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl std::fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Employment status as declared by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentStatus {
    Employed,
    #[serde(rename = "Self-employed")]
    SelfEmployed,
    Unemployed,
}

impl EmploymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EmploymentStatus::Employed => "Employed",
            EmploymentStatus::SelfEmployed => "Self-employed",
            EmploymentStatus::Unemployed => "Unemployed",
        }
    }

    /// Statuses the verification stage accepts as employment evidence.
    pub const fn is_working(self) -> bool {
        matches!(
            self,
            EmploymentStatus::Employed | EmploymentStatus::SelfEmployed
        )
    }
}

/// Payment track record across the applicant's credit accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentHistory {
    pub on_time_payments: u32,
    pub late_payments: u32,
    pub defaults: u32,
    pub write_offs: u32,
}

impl RepaymentHistory {
    /// Payments with a known outcome; defaults and write-offs are tracked
    /// separately as red flags.
    pub const fn total_payments(&self) -> u32 {
        self.on_time_payments + self.late_payments
    }
}

/// Immutable application record handed to the pipeline.
///
/// The upstream intake layer has already enforced the field constraints
/// (utilization in [0, 100], counts non-negative, tenure >= 1); the pipeline
/// consumes the record as-is and never re-validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInput {
    // Personal details
    pub full_name: String,
    pub email: String,
    pub phone_number: String,

    // Credit profile
    pub credit_history_length_months: u32,
    pub number_of_credit_accounts: u32,
    pub credit_utilization_percent: f64,
    pub recent_credit_inquiries_6m: u32,
    pub repayment_history: RepaymentHistory,

    // Employment and income
    pub employment_status: EmploymentStatus,
    pub employment_duration_months: u32,
    pub monthly_income: f64,
    pub income_verified: bool,

    // Loan request
    pub loan_amount_requested: f64,
    pub loan_purpose: String,
    pub loan_tenure_months: u32,
}

/// Final business outcome of the decision stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanDecision {
    Approved,
    Conditional,
    Rejected,
}

impl LoanDecision {
    pub const fn label(self) -> &'static str {
        match self {
            LoanDecision::Approved => "approved",
            LoanDecision::Conditional => "conditional",
            LoanDecision::Rejected => "rejected",
        }
    }
}

/// Credit quality band derived from the calculated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CreditTier {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl CreditTier {
    /// Fixed score breakpoints shared by the scoring stage and the interest
    /// rate table.
    pub const fn from_score(score: u16) -> Self {
        if score >= 750 {
            CreditTier::Excellent
        } else if score >= 700 {
            CreditTier::VeryGood
        } else if score >= 650 {
            CreditTier::Good
        } else if score >= 600 {
            CreditTier::Fair
        } else if score >= 550 {
            CreditTier::Poor
        } else {
            CreditTier::VeryPoor
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CreditTier::Excellent => "Excellent",
            CreditTier::VeryGood => "Very Good",
            CreditTier::Good => "Good",
            CreditTier::Fair => "Fair",
            CreditTier::Poor => "Poor",
            CreditTier::VeryPoor => "Very Poor",
        }
    }
}

/// Aggregate verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Pending,
    Failed,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Failed => "failed",
        }
    }
}

/// Portfolio risk band assigned by the risk monitoring stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Lifecycle of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}
