use serde::Serialize;

use super::{LoanStage, StageError};
use crate::workflows::loan::domain::{ApplicationInput, CreditTier};
use crate::workflows::loan::rules::PipelineRules;
use crate::workflows::loan::state::{PipelineStage, StageOutput, StateSnapshot};

const BASE_SCORE: i64 = 350;
const SCORE_FLOOR: i64 = 300;
const SCORE_CEILING: i64 = 850;

/// Maximum points awarded for a flawless payment record.
const PAYMENT_POOL: f64 = 280.0;

const DEFAULT_POINTS: i64 = 100;
const WRITE_OFF_POINTS: i64 = 150;

/// Named integer contributions that sum (before clamping) to the calculated
/// score. Part of the stage contract: callers audit individual terms, not
/// just the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditBreakdown {
    pub base_score: i64,
    pub credit_history_score: i64,
    pub payment_history_score: i64,
    pub credit_utilization_score: i64,
    pub inquiry_penalty: i64,
    pub default_penalty: i64,
}

/// Payload of the credit scoring stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditAssessment {
    pub calculated_credit_score: u16,
    pub credit_tier: CreditTier,
    pub breakdown: CreditBreakdown,
    pub factors: Vec<String>,
    pub rationale: String,
}

pub struct CreditScoringStage;

impl LoanStage for CreditScoringStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::CreditScoring
    }

    fn execute(
        &self,
        snapshot: &StateSnapshot,
        _rules: &PipelineRules,
    ) -> Result<StageOutput, StageError> {
        Ok(StageOutput::CreditScoring(assess(&snapshot.input)))
    }
}

/// Banded award for credit history length, with diminishing returns past two
/// years and a linear ramp below.
fn history_points(months: u32) -> i64 {
    if months >= 84 {
        120
    } else if months >= 60 {
        90
    } else if months >= 36 {
        60
    } else if months >= 24 {
        40
    } else {
        i64::from(months)
    }
}

/// Per-late-payment penalty escalates with the late count and softens with
/// payment-history depth: a deep file absorbs the first lates more cheaply
/// than a thin one.
fn late_penalty(total_payments: u32, late: u32) -> i64 {
    if late == 0 {
        return 0;
    }
    let late = i64::from(late);
    if total_payments >= 70 {
        if late <= 2 {
            late * 12
        } else if late <= 4 {
            24 + (late - 2) * 18
        } else {
            60 + (late - 4) * 22
        }
    } else if total_payments >= 40 {
        if late <= 2 {
            late * 18
        } else if late <= 4 {
            36 + (late - 2) * 25
        } else {
            86 + (late - 4) * 30
        }
    } else if late <= 2 {
        late * 22
    } else if late <= 4 {
        44 + (late - 2) * 30
    } else {
        104 + (late - 4) * 35
    }
}

/// Banded utilization award; negative above 70%.
fn utilization_points(utilization: f64) -> i64 {
    if utilization < 10.0 {
        60
    } else if utilization < 30.0 {
        50
    } else if utilization < 50.0 {
        30
    } else if utilization < 70.0 {
        0
    } else if utilization < 85.0 {
        -20
    } else {
        -40
    }
}

/// Escalating penalty for hard inquiries in the trailing six months.
fn inquiry_penalty(inquiries: u32) -> i64 {
    let inquiries = i64::from(inquiries);
    if inquiries == 0 {
        0
    } else if inquiries <= 2 {
        inquiries * 3
    } else if inquiries <= 4 {
        6 + (inquiries - 2) * 8
    } else if inquiries <= 6 {
        22 + (inquiries - 4) * 12
    } else {
        46 + (inquiries - 6) * 15
    }
}

pub(crate) fn assess(input: &ApplicationInput) -> CreditAssessment {
    let repayment = &input.repayment_history;
    let total_payments = repayment.total_payments();

    let history_score = history_points(input.credit_history_length_months);

    let (payment_score, on_time_rate) = if total_payments > 0 {
        let rate = f64::from(repayment.on_time_payments) / f64::from(total_payments);
        let penalty = late_penalty(total_payments, repayment.late_payments);
        (rate * PAYMENT_POOL - penalty as f64, Some(rate))
    } else {
        (0.0, None)
    };

    let utilization_score = utilization_points(input.credit_utilization_percent);
    let inquiry_penalty = inquiry_penalty(input.recent_credit_inquiries_6m);
    let default_penalty = i64::from(repayment.defaults) * DEFAULT_POINTS
        + i64::from(repayment.write_offs) * WRITE_OFF_POINTS;

    let raw = BASE_SCORE as f64
        + history_score as f64
        + payment_score
        + utilization_score as f64
        - inquiry_penalty as f64
        - default_penalty as f64;
    let calculated = (raw as i64).clamp(SCORE_FLOOR, SCORE_CEILING) as u16;
    let tier = CreditTier::from_score(calculated);

    let breakdown = CreditBreakdown {
        base_score: BASE_SCORE,
        credit_history_score: history_score,
        payment_history_score: payment_score as i64,
        credit_utilization_score: utilization_score,
        inquiry_penalty,
        default_penalty,
    };

    let payment_factor = match on_time_rate {
        Some(rate) => format!(
            "Payment history: {} on-time, {} late ({:.1}% on-time, {:+} points)",
            repayment.on_time_payments,
            repayment.late_payments,
            rate * 100.0,
            payment_score as i64
        ),
        None => "No payment history".to_string(),
    };

    let factors = vec![
        format!(
            "Credit history: {} months (+{} points)",
            input.credit_history_length_months, history_score
        ),
        payment_factor,
        format!(
            "Credit utilization: {:.1}% ({}, {:+} points)",
            input.credit_utilization_percent,
            if input.credit_utilization_percent < 30.0 {
                "Good"
            } else {
                "High"
            },
            utilization_score
        ),
        format!(
            "Recent inquiries: {} (-{} points)",
            input.recent_credit_inquiries_6m, inquiry_penalty
        ),
        format!(
            "Defaults: {}, Write-offs: {} (-{} points)",
            repayment.defaults, repayment.write_offs, default_penalty
        ),
    ];

    let payment_note = match on_time_rate {
        Some(rate) => format!("{:.1}% on-time payments", rate * 100.0),
        None => "no payment history".to_string(),
    };
    let rationale = format!(
        "Credit score of {} ({}) calculated from {}, {:.1}% utilization, and {} months of credit history",
        calculated,
        tier.label(),
        payment_note,
        input.credit_utilization_percent,
        input.credit_history_length_months
    );

    CreditAssessment {
        calculated_credit_score: calculated,
        credit_tier: tier,
        breakdown,
        factors,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::domain::{EmploymentStatus, RepaymentHistory};

    fn input_with(
        history_months: u32,
        repayment: RepaymentHistory,
        utilization: f64,
        inquiries: u32,
    ) -> ApplicationInput {
        ApplicationInput {
            full_name: "Test Applicant".to_string(),
            email: "test@example.com".to_string(),
            phone_number: "+1-555-0100".to_string(),
            credit_history_length_months: history_months,
            number_of_credit_accounts: 4,
            credit_utilization_percent: utilization,
            recent_credit_inquiries_6m: inquiries,
            repayment_history: repayment,
            employment_status: EmploymentStatus::Employed,
            employment_duration_months: 24,
            monthly_income: 5000.0,
            income_verified: true,
            loan_amount_requested: 30000.0,
            loan_purpose: "personal".to_string(),
            loan_tenure_months: 48,
        }
    }

    fn clean_repayment(on_time: u32, late: u32) -> RepaymentHistory {
        RepaymentHistory {
            on_time_payments: on_time,
            late_payments: late,
            defaults: 0,
            write_offs: 0,
        }
    }

    #[test]
    fn breakdown_matches_hand_computed_example() {
        // 72mo history -> 90; 48/2 payments -> 0.96 * 280 - 36 = 232.8;
        // 25% utilization -> 50; one inquiry -> 3.
        let assessment = assess(&input_with(72, clean_repayment(48, 2), 25.0, 1));

        assert_eq!(
            assessment.breakdown,
            CreditBreakdown {
                base_score: 350,
                credit_history_score: 90,
                payment_history_score: 232,
                credit_utilization_score: 50,
                inquiry_penalty: 3,
                default_penalty: 0,
            }
        );
        // 350 + 90 + 232.8 + 50 - 3, truncated.
        assert_eq!(assessment.calculated_credit_score, 719);
        assert_eq!(assessment.credit_tier, CreditTier::VeryGood);
        assert_eq!(assessment.factors.len(), 5);
    }

    #[test]
    fn pathological_input_clamps_to_floor() {
        let repayment = RepaymentHistory {
            on_time_payments: 0,
            late_payments: 0,
            defaults: 3,
            write_offs: 2,
        };
        let assessment = assess(&input_with(0, repayment, 100.0, 20));
        assert_eq!(assessment.calculated_credit_score, 300);
        assert_eq!(assessment.credit_tier, CreditTier::VeryPoor);
    }

    #[test]
    fn score_stays_within_valid_range_for_best_profile() {
        let assessment = assess(&input_with(120, clean_repayment(200, 0), 5.0, 0));
        assert!(assessment.calculated_credit_score >= 300);
        assert!(assessment.calculated_credit_score <= 850);
        assert_eq!(assessment.credit_tier, CreditTier::Excellent);
    }

    #[test]
    fn empty_payment_history_contributes_zero() {
        let assessment = assess(&input_with(12, clean_repayment(0, 0), 25.0, 0));
        assert_eq!(assessment.breakdown.payment_history_score, 0);
        assert!(assessment
            .factors
            .iter()
            .any(|factor| factor == "No payment history"));
    }

    #[test]
    fn higher_on_time_ratio_never_lowers_payment_points() {
        let mut previous = i64::MIN;
        for on_time in [0u32, 5, 10, 20, 40, 80, 160] {
            let assessment = assess(&input_with(36, clean_repayment(on_time, 3), 25.0, 0));
            let points = assessment.breakdown.payment_history_score;
            assert!(
                points >= previous,
                "payment points regressed at on_time={on_time}: {points} < {previous}"
            );
            previous = points;
        }
    }

    #[test]
    fn defaults_and_write_offs_never_raise_the_score() {
        let base = assess(&input_with(60, clean_repayment(50, 0), 20.0, 1));
        for defaults in 1..4 {
            let worse = assess(&input_with(
                60,
                RepaymentHistory {
                    on_time_payments: 50,
                    late_payments: 0,
                    defaults,
                    write_offs: 0,
                },
                20.0,
                1,
            ));
            assert!(worse.calculated_credit_score <= base.calculated_credit_score);
        }
        let written_off = assess(&input_with(
            60,
            RepaymentHistory {
                on_time_payments: 50,
                late_payments: 0,
                defaults: 0,
                write_offs: 1,
            },
            20.0,
            1,
        ));
        assert!(written_off.calculated_credit_score < base.calculated_credit_score);
    }

    #[test]
    fn late_penalty_softens_with_history_depth() {
        assert_eq!(late_penalty(80, 2), 24);
        assert_eq!(late_penalty(50, 2), 36);
        assert_eq!(late_penalty(10, 2), 44);
        // Escalating marginal cost within a tier.
        assert_eq!(late_penalty(80, 4), 60);
        assert_eq!(late_penalty(80, 6), 104);
    }

    #[test]
    fn utilization_bands_cover_extremes() {
        assert_eq!(utilization_points(0.0), 60);
        assert_eq!(utilization_points(29.9), 50);
        assert_eq!(utilization_points(49.0), 30);
        assert_eq!(utilization_points(69.0), 0);
        assert_eq!(utilization_points(84.9), -20);
        assert_eq!(utilization_points(100.0), -40);
    }

    #[test]
    fn inquiry_penalty_escalates() {
        assert_eq!(inquiry_penalty(0), 0);
        assert_eq!(inquiry_penalty(2), 6);
        assert_eq!(inquiry_penalty(4), 22);
        assert_eq!(inquiry_penalty(6), 46);
        assert_eq!(inquiry_penalty(10), 106);
    }
}
