use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Business thresholds consumed across the pipeline stages.
///
/// The two score floors bound the decision stage: below `hard_score_floor`
/// the application is rejected outright; between the floors it is approved
/// conditionally. Timeout budgets of `None` disable enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRules {
    pub hard_score_floor: u16,
    pub soft_score_floor: u16,
    pub max_dti_ratio: f64,
    pub stage_timeout: Option<Duration>,
    pub pipeline_timeout: Option<Duration>,
}

impl Default for PipelineRules {
    fn default() -> Self {
        Self {
            hard_score_floor: 550,
            soft_score_floor: 650,
            max_dti_ratio: 0.50,
            stage_timeout: Some(Duration::from_secs(30)),
            pipeline_timeout: Some(Duration::from_secs(120)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_floors_ordered() {
        let rules = PipelineRules::default();
        assert!(rules.hard_score_floor < rules.soft_score_floor);
        assert_eq!(rules.max_dti_ratio, 0.50);
        assert_eq!(rules.stage_timeout, Some(Duration::from_secs(30)));
        assert_eq!(rules.pipeline_timeout, Some(Duration::from_secs(120)));
    }
}
